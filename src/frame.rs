use crate::error::FrameError;

/// Maximum value of the 11-bit standard id.
pub const ID_MAX: u32 = 0x7FF;
/// Maximum value of the 18-bit extended id.
pub const EID_MAX: u32 = 0x3FFFF;
/// Bit 16 of `eid`: the CS3 "this is a response" marker.
pub const EID_RESPONSE_BIT: u32 = 0x1_0000;

/// One CAN frame, in the shape this simulator's two wire encodings
/// (MCP2515 TX/RX register blocks) agree on: an 11-bit standard id, an
/// 18-bit extended id (carrying the CS3 command/response bits), a DLC and
/// up to 8 data bytes.
///
/// Unlike `embedded_can::Id`, `id` and `eid` are not mutually exclusive —
/// CS3 packs protocol information into both simultaneously.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct CanFrame {
    pub id: u32,
    pub eid: u32,
    pub dlc: u8,
    pub data: [u8; 8],
}

impl CanFrame {
    /// Builds a frame, rejecting anything that could not legally appear on
    /// the wire. `data` beyond `dlc` is ignored; `data` shorter than `dlc`
    /// is zero-padded.
    pub fn new(id: u32, eid: u32, dlc: u8, data: &[u8]) -> Result<Self, FrameError> {
        if id > ID_MAX {
            return Err(FrameError::IdOutOfRange(id));
        }
        if eid > EID_MAX {
            return Err(FrameError::ExtendedIdOutOfRange(eid));
        }
        if dlc > 8 {
            return Err(FrameError::DlcOutOfRange(dlc));
        }

        let mut bytes = [0u8; 8];
        let n = (dlc as usize).min(data.len());
        bytes[..n].copy_from_slice(&data[..n]);

        Ok(CanFrame {
            id,
            eid,
            dlc,
            data: bytes,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// The CS3 "response" marker: bit 16 of `eid` set.
    pub fn is_response(&self) -> bool {
        self.eid & EID_RESPONSE_BIT != 0
    }

    /// Decodes the 5-byte MCP2515 TX header (`H[0..5]`) plus its data bytes
    /// into a frame, per §4.2. `header[4]`'s low nibble is the DLC; the
    /// caller is expected to have already sliced `data` to that length.
    pub(crate) fn from_tx_header(header: &[u8; 5], data: &[u8]) -> Self {
        let id = ((header[0] as u32) << 3) | ((header[1] as u32 >> 5) & 0x07);
        let eid =
            (((header[1] as u32) & 0x03) << 16) | ((header[2] as u32) << 8) | (header[3] as u32);
        let dlc = header[4] & 0x0F;

        let mut bytes = [0u8; 8];
        let n = (dlc as usize).min(data.len()).min(8);
        bytes[..n].copy_from_slice(&data[..n]);

        CanFrame {
            id,
            eid,
            dlc,
            data: bytes,
        }
    }

    /// Encodes this frame into the 5-byte RXB0 header layout of §4.3.
    pub(crate) fn rx_header(&self) -> [u8; 5] {
        [
            ((self.id >> 3) & 0xFF) as u8,
            (((self.id & 0x07) << 5) as u8) | 0x08 | (((self.eid >> 16) & 0x03) as u8),
            ((self.eid >> 8) & 0xFF) as u8,
            (self.eid & 0xFF) as u8,
            self.dlc,
        ]
    }
}
