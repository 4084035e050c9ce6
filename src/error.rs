/// Errors returned when constructing a [`CanFrame`](crate::frame::CanFrame)
/// from out-of-range values.
///
/// The SPI engine never hits these paths itself: DLC is always masked to 4
/// bits and id/eid are always masked to their bit widths by the TX/RX
/// extraction formulas. This guards callers that build frames directly
/// (ACKs, sensor events, tests).
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("standard id {0:#x} exceeds 11 bits (max 0x7FF)")]
    IdOutOfRange(u32),

    #[error("extended id {0:#x} exceeds 18 bits (max 0x3FFFF)")]
    ExtendedIdOutOfRange(u32),

    #[error("dlc {0} exceeds 8 data bytes")]
    DlcOutOfRange(u8),
}
