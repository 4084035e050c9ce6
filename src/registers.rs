//! The flat 256-byte register space and the handful of named registers
//! this simulator actually gives meaning to (§3). Everything else in the
//! address space is plain storage: whatever was last written is what reads
//! back, with no side effects.

use modular_bitfield::prelude::*;

/// Address of the Interrupt Enable register.
pub const CANINTE_ADDR: u8 = 0x2B;
/// Address of the Interrupt Flag register.
pub const CANINTF_ADDR: u8 = 0x2C;
/// Address of TX buffer 0's control register.
pub const TXB0CTRL_ADDR: u8 = 0x30;
/// Start address of TX buffer 0's 5-byte header + 8 data bytes.
pub const TXB0SIDH_ADDR: u8 = 0x31;
/// Address of TX buffer 1's control register (TXREQ surfaced in READ_STATUS only).
pub const TXB1CTRL_ADDR: u8 = 0x40;
/// Address of TX buffer 2's control register (TXREQ surfaced in READ_STATUS only).
pub const TXB2CTRL_ADDR: u8 = 0x50;
/// Start address of RX buffer 0's 5-byte header + 8 data bytes.
pub const RXB0SIDH_ADDR: u8 = 0x61;

/// Bit 3 of a `TXBnCTRL` register: the Message Transmit Request bit.
pub const TXREQ_BIT: u8 = 0x08;

/// Interrupt Enable Register (CANINTE) / Interrupt Flag Register (CANINTF)
/// share this bit layout (§3).
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct IntFlags {
    pub rx0if: bool,
    pub rx1if: bool,
    pub tx0if: bool,
    pub tx1if: bool,
    pub tx2if: bool,
    pub errif: bool,
    pub wakif: bool,
    pub merrf: bool,
}

/// Transmit Buffer Control Register: only the TXREQ bit is modeled, since
/// priority/error/abort bits have no effect in this simulator.
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct TxbCtrl {
    #[skip]
    __: B3,
    pub txreq: bool,
    #[skip]
    __: B4,
}

/// The byte layout returned by the READ_STATUS instruction (0xA0), per §4.1.
#[bitfield]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ReadStatusResponse {
    pub rx0if: bool,
    pub rx1if: bool,
    pub txreq0: bool,
    pub tx0if: bool,
    pub txreq1: bool,
    pub tx1if: bool,
    pub txreq2: bool,
    pub tx2if: bool,
}

/// The flat 256-byte MCP2515 register space.
#[derive(Clone)]
pub struct RegisterFile(pub [u8; 256]);

impl Default for RegisterFile {
    fn default() -> Self {
        RegisterFile([0u8; 256])
    }
}

impl RegisterFile {
    pub fn read(&self, addr: u8) -> u8 {
        self.0[addr as usize]
    }

    pub fn write(&mut self, addr: u8, value: u8) {
        self.0[addr as usize] = value;
    }

    pub fn canintf(&self) -> IntFlags {
        IntFlags::from_bytes([self.read(CANINTF_ADDR)])
    }

    pub fn set_canintf(&mut self, flags: IntFlags) {
        self.write(CANINTF_ADDR, flags.into_bytes()[0]);
    }

    pub fn caninte(&self) -> IntFlags {
        IntFlags::from_bytes([self.read(CANINTE_ADDR)])
    }

    pub fn txbctrl(&self, addr: u8) -> TxbCtrl {
        TxbCtrl::from_bytes([self.read(addr)])
    }

    /// Computes the READ_STATUS byte from the current register contents
    /// (§4.1).
    pub fn read_status(&self) -> u8 {
        let intf = self.canintf();
        ReadStatusResponse::new()
            .with_rx0if(intf.rx0if())
            .with_rx1if(intf.rx1if())
            .with_txreq0(self.txbctrl(TXB0CTRL_ADDR).txreq())
            .with_tx0if(intf.tx0if())
            .with_txreq1(self.txbctrl(TXB1CTRL_ADDR).txreq())
            .with_tx1if(intf.tx1if())
            .with_txreq2(self.txbctrl(TXB2CTRL_ADDR).txreq())
            .with_tx2if(intf.tx2if())
            .into_bytes()[0]
    }

    /// `true` if `(CANINTF & CANINTE) != 0`.
    pub fn interrupt_asserted(&self) -> bool {
        (self.read(CANINTF_ADDR) & self.read(CANINTE_ADDR)) != 0
    }
}
