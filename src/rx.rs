//! RX injection primitives and the interrupt-line observer capability
//! (component D). The queue and interrupt state themselves live on
//! [`crate::spi::SpiEngine`], which is the sole owner per §3; this module
//! holds the free helpers and the observer trait it calls through.

use crate::frame::CanFrame;
use crate::registers::{RegisterFile, RXB0SIDH_ADDR};

/// Capability the SPI engine invokes on interrupt-line edges.
///
/// A no-op default method means a caller that doesn't care about the
/// interrupt line (e.g. most tests) never has to supply one.
pub trait IntObserver: Send {
    fn on_int_change(&mut self, asserted: bool) {
        let _ = asserted;
    }
}

/// The default observer: does nothing.
#[derive(Default)]
pub struct NoopIntObserver;

impl IntObserver for NoopIntObserver {}

/// Loads `frame` into the RXB0 register block per §4.3's byte layout.
pub(crate) fn load_rxb0(regs: &mut RegisterFile, frame: &CanFrame) {
    let header = frame.rx_header();
    for (i, byte) in header.iter().enumerate() {
        regs.write(RXB0SIDH_ADDR.wrapping_add(i as u8), *byte);
    }
    for (i, byte) in frame.data().iter().enumerate() {
        regs.write(RXB0SIDH_ADDR.wrapping_add(5 + i as u8), *byte);
    }
}
