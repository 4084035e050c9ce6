//! Host-side simulator of an MCP2515 stand-alone CAN controller running the
//! Märklin CS3 command protocol on top of it.
//!
//! [`spi::SpiEngine`] is the byte-granular transducer a transport feeds one
//! SPI byte at a time; [`dispatch::Cs3Dispatcher`] interprets the CAN
//! frames it decodes as CS3 commands against a [`controller::Controller`]
//! implementation supplied by the embedder. [`simulator::Simulator`] wires
//! both together, plus the sensor poller, behind the two calls a driver
//! actually needs.

pub mod config;
pub mod controller;
pub mod dispatch;
mod error;
mod frame;
pub mod registers;
mod rx;
pub mod sensors;
pub mod simulator;
pub mod spi;

pub use config::{SimulatorConfig, SwitchAckDelay};
pub use controller::{Controller, SwitchPosition};
pub use dispatch::{Cs3Dispatcher, DispatchResult};
pub use error::FrameError;
pub use frame::CanFrame;
pub use rx::IntObserver;
pub use sensors::{SensorPollTask, SensorPoller};
pub use simulator::Simulator;
pub use spi::SpiEngine;
