//! The facade (component G) that wires the SPI engine, CS3 dispatcher and
//! sensor poller into the one object a transport binary holds.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::SimulatorConfig;
use crate::controller::Controller;
use crate::dispatch::Cs3Dispatcher;
use crate::rx::IntObserver;
use crate::sensors::SensorPoller;
use crate::spi::SpiEngine;

/// Ties `SpiEngine` + `Cs3Dispatcher` + `SensorPoller` together behind the
/// two operations a driver actually calls: `step` for each SPI byte, and
/// `poll_sensors` on each timer tick.
pub struct Simulator<C: Controller> {
    engine: SpiEngine,
    dispatcher: Cs3Dispatcher,
    poller: SensorPoller,
    controller: Arc<C>,
    config: SimulatorConfig,
    pending_delayed: VecDeque<crate::frame::CanFrame>,
}

impl<C: Controller> Simulator<C> {
    pub fn new(controller: Arc<C>, config: SimulatorConfig) -> Self {
        Simulator {
            engine: SpiEngine::new(),
            dispatcher: Cs3Dispatcher::new(),
            poller: SensorPoller::new(),
            controller,
            config,
            pending_delayed: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Installs the capability invoked on interrupt-line edges.
    pub fn set_int_observer(&mut self, observer: impl IntObserver + 'static) {
        self.engine.set_int_observer(observer);
    }

    /// Feeds one SPI byte through the engine, dispatching any frame it
    /// surfaces and draining one delayed ACK if RXB0 has room.
    pub fn step(&mut self, byte: u8) -> u8 {
        let (response, frame) = self.engine.step(byte);

        if let Some(frame) = frame {
            let result = self.dispatcher.dispatch(&frame, self.controller.as_ref());
            self.engine.queue_rx(result.immediate);
            self.pending_delayed.extend(result.delayed);
        }

        if !self.engine.rx_buffer_full() {
            if let Some(delayed) = self.pending_delayed.pop_front() {
                self.engine.queue_rx([delayed]);
            }
        }

        response
    }

    /// Samples the controller's sensor state and queues any resulting
    /// sensor-event frames into the RX path.
    pub fn poll_sensors(&mut self) {
        let events = self.poller.poll_once(self.controller.as_ref());
        self.engine.queue_rx(events);
    }
}
