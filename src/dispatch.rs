//! The CS3 command dispatcher (component E): maps decoded CAN frames onto
//! [`Controller`] calls, and builds the ACK / sensor-event frames the SPI
//! engine re-injects on the RX path.

use std::collections::HashMap;

use crate::controller::{Controller, SwitchPosition};
use crate::frame::{CanFrame, EID_RESPONSE_BIT};

const CMD_SYSTEM: u8 = 0x00;
const CMD_SPEED: u8 = 0x04;
const CMD_DIRECTION: u8 = 0x05;
const CMD_LIGHT: u8 = 0x06;
const CMD_SWITCH: u8 = 0x0B;
/// Reconstituted from a sensor-event frame's id/eid bits; never sent by a
/// host, only produced by [`make_sensor_event`] and recognized on round trip.
pub const CMD_SENSOR: u8 = 0x11;

const SYSTEM_STOP: u8 = 0;
const SYSTEM_GO: u8 = 1;
const SYSTEM_HALT: u8 = 2;

/// Extracts the 8-bit CS3 command code from a frame's id/eid, per §4.4's
/// `((id << 1) & 0xFE) | ((eid >> 17) & 0x01)` formula.
pub fn decode_command(frame: &CanFrame) -> u8 {
    (((frame.id << 1) & 0xFE) as u8) | (((frame.eid >> 17) & 0x01) as u8)
}

/// Builds the ACK for `frame`: same id/eid/dlc/data with the CS3 response
/// bit (eid bit 16) set.
pub fn make_ack(frame: &CanFrame) -> CanFrame {
    CanFrame {
        id: frame.id,
        eid: frame.eid | EID_RESPONSE_BIT,
        dlc: frame.dlc,
        data: frame.data,
    }
}

/// Builds an unsolicited sensor-event frame for a sensor's `old -> new`
/// transition, per §4.4.
pub fn make_sensor_event(sensor_id: u32, old: bool, new: bool) -> CanFrame {
    let data = [
        ((sensor_id >> 24) & 0xFF) as u8,
        ((sensor_id >> 16) & 0xFF) as u8,
        ((sensor_id >> 8) & 0xFF) as u8,
        (sensor_id & 0xFF) as u8,
        old as u8,
        new as u8,
        0,
        0,
    ];
    CanFrame {
        id: 0x08,
        eid: (1 << 17) | (sensor_id & 0xFFFF) | EID_RESPONSE_BIT,
        dlc: 8,
        data,
    }
}

/// Maps a CS3-encoded switch id back to the 1-based switch id used by
/// [`Controller::set_switch`]: `encoded - 0x3000 + 1`.
pub fn decode_switch_id(encoded: u32) -> u32 {
    encoded.wrapping_sub(0x3000).wrapping_add(1)
}

/// Maps a CS3 speed (0..=1000) to the simulator's 0..=14 speed scale:
/// `round(cs3 / 1000 * 14)`, clamped to the valid range. Negative input
/// (a malformed or sign-extended field) clamps to 0.
pub fn cs3_speed_to_sim(cs3: i32) -> u8 {
    if cs3 <= 0 {
        return 0;
    }
    let scaled = (cs3 as f64 / 1000.0 * 14.0).round() as i32;
    scaled.clamp(0, 14) as u8
}

fn train_id_from_data(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

/// The frames a dispatched command produces: `immediate` is emitted right
/// away, `delayed` is scheduled by the caller (see the facade's "next
/// RX-drain opportunity" policy).
#[derive(Debug, Default, Clone)]
pub struct DispatchResult {
    pub immediate: Vec<CanFrame>,
    pub delayed: Vec<CanFrame>,
}

impl DispatchResult {
    fn ack_only(frame: &CanFrame) -> Self {
        DispatchResult {
            immediate: vec![make_ack(frame)],
            delayed: Vec::new(),
        }
    }
}

/// Maps decoded CAN frames to [`Controller`] calls and builds replies.
/// Owns the one piece of state the dispatcher needs across calls: the
/// last-commanded light flag per train, since CS3 sends light and speed as
/// separate commands but the controller wants both in one call.
#[derive(Default)]
pub struct Cs3Dispatcher {
    train_lights: HashMap<u32, bool>,
}

impl Cs3Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches one decoded frame against `controller`, returning the
    /// reply frames to emit.
    pub fn dispatch(&mut self, frame: &CanFrame, controller: &dyn Controller) -> DispatchResult {
        match decode_command(frame) {
            CMD_SYSTEM => self.dispatch_system(frame, controller),
            CMD_SPEED => self.dispatch_speed(frame, controller),
            CMD_DIRECTION => self.dispatch_direction(frame, controller),
            CMD_LIGHT => self.dispatch_light(frame),
            CMD_SWITCH => self.dispatch_switch(frame, controller),
            other => {
                log::warn!("unrecognized CS3 command {other:#04x}");
                DispatchResult::ack_only(frame)
            }
        }
    }

    fn dispatch_system(&self, frame: &CanFrame, controller: &dyn Controller) -> DispatchResult {
        let data = frame.data();
        if data.len() < 5 {
            log::debug!("SYSTEM frame too short (dlc={})", frame.dlc);
            return DispatchResult::ack_only(frame);
        }
        match data[4] {
            SYSTEM_STOP => controller.stop(),
            SYSTEM_GO => controller.go(),
            SYSTEM_HALT => controller.halt(),
            sub => log::warn!("unrecognized SYSTEM sub-command {sub:#04x}"),
        }
        DispatchResult::ack_only(frame)
    }

    fn dispatch_speed(&self, frame: &CanFrame, controller: &dyn Controller) -> DispatchResult {
        let data = frame.data();
        if data.len() < 4 {
            log::debug!("SPEED frame too short (dlc={})", frame.dlc);
            return DispatchResult::ack_only(frame);
        }
        let train_id = train_id_from_data(data);

        if data.len() <= 4 {
            // A bare query: report current state, don't touch the controller.
            return DispatchResult::ack_only(frame);
        }
        if data.len() < 6 {
            log::debug!("SPEED set frame missing speed field (dlc={})", frame.dlc);
            return DispatchResult::ack_only(frame);
        }

        let cs3_speed = u16::from_be_bytes([data[4], data[5]]);
        let sim_speed = cs3_speed_to_sim(cs3_speed as i32);
        let light = *self.train_lights.get(&train_id).unwrap_or(&false);
        controller.set_train_speed(train_id, sim_speed, light);
        DispatchResult::ack_only(frame)
    }

    fn dispatch_direction(&self, frame: &CanFrame, controller: &dyn Controller) -> DispatchResult {
        let data = frame.data();
        if data.len() < 4 {
            log::debug!("DIRECTION frame too short (dlc={})", frame.dlc);
            return DispatchResult::ack_only(frame);
        }
        controller.reverse_train(train_id_from_data(data));
        DispatchResult::ack_only(frame)
    }

    fn dispatch_light(&mut self, frame: &CanFrame) -> DispatchResult {
        let data = frame.data();
        if data.len() < 6 {
            log::debug!("LIGHT frame too short (dlc={})", frame.dlc);
            return DispatchResult::ack_only(frame);
        }
        let train_id = train_id_from_data(data);
        self.train_lights.insert(train_id, data[5] != 0);
        DispatchResult::ack_only(frame)
    }

    fn dispatch_switch(&self, frame: &CanFrame, controller: &dyn Controller) -> DispatchResult {
        let data = frame.data();
        if data.len() < 5 {
            log::debug!("SWITCH frame too short (dlc={})", frame.dlc);
            return DispatchResult::ack_only(frame);
        }
        let switch_id = decode_switch_id(train_id_from_data(data));
        let position = if data[4] == 1 {
            SwitchPosition::Straight
        } else {
            SwitchPosition::Curve
        };
        controller.set_switch(switch_id, position);

        let ack = make_ack(frame);
        DispatchResult {
            immediate: vec![ack],
            delayed: vec![make_ack(frame)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingController {
        calls: RefCell<Vec<String>>,
    }

    impl Controller for RecordingController {
        fn stop(&self) {
            self.calls.borrow_mut().push("stop".into());
        }
        fn go(&self) {
            self.calls.borrow_mut().push("go".into());
        }
        fn halt(&self) {
            self.calls.borrow_mut().push("halt".into());
        }
        fn set_train_speed(&self, train_id: u32, speed: u8, light: bool) {
            self.calls
                .borrow_mut()
                .push(format!("speed({train_id},{speed},{light})"));
        }
        fn reverse_train(&self, train_id: u32) {
            self.calls.borrow_mut().push(format!("reverse({train_id})"));
        }
        fn set_switch(&self, switch_id: u32, dir: SwitchPosition) {
            self.calls
                .borrow_mut()
                .push(format!("switch({switch_id},{dir:?})"));
        }
        fn triggered_sensors(&self) -> Vec<u32> {
            Vec::new()
        }
    }

    #[test]
    fn command_round_trips_through_ack() {
        let frame = CanFrame::new(0x70, 0x0001, 6, &[0, 0, 0, 1, 1, 0xF4]).unwrap();
        assert_eq!(decode_command(&make_ack(&frame)), decode_command(&frame));
    }

    #[test]
    fn sensor_event_decodes_to_sensor_command() {
        let frame = make_sensor_event(42, false, true);
        assert_eq!(decode_command(&frame), CMD_SENSOR);
        assert_eq!(frame.data(), &[0, 0, 0, 42, 0, 1, 0, 0]);
    }

    #[test]
    fn speed_boundaries() {
        assert_eq!(cs3_speed_to_sim(0), 0);
        assert_eq!(cs3_speed_to_sim(1000), 14);
        assert_eq!(cs3_speed_to_sim(500), 7);
        assert_eq!(cs3_speed_to_sim(1001), 14);
        assert_eq!(cs3_speed_to_sim(-5), 0);
    }

    #[test]
    fn switch_id_decode() {
        assert_eq!(decode_switch_id(0x3000), 1);
        assert_eq!(decode_switch_id(0x3009), 10);
    }

    #[test]
    fn speed_set_dispatches_to_controller_with_stored_light() {
        let mut dispatcher = Cs3Dispatcher::new();
        let controller = RecordingController::default();

        // id=0x03, eid bit17 clear -> command 0x06 (LIGHT).
        let light_frame = CanFrame::new(0x03, 0x0000, 6, &[0, 0, 0, 1, 0, 1]).unwrap();
        assert_eq!(decode_command(&light_frame), CMD_LIGHT);
        dispatcher.dispatch(&light_frame, &controller);

        // id=0x02, eid bit17 clear -> command 0x04 (SPEED).
        let speed_frame = CanFrame::new(0x02, 0x0000, 6, &[0, 0, 0, 1, 1, 0xF4]).unwrap();
        assert_eq!(decode_command(&speed_frame), CMD_SPEED);
        let result = dispatcher.dispatch(&speed_frame, &controller);

        assert_eq!(controller.calls.borrow().last().unwrap(), "speed(1,7,true)");
        assert_eq!(result.immediate.len(), 1);
        assert!(result.delayed.is_empty());
    }

    #[test]
    fn switch_command_yields_immediate_and_delayed_ack() {
        let mut dispatcher = Cs3Dispatcher::new();
        let controller = RecordingController::default();
        // id=0x05, eid bit17 set -> command 0x0B (SWITCH).
        let frame = CanFrame::new(0x05, 1 << 17, 5, &[0, 0, 0x30, 0x00, 1]).unwrap();
        assert_eq!(decode_command(&frame), CMD_SWITCH);

        let result = dispatcher.dispatch(&frame, &controller);

        assert_eq!(controller.calls.borrow().last().unwrap(), "switch(1,Straight)");
        assert_eq!(result.immediate.len(), 1);
        assert_eq!(result.delayed.len(), 1);
    }

    #[test]
    fn unknown_command_is_acked_without_controller_call() {
        let mut dispatcher = Cs3Dispatcher::new();
        let controller = RecordingController::default();
        let frame = CanFrame::new(0x7F, 0x0001, 0, &[]).unwrap();
        assert!(![CMD_SYSTEM, CMD_SPEED, CMD_DIRECTION, CMD_LIGHT, CMD_SWITCH]
            .contains(&decode_command(&frame)));

        let result = dispatcher.dispatch(&frame, &controller);

        assert!(controller.calls.borrow().is_empty());
        assert_eq!(result.immediate.len(), 1);
    }
}
