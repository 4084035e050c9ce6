//! The narrow interface the dispatcher and poller consume (component G),
//! playing the role the teacher's `SpiWithCs`/`Interface` traits play for a
//! real bus: a thin capability boundary the core depends on without owning
//! an implementation of.

/// The position a switch (turnout) can be commanded into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwitchPosition {
    Straight,
    Curve,
}

/// Everything the CS3 dispatcher and sensor poller need from the downstream
/// simulation world. Implementations are expected to be cheap and
/// non-blocking: every method here is called from the single-threaded
/// byte-step or poll-tick path (§5).
pub trait Controller: Send + Sync {
    fn stop(&self);
    fn go(&self);
    fn halt(&self);

    /// `speed` is `0..=14`.
    fn set_train_speed(&self, train_id: u32, speed: u8, light: bool);
    fn reverse_train(&self, train_id: u32);
    fn set_switch(&self, switch_id: u32, dir: SwitchPosition);

    /// The ids of every sensor currently reporting triggered, across the
    /// whole layout.
    fn triggered_sensors(&self) -> Vec<u32>;
}
