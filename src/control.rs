// Control state (§3, §5): small, read-mostly, accessed via atomic loads/stores
// only. Per §9's design note, this is intentionally not guarded by a lock —
// the Capture Worker reads it on every iteration.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::CaptureMode;

const MODE_FOCUS: u8 = 0;
const MODE_CONTEXT: u8 = 1;

/// Shared, atomically-readable control state: current mode, paused, running.
/// Mutated only by the control plane; read on every capture iteration.
pub struct ControlState {
    mode: AtomicU8,
    paused: AtomicBool,
    running: AtomicBool,
}

impl ControlState {
    pub fn new(initial_mode: CaptureMode) -> Arc<Self> {
        Arc::new(Self {
            mode: AtomicU8::new(mode_to_u8(initial_mode)),
            paused: AtomicBool::new(false),
            running: AtomicBool::new(true),
        })
    }

    pub fn mode(&self) -> CaptureMode {
        u8_to_mode(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: CaptureMode) {
        self.mode.store(mode_to_u8(mode), Ordering::Relaxed);
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    /// Capture should idle: paused, or not running.
    pub fn should_idle(&self) -> bool {
        self.paused() || !self.running()
    }
}

fn mode_to_u8(mode: CaptureMode) -> u8 {
    match mode {
        CaptureMode::Focus => MODE_FOCUS,
        CaptureMode::Context => MODE_CONTEXT,
    }
}

fn u8_to_mode(v: u8) -> CaptureMode {
    if v == MODE_CONTEXT {
        CaptureMode::Context
    } else {
        CaptureMode::Focus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_iff_paused_or_stopped() {
        let state = ControlState::new(CaptureMode::Focus);
        assert!(!state.should_idle());

        state.set_paused(true);
        assert!(state.should_idle());
        state.set_paused(false);
        assert!(!state.should_idle());

        state.set_running(false);
        assert!(state.should_idle());
    }

    #[test]
    fn mode_round_trips() {
        let state = ControlState::new(CaptureMode::Focus);
        assert_eq!(state.mode(), CaptureMode::Focus);
        state.set_mode(CaptureMode::Context);
        assert_eq!(state.mode(), CaptureMode::Context);
    }
}
