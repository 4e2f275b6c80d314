// Capture Worker (§4.1): drives a desktop-duplication session and delivers
// RawFrames at a per-mode rate, re-initializing on transient failure.
//
// The acquire-and-decide step (`tick`) is split from the real-time pacing
// loop (`run`) so the former can be driven directly in tests against a
// scripted `DisplayDuplicator`, without waiting on real sleeps.

pub mod duplication;
pub mod tonemap;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CaptureMode, Config};
use crate::control::ControlState;
use crate::error::AcquisitionError;
use crate::frame::{MonotonicClock, RawFrame};
use crate::queue::DropOldestSender;
use duplication::DisplayDuplicator;

/// Outcome of one acquisition attempt against an already-initialized
/// session.
pub enum TickOutcome {
    Frame(RawFrame),
    /// No frame admitted this tick (duplication timeout with no prior
    /// frame to repeat, per §8's cold-start boundary behavior).
    NoFrame,
    /// The session must be disposed and rebuilt.
    ReinitNeeded,
}

/// One acquisition attempt plus the repeat-frame and access-lost dispatch
/// described in §4.1. Assumes rate pacing has already admitted this tick.
pub fn tick<D: DisplayDuplicator>(
    session: &mut D,
    last_frame: &mut Option<RawFrame>,
    clock: &MonotonicClock,
) -> TickOutcome {
    match session.acquire_frame(100) {
        Ok(frame) => {
            *last_frame = Some(frame.clone());
            TickOutcome::Frame(frame)
        }
        Err(AcquisitionError::Timeout) => match last_frame {
            Some(lf) => {
                let mut repeat = lf.clone();
                repeat.timestamp_hns = clock.now_hns();
                TickOutcome::Frame(repeat)
            }
            None => TickOutcome::NoFrame,
        },
        Err(AcquisitionError::AccessLost) => TickOutcome::ReinitNeeded,
        Err(AcquisitionError::Other(e)) => {
            eprintln!("capture: acquisition failed, re-initializing: {e:#}");
            TickOutcome::ReinitNeeded
        }
    }
}

const HNS_PER_SECOND: i64 = 10_000_000;

fn frame_interval_hns(mode: CaptureMode) -> i64 {
    match mode {
        CaptureMode::Focus => HNS_PER_SECOND / 30,
        CaptureMode::Context => HNS_PER_SECOND,
    }
}

/// Runs the Capture Worker until `control` reports not-running. `make_session`
/// is called (and retried on failure) every time a session must be built or
/// rebuilt — both at startup and after an access-lost re-init.
pub fn run<D, F>(
    mut make_session: F,
    control: Arc<ControlState>,
    out: DropOldestSender<RawFrame>,
    config: &Config,
) where
    D: DisplayDuplicator,
    F: FnMut() -> anyhow::Result<D>,
{
    let reinit_delay = Duration::from_millis(config.reinit_delay_ms);
    let clock = MonotonicClock::new();
    let mut session: Option<D> = None;
    let mut last_frame: Option<RawFrame> = None;
    let mut last_emit_tick: i64 = i64::MIN / 2;

    while control.running() {
        if control.should_idle() {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }

        if session.is_none() {
            match make_session() {
                Ok(s) => session = Some(s),
                Err(e) => {
                    eprintln!("capture: session initialization failed: {e:#}");
                    std::thread::sleep(reinit_delay);
                    continue;
                }
            }
        }

        let now = clock.now_hns();
        if now - last_emit_tick < frame_interval_hns(control.mode()) {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }

        match tick(session.as_mut().unwrap(), &mut last_frame, &clock) {
            TickOutcome::Frame(frame) => {
                last_emit_tick = now;
                out.send(frame);
            }
            TickOutcome::NoFrame => {
                std::thread::sleep(Duration::from_millis(1));
            }
            TickOutcome::ReinitNeeded => {
                session = None;
                std::thread::sleep(reinit_delay);
            }
        }
    }

    // Terminated: sessions released (drop), last-frame cleared.
    drop(session);
    drop(last_frame);
}

#[cfg(test)]
mod tests {
    use super::duplication::fake::FakeDuplicator;
    use super::*;

    fn frame(v: u8, ts: i64) -> RawFrame {
        RawFrame::new(vec![v; 4 * 4 * 4], 4, 4, ts)
    }

    #[test]
    fn cold_start_timeout_with_no_last_frame_yields_no_frame() {
        let mut dup = FakeDuplicator::new(vec![Err(AcquisitionError::Timeout)]);
        let mut last_frame: Option<RawFrame> = None;
        let clock = MonotonicClock::new();
        let outcome = tick(&mut dup, &mut last_frame, &clock);
        assert!(matches!(outcome, TickOutcome::NoFrame));
    }

    #[test]
    fn timeout_with_a_last_frame_repeats_it_with_a_fresh_timestamp() {
        let mut dup = FakeDuplicator::new(vec![Err(AcquisitionError::Timeout)]);
        let mut last_frame = Some(frame(7, 100));
        let clock = MonotonicClock::new();
        match tick(&mut dup, &mut last_frame, &clock) {
            TickOutcome::Frame(f) => {
                assert_eq!(f.data[0], 7);
                assert_ne!(f.timestamp_hns, 100);
            }
            _ => panic!("expected a repeated frame"),
        }
    }

    #[test]
    fn access_lost_requests_reinit() {
        let mut dup = FakeDuplicator::new(vec![Err(AcquisitionError::AccessLost)]);
        let mut last_frame = Some(frame(1, 0));
        let clock = MonotonicClock::new();
        assert!(matches!(
            tick(&mut dup, &mut last_frame, &clock),
            TickOutcome::ReinitNeeded
        ));
    }

    #[test]
    fn successful_acquisition_updates_last_frame() {
        let mut dup = FakeDuplicator::new(vec![Ok(frame(9, 42))]);
        let mut last_frame: Option<RawFrame> = None;
        let clock = MonotonicClock::new();
        match tick(&mut dup, &mut last_frame, &clock) {
            TickOutcome::Frame(f) => assert_eq!(f.data[0], 9),
            _ => panic!("expected a fresh frame"),
        }
        assert!(last_frame.is_some());
    }

    #[test]
    fn access_lost_then_recovery_sequence_continues_flowing() {
        // Mirrors S2: after an access-lost signal, subsequent acquisitions
        // (post re-init, modeled here as a new session) keep producing frames.
        let mut dup = FakeDuplicator::new(vec![
            Ok(frame(1, 0)),
            Err(AcquisitionError::AccessLost),
        ]);
        let clock = MonotonicClock::new();
        let mut last_frame = None;
        assert!(matches!(tick(&mut dup, &mut last_frame, &clock), TickOutcome::Frame(_)));
        assert!(matches!(
            tick(&mut dup, &mut last_frame, &clock),
            TickOutcome::ReinitNeeded
        ));

        let mut recovered = FakeDuplicator::new(vec![Ok(frame(2, 0))]);
        assert!(matches!(
            tick(&mut recovered, &mut last_frame, &clock),
            TickOutcome::Frame(_)
        ));
    }
}
