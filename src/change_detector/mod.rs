// Change Detector (§4.3, Context mode only): decides whether a RawFrame is
// distinct enough from the last accepted frame; if so, writes a JPEG
// snapshot and produces a ContextSnapshot for the retention engine.

pub mod phash;
pub mod snapshot;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Receiver;

use crate::events::PipelineEvent;
use crate::frame::RawFrame;
use crate::queue::DropOldestSender;
use crate::retention::catalog::ContextSnapshot;
use crate::retention::RetentionEngine;
use phash::PerceptualHash;

const THROTTLE_MS: i64 = 1_000;

/// Pure decision-and-bookkeeping half of the Change Detector, separated from
/// its I/O (JPEG write, catalog insert) so the acceptance logic in §8
/// property 3 can be tested without touching a filesystem.
pub struct ChangeDetector {
    change_threshold: u32,
    last_hash: Option<PerceptualHash>,
    last_accept_ms: Option<i64>,
}

impl ChangeDetector {
    pub fn new(change_threshold: u32) -> Self {
        Self {
            change_threshold,
            last_hash: None,
            last_accept_ms: None,
        }
    }

    /// Evaluates `frame` presented at wall-clock `now_ms`. Returns the
    /// frame's pHash if accepted, or `None` if throttled or insufficiently
    /// distinct. The hash is always computed on the frame that is kept, per
    /// §4.3's closing note, but only computed here — cheap enough that the
    /// distinction is moot — so the throttle and hash distance are evaluated
    /// together in one pass.
    pub fn evaluate(&mut self, frame: &RawFrame, now_ms: i64) -> Option<PerceptualHash> {
        if let Some(last_ms) = self.last_accept_ms {
            if now_ms - last_ms < THROTTLE_MS {
                return None;
            }
        }

        let hash = phash::compute(frame);
        let accepted = match self.last_hash {
            None => true,
            Some(last) => hash.hamming_distance(&last) > self.change_threshold,
        };

        if accepted {
            self.last_hash = Some(hash);
            self.last_accept_ms = Some(now_ms);
            Some(hash)
        } else {
            None
        }
    }
}

/// Runs the Change Detector worker: consumes raw frames, writes accepted
/// ones to disk as JPEGs, and forwards the resulting ContextSnapshot to the
/// retention engine and the event stream.
pub fn run(
    rx: Receiver<RawFrame>,
    retention: Arc<RetentionEngine>,
    context_dir: PathBuf,
    jpeg_quality: u8,
    change_threshold: u32,
    events: DropOldestSender<PipelineEvent>,
    running: Arc<AtomicBool>,
) {
    let mut detector = ChangeDetector::new(change_threshold);

    while running.load(Ordering::Relaxed) {
        let frame = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => frame,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        let now_ms = Utc::now().timestamp_millis();
        let Some(hash) = detector.evaluate(&frame, now_ms) else {
            continue;
        };

        let filename = format!("{}.jpg", Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        let path = context_dir.join(filename);

        if let Err(e) = snapshot::write_jpeg(&frame, &path, jpeg_quality) {
            eprintln!("change_detector: failed to write snapshot {}: {e:#}", path.display());
            continue;
        }

        let record = ContextSnapshot {
            path,
            timestamp_ms: now_ms,
            phash: hash.compact() as i64,
        };

        if let Err(e) = retention.on_snapshot(record.clone()) {
            eprintln!("change_detector: failed to record snapshot in catalog: {e:#}");
        }
        events.send(PipelineEvent::SnapshotRecorded(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(v: u8) -> RawFrame {
        let data = vec![v; 64 * 64 * 4];
        RawFrame::new(data, 64, 64, 0)
    }

    fn noisy_frame(seed: u8) -> RawFrame {
        let mut data = vec![0u8; 64 * 64 * 4];
        for (i, b) in data.iter_mut().enumerate() {
            *b = ((i as u32 * 37 + seed as u32 * 101) % 256) as u8;
        }
        RawFrame::new(data, 64, 64, 0)
    }

    #[test]
    fn first_frame_is_always_accepted() {
        let mut det = ChangeDetector::new(5);
        assert!(det.evaluate(&solid_frame(10), 0).is_some());
    }

    #[test]
    fn identical_frames_are_rejected_after_the_first() {
        let mut det = ChangeDetector::new(5);
        assert!(det.evaluate(&solid_frame(10), 0).is_some());
        assert!(det.evaluate(&solid_frame(10), 2_000).is_none());
    }

    #[test]
    fn throttle_suppresses_distinct_frames_within_one_second() {
        let mut det = ChangeDetector::new(5);
        assert!(det.evaluate(&noisy_frame(1), 0).is_some());
        // Distinct frame, but only 500ms later: throttle wins regardless of hash distance.
        assert!(det.evaluate(&noisy_frame(2), 500).is_none());
    }

    #[test]
    fn distinct_frame_after_throttle_window_is_accepted() {
        let mut det = ChangeDetector::new(5);
        assert!(det.evaluate(&noisy_frame(1), 0).is_some());
        assert!(det.evaluate(&noisy_frame(9), 1_200).is_some());
    }

    #[test]
    fn exactly_frame_interval_admits_a_frame() {
        let mut det = ChangeDetector::new(5);
        assert!(det.evaluate(&solid_frame(10), 0).is_some());
        assert!(det.evaluate(&noisy_frame(9), THROTTLE_MS).is_some());
    }
}
