// Encoder Worker (§4.2, Focus only): converts RawFrames to NV12, drives a
// hardware H.264 sink, finalizes fixed-duration segments.

pub mod mf;
pub mod nv12;
pub mod selector;
pub mod sink;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Receiver;

use crate::config::Config;
use crate::events::PipelineEvent;
use crate::frame::RawFrame;
use crate::queue::DropOldestSender;
use crate::retention::ring_buffer::VideoSegment;
use crate::retention::RetentionEngine;
use sink::SegmentSink;

const HNS_PER_SECOND: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    Idle,
    Writing,
    /// Terminal for the process lifetime (§9: sticky encoder failure).
    Failed,
}

/// Drives a [`SegmentSink`] through the segment lifecycle state machine of
/// §4.2. Generic over the sink so the state machine can be exercised in
/// tests against an in-memory fake instead of Media Foundation.
pub struct EncoderWorker<S: SegmentSink> {
    sink: S,
    state: EncoderState,
    width: u32,
    height: u32,
    fps: u32,
    segment_duration_seconds: u32,
    average_bitrate_bps: u32,
    buffer_dir: PathBuf,
    nv12_buf: Vec<u8>,
    frame_count: u32,
    segment_start_ms: i64,
    current_path: Option<PathBuf>,
}

impl<S: SegmentSink> EncoderWorker<S> {
    pub fn new(sink: S, config: &Config) -> Self {
        Self {
            sink,
            state: EncoderState::Idle,
            width: config.encode_width,
            height: config.encode_height,
            fps: config.encode_fps.max(1),
            segment_duration_seconds: config.segment_duration_seconds,
            average_bitrate_bps: config.average_bitrate_bps,
            buffer_dir: config.focus_buffer_dir(),
            nv12_buf: Vec::new(),
            frame_count: 0,
            segment_start_ms: 0,
            current_path: None,
        }
    }

    pub fn encoder_failed(&self) -> bool {
        self.state == EncoderState::Failed
    }

    /// Converts and writes one frame; finalizes and returns the completed
    /// segment if this push crosses the segment-duration boundary.
    pub fn push_frame(&mut self, frame: &RawFrame) -> Option<VideoSegment> {
        if self.state == EncoderState::Failed || !frame.is_well_formed() {
            return None;
        }

        if self.state == EncoderState::Idle {
            if let Err(e) = self.begin_segment() {
                eprintln!("encoder: begin_segment failed: {e:#}");
                self.state = EncoderState::Failed;
                return None;
            }
        }

        nv12::bgra_to_nv12(&frame.data, self.width, self.height, &mut self.nv12_buf);
        let sample_time = self.frame_count as i64 * (HNS_PER_SECOND / self.fps as i64);
        let sample_duration = HNS_PER_SECOND / self.fps as i64;

        if let Err(e) = self
            .sink
            .write_sample(&self.nv12_buf, sample_time, sample_duration)
        {
            eprintln!("encoder: write_sample failed: {e:#}");
            self.state = EncoderState::Failed;
            return None;
        }
        self.frame_count += 1;

        if self.frame_count >= self.fps * self.segment_duration_seconds.max(1) {
            return self.finalize_segment();
        }
        None
    }

    /// Forces the current segment to finalize, if one is open.
    pub fn flush(&mut self) -> Option<VideoSegment> {
        if self.state == EncoderState::Writing {
            self.finalize_segment()
        } else {
            None
        }
    }

    fn begin_segment(&mut self) -> anyhow::Result<()> {
        let filename = format!("{}.mp4", Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        let path = self.buffer_dir.join(filename);
        self.sink.begin_segment(
            &path,
            self.width,
            self.height,
            self.fps,
            self.average_bitrate_bps,
        )?;
        self.current_path = Some(path);
        self.segment_start_ms = Utc::now().timestamp_millis();
        self.frame_count = 0;
        self.state = EncoderState::Writing;
        Ok(())
    }

    fn finalize_segment(&mut self) -> Option<VideoSegment> {
        if let Err(e) = self.sink.finalize() {
            eprintln!("encoder: finalize failed: {e:#}");
            self.state = EncoderState::Failed;
            return None;
        }
        let path = self.current_path.take()?;
        let duration_seconds = self.frame_count as f64 / self.fps as f64;
        self.state = EncoderState::Idle;
        Some(VideoSegment {
            path,
            start_time_ms: self.segment_start_ms,
            duration_seconds,
        })
    }
}

/// Runs the Encoder Worker: consumes from `rx`, forwarding each finalized
/// segment to the retention engine and the event stream. Stops consuming
/// (but does not terminate the pipeline) once the sink reports failure.
pub fn run<S: SegmentSink>(
    mut worker: EncoderWorker<S>,
    rx: Receiver<RawFrame>,
    retention: Arc<RetentionEngine>,
    events: DropOldestSender<PipelineEvent>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        if worker.encoder_failed() {
            eprintln!("encoder: sticky failure, no longer consuming frames");
            events.send(PipelineEvent::EncoderFailed);
            break;
        }

        let frame = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => frame,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        if let Some(segment) = worker.push_frame(&frame) {
            retention.on_segment_complete(segment.clone());
            events.send(PipelineEvent::SegmentComplete(segment));
        }
    }

    if let Some(segment) = worker.flush() {
        retention.on_segment_complete(segment.clone());
        events.send(PipelineEvent::SegmentComplete(segment));
    }
}
