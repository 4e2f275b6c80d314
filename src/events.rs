// Event outputs (§6): produced by the core, consumed by the external control
// plane / UI. Delivered through the same drop-oldest queue plumbing as frames.

use crate::frame::ProcessedFrame;
use crate::retention::catalog::ContextSnapshot;
use crate::retention::ring_buffer::VideoSegment;

#[derive(Clone)]
pub enum PipelineEvent {
    SegmentComplete(VideoSegment),
    SnapshotRecorded(ContextSnapshot),
    PreviewFrame(ProcessedFrame),
    EncoderFailed,
}

/// A user intent to materialize a recent clip (§3).
#[derive(Debug, Clone, Copy)]
pub struct ClipRequest {
    /// UTC epoch milliseconds at which the request was issued.
    pub requested_at_ms: i64,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct ClipResult {
    pub request: ClipRequest,
    pub output_path: Option<std::path::PathBuf>,
    pub materialized_span_seconds: f64,
    pub segment_count: usize,
    pub error: Option<String>,
}
