// Segment sink seam (§4.2, §9): "any encoder that honors [the media
// parameters in §6] and fires a segment-complete notification at finalize
// time conforms." `SegmentSink` is that contract, so the Encoder Worker's
// state machine can be tested without a real media framework.

use std::path::Path;

use anyhow::Result;

pub trait SegmentSink: Send {
    /// Opens `path` and configures H.264 output / NV12 input at the given
    /// geometry, frame rate, and average bitrate. Called once per segment.
    fn begin_segment(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        average_bitrate_bps: u32,
    ) -> Result<()>;

    /// Writes one NV12 sample at `sample_time_hns` with `sample_duration_hns`
    /// (both in 100ns units).
    fn write_sample(&mut self, nv12: &[u8], sample_time_hns: i64, sample_duration_hns: i64)
        -> Result<()>;

    /// Finalizes the currently open segment.
    fn finalize(&mut self) -> Result<()>;
}
