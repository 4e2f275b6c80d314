// Retention Engine (§4.4-§4.6): owns the Focus Ring Buffer and the Context
// Catalog, and materializes clips on request.

pub mod catalog;
pub mod ring_buffer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::Config;
use crate::events::{ClipRequest, ClipResult};
use catalog::{ContextCatalog, ContextSnapshot};
use ring_buffer::{FocusRingBuffer, VideoSegment};

pub struct RetentionEngine {
    ring_buffer: FocusRingBuffer,
    catalog: ContextCatalog,
    clips_dir: PathBuf,
    context_retention_seconds: i64,
    max_context_frames: usize,
}

impl RetentionEngine {
    /// Recovers the Focus Ring Buffer from disk, opens (or creates) the
    /// Context Catalog, and runs one reconciliation pass, per §4.4/§4.5.
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(config.focus_buffer_dir())
            .context("creating focus buffer directory")?;
        std::fs::create_dir_all(config.context_buffer_dir())
            .context("creating context buffer directory")?;
        std::fs::create_dir_all(config.clips_dir()).context("creating clips directory")?;

        let ring_buffer =
            FocusRingBuffer::recover(&config.focus_buffer_dir(), config.effective_max_segments());
        let catalog = ContextCatalog::open(&config.catalog_path())?;
        catalog.reconcile()?;

        Ok(Self {
            ring_buffer,
            catalog,
            clips_dir: config.clips_dir(),
            context_retention_seconds: config.context_retention_seconds,
            max_context_frames: config.max_context_frames,
        })
    }

    pub fn ring_buffer(&self) -> &FocusRingBuffer {
        &self.ring_buffer
    }

    pub fn catalog(&self) -> &ContextCatalog {
        &self.catalog
    }

    /// Handles a finalized Focus segment: §4.4's `add_segment`.
    pub fn on_segment_complete(&self, segment: VideoSegment) {
        self.ring_buffer.add_segment(segment);
    }

    /// Handles an accepted Context snapshot: insert, then enforce the
    /// rolling time-window retention policy (§4.5).
    pub fn on_snapshot(&self, snapshot: ContextSnapshot) -> Result<()> {
        self.catalog.insert(&snapshot)?;
        let cutoff = snapshot.timestamp_ms - self.context_retention_seconds * 1_000;
        self.catalog.delete_before(cutoff)?;
        Ok(())
    }

    /// Coarser-cadence maintenance: caps total snapshot count at
    /// `MaxContextFrames`. Intended to run on a slower timer than
    /// `on_snapshot`'s per-insert `delete_before`.
    pub fn enforce_context_cap(&self) -> Result<usize> {
        self.catalog.enforce_max(self.max_context_frames)
    }

    /// Resolves a clip request against the Focus Ring Buffer and produces a
    /// single output file by concatenating the selected segments' byte
    /// contents in time order (§4.6).
    pub fn materialize_clip(&self, request: ClipRequest) -> ClipResult {
        let to_ms = request.requested_at_ms;
        let from_ms = to_ms - request.duration_seconds as i64 * 1_000;

        if request.duration_seconds == 0 {
            return ClipResult {
                request,
                output_path: None,
                materialized_span_seconds: 0.0,
                segment_count: 0,
                error: None,
            };
        }

        let segments = self.ring_buffer.segments_for_range(from_ms, to_ms);
        if segments.is_empty() {
            return ClipResult {
                request,
                output_path: None,
                materialized_span_seconds: 0.0,
                segment_count: 0,
                error: None,
            };
        }

        let span_ms = segments
            .last()
            .unwrap()
            .end_time_ms()
            .saturating_sub(segments.first().unwrap().start_time_ms);

        let filename = format!("{}.mp4", Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        let output_path = self.clips_dir.join(filename);

        match concatenate(&segments, &output_path) {
            Ok(()) => ClipResult {
                request,
                output_path: Some(output_path),
                materialized_span_seconds: span_ms as f64 / 1_000.0,
                segment_count: segments.len(),
                error: None,
            },
            Err(e) => ClipResult {
                request,
                output_path: None,
                materialized_span_seconds: 0.0,
                segment_count: segments.len(),
                error: Some(format!("{e:#}")),
            },
        }
    }
}

/// Concatenates `segments`' byte contents, in order, into one file at
/// `output_path`. Whether the result is a strictly conformant single MP4
/// stream depends on the encoder's segment framing, not this function.
fn concatenate(segments: &[VideoSegment], output_path: &std::path::Path) -> Result<()> {
    use std::io::Write;
    let mut out = std::fs::File::create(output_path)
        .with_context(|| format!("creating clip output {}", output_path.display()))?;
    for segment in segments {
        let bytes = std::fs::read(&segment.path)
            .with_context(|| format!("reading segment {}", segment.path.display()))?;
        out.write_all(&bytes)
            .with_context(|| format!("writing segment {} into clip", segment.path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_segment(dir: &std::path::Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn clip_request_with_zero_duration_yields_no_file() {
        let tmp = std::env::temp_dir().join(format!("retention-test-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&tmp);
        let buf = FocusRingBuffer::new(6);
        buf.add_segment(VideoSegment {
            path: tmp.join("a.mp4"),
            start_time_ms: 0,
            duration_seconds: 5.0,
        });

        let engine = RetentionEngine {
            ring_buffer: buf,
            catalog: ContextCatalog::open_in_memory().unwrap(),
            clips_dir: tmp.clone(),
            context_retention_seconds: 120,
            max_context_frames: 120,
        };
        let result = engine.materialize_clip(ClipRequest {
            requested_at_ms: 5_000,
            duration_seconds: 0,
        });
        assert!(result.output_path.is_none());
        assert_eq!(result.segment_count, 0);
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn clip_materialization_concatenates_selected_segments_in_order() {
        let tmp = std::env::temp_dir().join(format!("retention-test-concat-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&tmp);

        let p1 = write_segment(&tmp, "s1.mp4", b"AAAA");
        let p2 = write_segment(&tmp, "s2.mp4", b"BBBB");

        let buf = FocusRingBuffer::new(6);
        buf.add_segment(VideoSegment {
            path: p1,
            start_time_ms: 20_000,
            duration_seconds: 5.0,
        });
        buf.add_segment(VideoSegment {
            path: p2,
            start_time_ms: 25_000,
            duration_seconds: 5.0,
        });

        let engine = RetentionEngine {
            ring_buffer: buf,
            catalog: ContextCatalog::open_in_memory().unwrap(),
            clips_dir: tmp.clone(),
            context_retention_seconds: 120,
            max_context_frames: 120,
        };
        let result = engine.materialize_clip(ClipRequest {
            requested_at_ms: 30_000,
            duration_seconds: 10,
        });
        assert_eq!(result.segment_count, 2);
        assert!((result.materialized_span_seconds - 10.0).abs() < 1e-9);
        let output = result.output_path.unwrap();
        let contents = std::fs::read(&output).unwrap();
        assert_eq!(contents, b"AAAABBBB");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
