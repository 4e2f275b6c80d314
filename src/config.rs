// Persisted configuration (§6) — consumed from outside the core (settings
// UI, defaults file, etc). Every field has a default so a partial JSON blob
// deserializes cleanly.

use serde::{Deserialize, Serialize};

fn default_encode_width() -> u32 {
    1920
}
fn default_encode_height() -> u32 {
    1080
}
fn default_focus_fps() -> u32 {
    30
}
fn default_context_fps() -> u32 {
    1
}
fn default_segment_duration_seconds() -> u32 {
    5
}
fn default_max_segments() -> usize {
    6
}
fn default_max_context_frames() -> usize {
    120
}
fn default_context_retention_seconds() -> i64 {
    120
}
fn default_change_threshold() -> u32 {
    5
}
fn default_reinit_delay_ms() -> u64 {
    1_000
}
fn default_queue_capacity() -> usize {
    256
}
fn default_preview_queue_capacity() -> usize {
    64
}
fn default_jpeg_quality() -> u8 {
    85
}
fn default_average_bitrate_bps() -> u32 {
    8_000_000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Focus,
    Context,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_encode_width")]
    pub encode_width: u32,
    #[serde(default = "default_encode_height")]
    pub encode_height: u32,
    #[serde(default = "default_focus_fps")]
    pub encode_fps: u32,
    #[serde(default = "default_segment_duration_seconds")]
    pub segment_duration_seconds: u32,
    /// Named in §6's persisted-configuration list; retained for compatibility
    /// but superseded by `max_segments` (see DESIGN.md ring-buffer open
    /// question). When set, `buffer_duration_seconds / segment_duration_seconds`
    /// is used to derive `max_segments` if the latter is left at its default.
    #[serde(default)]
    pub buffer_duration_seconds: Option<u32>,
    #[serde(default = "default_max_segments")]
    pub max_segments: usize,
    #[serde(default)]
    pub capture_mode: CaptureMode,
    #[serde(default)]
    pub ocr_enabled: bool,

    #[serde(default = "default_context_fps")]
    pub context_fps: u32,
    #[serde(default = "default_max_context_frames")]
    pub max_context_frames: usize,
    #[serde(default = "default_context_retention_seconds")]
    pub context_retention_seconds: i64,
    #[serde(default = "default_change_threshold")]
    pub change_threshold: u32,

    #[serde(default = "default_reinit_delay_ms")]
    pub reinit_delay_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_preview_queue_capacity")]
    pub preview_queue_capacity: usize,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_average_bitrate_bps")]
    pub average_bitrate_bps: u32,

    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

fn default_base_dir() -> String {
    "data".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encode_width: default_encode_width(),
            encode_height: default_encode_height(),
            encode_fps: default_focus_fps(),
            segment_duration_seconds: default_segment_duration_seconds(),
            buffer_duration_seconds: None,
            max_segments: default_max_segments(),
            capture_mode: CaptureMode::default(),
            ocr_enabled: false,
            context_fps: default_context_fps(),
            max_context_frames: default_max_context_frames(),
            context_retention_seconds: default_context_retention_seconds(),
            change_threshold: default_change_threshold(),
            reinit_delay_ms: default_reinit_delay_ms(),
            queue_capacity: default_queue_capacity(),
            preview_queue_capacity: default_preview_queue_capacity(),
            jpeg_quality: default_jpeg_quality(),
            average_bitrate_bps: default_average_bitrate_bps(),
            base_dir: default_base_dir(),
        }
    }
}

impl Config {
    /// Resolve the effective ring-buffer cap: `max_segments` unless the
    /// legacy `buffer_duration_seconds` field was supplied and `max_segments`
    /// was left at its default, in which case the duration is converted.
    pub fn effective_max_segments(&self) -> usize {
        match self.buffer_duration_seconds {
            Some(secs) if self.max_segments == default_max_segments() => {
                let per = self.segment_duration_seconds.max(1);
                ((secs / per).max(1)) as usize
            }
            _ => self.max_segments,
        }
    }

    pub fn focus_buffer_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.base_dir).join("focus_buffer")
    }

    pub fn context_buffer_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.base_dir).join("context_buffer")
    }

    pub fn catalog_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.base_dir).join("index.sqlite")
    }

    pub fn clips_dir(&self) -> std::path::PathBuf {
        std::path::Path::new("clips").to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.encode_fps, 30);
        assert_eq!(cfg.context_fps, 1);
        assert_eq!(cfg.max_segments, 6);
        assert_eq!(cfg.change_threshold, 5);
        assert_eq!(cfg.context_retention_seconds, 120);
        assert_eq!(cfg.jpeg_quality, 85);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"encode_fps": 60}"#).unwrap();
        assert_eq!(cfg.encode_fps, 60);
        assert_eq!(cfg.max_segments, 6);
    }

    #[test]
    fn legacy_buffer_duration_converts_to_max_segments() {
        let cfg: Config =
            serde_json::from_str(r#"{"buffer_duration_seconds": 30, "segment_duration_seconds": 5}"#)
                .unwrap();
        assert_eq!(cfg.effective_max_segments(), 6);
    }
}
