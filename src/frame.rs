// Frame types shared across pipeline stages.

use std::sync::Arc;
use std::time::Instant;

/// Pixel format of a [`RawFrame`]'s backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit per channel, byte 0 = blue, byte 2 = red.
    Bgra8,
}

/// An uncompressed capture, BGRA 8-bit per channel, 4 bytes per pixel.
///
/// `timestamp_hns` is a monotonic 100-nanosecond timestamp assigned at
/// acquisition time; it is not wall-clock time and is only meaningful
/// relative to other timestamps from the same run.
#[derive(Clone)]
pub struct RawFrame {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp_hns: i64,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_hns: i64) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
            format: PixelFormat::Bgra8,
            timestamp_hns,
        }
    }

    /// Required buffer length for this frame's declared dimensions.
    pub fn required_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() >= self.required_len()
    }
}

/// A BGRA frame forwarded to a UI preview consumer. Separate from [`RawFrame`]
/// so the preview stage can downsample or reformat without affecting the
/// frame still in flight to the encoder/detector.
#[derive(Clone)]
pub struct ProcessedFrame {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// Monotonic clock helper: 100-nanosecond ticks since an arbitrary epoch fixed
/// at process start. Only differences between two calls are meaningful.
#[derive(Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Current time as 100ns ticks since this clock was created.
    pub fn now_hns(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64 / 100
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
