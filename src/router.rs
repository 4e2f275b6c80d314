// Router (§4.7): forwards raw frames from capture to exactly one of the
// Encoder Worker (Focus) or Change Detector (Context) per current mode,
// plus the optional preview and OCR side-stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::config::CaptureMode;
use crate::control::ControlState;
use crate::frame::{ProcessedFrame, RawFrame};
use crate::queue::DropOldestSender;

pub fn run(
    rx: Receiver<RawFrame>,
    control: Arc<ControlState>,
    to_encoder: DropOldestSender<RawFrame>,
    to_change_detector: DropOldestSender<RawFrame>,
    to_preview: Option<DropOldestSender<ProcessedFrame>>,
    to_ocr: Option<DropOldestSender<RawFrame>>,
    ocr_enabled: bool,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let frame = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => frame,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        match control.mode() {
            CaptureMode::Focus => {
                to_encoder.send(frame.clone());
            }
            CaptureMode::Context => {
                to_change_detector.send(frame.clone());
            }
        }

        if let Some(preview) = &to_preview {
            preview.send(ProcessedFrame {
                data: frame.data.clone(),
                width: frame.width,
                height: frame.height,
            });
        }

        if ocr_enabled {
            if let Some(ocr) = &to_ocr {
                ocr.send(frame);
            }
        }
    }
}
