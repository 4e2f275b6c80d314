// Pipeline wiring (§2): assembles the fixed stage graph — Capture Worker,
// Router, Encoder Worker, Change Detector, Retention Engine — connected by
// bounded drop-oldest queues, plus a clip-materialization request handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;

use crate::capture::{self, duplication::DxgiDuplicator};
use crate::change_detector;
use crate::config::{CaptureMode, Config};
use crate::control::ControlState;
use crate::encoder::{self, mf::MfSinkWriter, EncoderWorker};
use crate::events::{ClipRequest, ClipResult, PipelineEvent};
use crate::queue;
use crate::retention::RetentionEngine;
use crate::router;

/// A running instance of the capture-to-retention pipeline. Dropping or
/// calling `stop` tears every worker down in dependency order.
pub struct Pipeline {
    control: Arc<ControlState>,
    running: Arc<AtomicBool>,
    retention: Arc<RetentionEngine>,
    clip_tx: queue::DropOldestSender<ClipRequest>,
    clip_result_rx: crossbeam_channel::Receiver<ClipResult>,
    event_rx: crossbeam_channel::Receiver<PipelineEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Builds and starts every worker per §2's stage graph. Media Foundation
    /// startup happens once here, ahead of the Encoder Worker thread, followed
    /// by the one-time hardware encoder enumeration/selection of §4.2 (purely
    /// diagnostic — the sink writer itself never hard-binds to the result).
    pub fn start(config: Config) -> Result<Self> {
        MfSinkWriter::startup()?;
        encoder::selector::select_and_log();

        let retention = Arc::new(RetentionEngine::open(&config)?);
        let control = ControlState::new(config.capture_mode);
        let running = Arc::new(AtomicBool::new(true));

        let (capture_tx, capture_rx) = queue::bounded(config.queue_capacity);
        let (enc_tx, enc_rx) = queue::bounded(config.queue_capacity);
        let (cd_tx, cd_rx) = queue::bounded(config.queue_capacity);
        let (event_tx, event_rx) = queue::bounded(config.preview_queue_capacity.max(16));
        let (clip_tx, clip_rx) = queue::bounded::<ClipRequest>(16);
        let (clip_result_tx, clip_result_rx) = crossbeam_channel::bounded::<ClipResult>(16);

        let mut handles = Vec::new();

        handles.push({
            let control = control.clone();
            let config = config.clone();
            thread::spawn(move || {
                capture::run(|| DxgiDuplicator::initialize(), control, capture_tx, &config);
            })
        });

        handles.push({
            let control = control.clone();
            let running = running.clone();
            thread::spawn(move || {
                router::run(capture_rx, control, enc_tx, cd_tx, None, None, false, running);
            })
        });

        handles.push({
            let retention = retention.clone();
            let events = event_tx.clone();
            let running = running.clone();
            let config = config.clone();
            thread::spawn(move || {
                let worker = EncoderWorker::new(MfSinkWriter::new(), &config);
                encoder::run(worker, enc_rx, retention, events, running);
            })
        });

        handles.push({
            let retention = retention.clone();
            let events = event_tx.clone();
            let running = running.clone();
            let context_dir = config.context_buffer_dir();
            let jpeg_quality = config.jpeg_quality;
            let change_threshold = config.change_threshold;
            thread::spawn(move || {
                change_detector::run(
                    cd_rx,
                    retention,
                    context_dir,
                    jpeg_quality,
                    change_threshold,
                    events,
                    running,
                );
            })
        });

        handles.push({
            let retention = retention.clone();
            let running = running.clone();
            thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    let request = match clip_rx.recv_timeout(Duration::from_millis(200)) {
                        Ok(r) => r,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    };
                    let result = retention.materialize_clip(request);
                    let _ = clip_result_tx.send(result);
                }
            })
        });

        Ok(Self {
            control,
            running,
            retention,
            clip_tx,
            clip_result_rx,
            event_rx,
            handles,
        })
    }

    pub fn set_mode(&self, mode: CaptureMode) {
        self.control.set_mode(mode);
    }

    pub fn set_paused(&self, paused: bool) {
        self.control.set_paused(paused);
    }

    pub fn request_clip(&self, request: ClipRequest) {
        self.clip_tx.send(request);
    }

    pub fn try_recv_clip_result(&self) -> Option<ClipResult> {
        self.clip_result_rx.try_recv().ok()
    }

    pub fn try_recv_event(&self) -> Option<PipelineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn retention(&self) -> &Arc<RetentionEngine> {
        &self.retention
    }

    /// Propagates cancellation to every worker and joins them in order, per
    /// §5's cancellation discipline: the encoder flushes, the change
    /// detector stops consuming, the capture worker tears down its session.
    pub fn stop(mut self) {
        self.control.set_running(false);
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        let _ = MfSinkWriter::shutdown();
    }
}
