use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::capture::domain::frame_source::{FrameSource, FrameSourceError};
use crate::display::frame_renderer::FrameRenderer;
use crate::inference::inference_logger::InferenceLogger;
use crate::inference::scheduler::{InferenceScheduler, OfferOutcome};
use crate::inference::status::StatusSink;

/// Result of a single display tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// A frame was read, rendered and offered to the scheduler.
    Rendered(OfferOutcome),
    /// No frame this tick; nothing was offered.
    Skipped(FrameSourceError),
}

/// Fixed-cadence loop: read a frame, render it, offer it for inference.
///
/// Nothing here waits on inference. The scheduler turns frames away while a
/// job is in flight and the renderer reads whatever status was last published.
pub struct DisplayLoop {
    source: Box<dyn FrameSource>,
    scheduler: InferenceScheduler,
    renderer: Box<dyn FrameRenderer>,
    status: StatusSink,
    interval: Duration,
    last_issue: Option<&'static str>,
}

impl DisplayLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        scheduler: InferenceScheduler,
        renderer: Box<dyn FrameRenderer>,
        interval: Duration,
    ) -> Self {
        let status = scheduler.status();
        Self {
            source,
            scheduler,
            renderer,
            status,
            interval,
            last_issue: None,
        }
    }

    pub fn scheduler(&self) -> &InferenceScheduler {
        &self.scheduler
    }

    pub fn tick(&mut self) -> TickOutcome {
        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(e) => {
                self.report_issue(&e);
                return TickOutcome::Skipped(e);
            }
        };
        match self.last_issue.take() {
            Some(issue) if issue == FrameSourceError::EndOfStream.status_text() => {}
            Some(_) => log::info!("Camera frames resumed"),
            None => {}
        }

        if let Err(e) = self.renderer.render(&frame, &self.status.current()) {
            log::warn!("Failed to render frame {}: {e}", frame.index());
        }
        TickOutcome::Rendered(self.scheduler.offer(&frame))
    }

    /// Ticks every `interval` until `stop` is set or `max_ticks` have run.
    /// Returns the number of ticks performed.
    pub fn run(&mut self, stop: &AtomicBool, max_ticks: Option<u64>) -> u64 {
        let ticker = crossbeam_channel::tick(self.interval);
        let mut ticks = 0u64;

        while !stop.load(Ordering::Relaxed) && max_ticks.map_or(true, |max| ticks < max) {
            if let TickOutcome::Rendered(OfferOutcome::WorkerStopped) = self.tick() {
                log::warn!("Inference is unavailable; continuing display only");
            }
            ticks += 1;
            if ticker.recv().is_err() {
                break;
            }
        }
        ticks
    }

    /// Stops the scheduler and hands back its logger.
    pub fn shutdown(self) -> Option<Box<dyn InferenceLogger>> {
        self.scheduler.shutdown()
    }

    fn report_issue(&mut self, error: &FrameSourceError) {
        let text = error.status_text();
        if self.last_issue != Some(text) {
            match error {
                FrameSourceError::EndOfStream => log::debug!("Capture: {error}"),
                _ => log::warn!("Capture: {error}"),
            }
            self.last_issue = Some(text);
        }
        if let Err(e) = self.renderer.capture_issue(error) {
            log::warn!("Failed to render capture status: {e}");
        }
    }
}
