use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::classification::domain::classifier::Classifier;
use crate::detection::domain::face_extractor::FaceExtractor;
use crate::inference::error::SchedulerError;
use crate::inference::inference_logger::InferenceLogger;
use crate::inference::job::InferenceJob;
use crate::inference::status::StatusSink;
use crate::shared::constants::DEFAULT_FAKE_THRESHOLD;
use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Aggregated scores strictly above this are labelled FAKE.
    pub fake_threshold: f32,
    pub worker_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fake_threshold: DEFAULT_FAKE_THRESHOLD,
            worker_name: "inference-worker".to_string(),
        }
    }
}

/// What [`InferenceScheduler::offer`] did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfferOutcome {
    /// The scheduler was idle; a job is now running on a copy of the frame.
    Launched,
    /// A job was already in flight; the frame is not used for inference.
    Dropped,
    /// The worker thread is gone; no job can run.
    WorkerStopped,
}

/// Gates inference to one job at a time on a single reusable worker thread.
///
/// The busy flag is claimed with a compare-exchange in [`offer`](Self::offer)
/// and released by the worker after the job's status is published. While a
/// job is in flight further frames are dropped, never queued.
pub struct InferenceScheduler {
    busy: Arc<AtomicBool>,
    jobs: Option<Sender<Frame>>,
    status: StatusSink,
    worker: Option<JoinHandle<Box<dyn InferenceLogger>>>,
    launched: AtomicU64,
    dropped: AtomicU64,
}

impl InferenceScheduler {
    pub fn spawn(
        extractor: Box<dyn FaceExtractor>,
        classifier: Box<dyn Classifier>,
        config: SchedulerConfig,
        mut logger: Box<dyn InferenceLogger>,
    ) -> Result<Self, SchedulerError> {
        let busy = Arc::new(AtomicBool::new(false));
        let status = StatusSink::new();
        // One slot: a frame is only ever sent after the busy flag is claimed.
        let (tx, rx) = crossbeam_channel::bounded::<Frame>(1);

        let job = InferenceJob::new(extractor, classifier, config.fake_threshold);
        let worker_busy = busy.clone();
        let worker_status = status.clone();
        logger.info(&format!(
            "Inference worker '{}' started (fake threshold {:.2})",
            config.worker_name, config.fake_threshold
        ));

        let worker = thread::Builder::new()
            .name(config.worker_name)
            .spawn(move || run_worker(rx, job, &worker_busy, &worker_status, logger))
            .map_err(SchedulerError::Spawn)?;

        Ok(Self {
            busy,
            jobs: Some(tx),
            status,
            worker: Some(worker),
            launched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Starts a job on a copy of `frame` if no job is in flight.
    ///
    /// Never waits for inference.
    pub fn offer(&self, frame: &Frame) -> OfferOutcome {
        let Some(jobs) = self.jobs.as_ref() else {
            return OfferOutcome::WorkerStopped;
        };
        if self.worker.as_ref().map_or(true, JoinHandle::is_finished) {
            return OfferOutcome::WorkerStopped;
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return OfferOutcome::Dropped;
        }

        match jobs.try_send(frame.clone()) {
            Ok(()) => {
                self.launched.fetch_add(1, Ordering::Relaxed);
                OfferOutcome::Launched
            }
            // A queued frame always holds the flag, so the worker will release it.
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                OfferOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::Release);
                log::error!("Inference worker has stopped; frame {} discarded", frame.index());
                OfferOutcome::WorkerStopped
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Handle to the published status, for the presentation layer.
    pub fn status(&self) -> StatusSink {
        self.status.clone()
    }

    /// Jobs started so far.
    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::Relaxed)
    }

    /// Frames turned away because a job was in flight.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Polls until no job is in flight. Returns `false` on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Closes the job queue, lets an in-flight job finish, and joins the
    /// worker. Returns the logger unless the worker panicked.
    pub fn shutdown(mut self) -> Option<Box<dyn InferenceLogger>> {
        self.stop_worker()
    }

    fn stop_worker(&mut self) -> Option<Box<dyn InferenceLogger>> {
        drop(self.jobs.take());
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(logger) => Some(logger),
            Err(_) => {
                log::error!("Inference worker panicked");
                None
            }
        }
    }
}

impl Drop for InferenceScheduler {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// Clears the busy flag when dropped, including during unwinding.
struct BusyRelease<'a>(&'a AtomicBool);

impl Drop for BusyRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn run_worker(
    jobs: Receiver<Frame>,
    mut job: InferenceJob,
    busy: &AtomicBool,
    status: &StatusSink,
    mut logger: Box<dyn InferenceLogger>,
) -> Box<dyn InferenceLogger> {
    for frame in jobs {
        let _release = BusyRelease(busy);
        let started = Instant::now();
        let outcome = job.run_to_status(&frame, logger.as_mut());
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        status.publish(outcome.clone());

        let observed = panic::catch_unwind(AssertUnwindSafe(|| {
            logger.timing("job", elapsed_ms);
            logger.outcome(&outcome);
        }));
        if observed.is_err() {
            log::error!("Inference logger panicked on frame {}", frame.index());
        }
    }
    logger.info("Inference worker stopped");
    logger
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::face_batch::FaceBatch;
    use crate::inference::error::InferenceError;
    use crate::inference::inference_logger::{NullInferenceLogger, StatsInferenceLogger};
    use crate::inference::job::tests::{frame, StubClassifier, StubExtractor};
    use crate::inference::status::InferenceStatus;
    use crate::inference::verdict::Label;
    use crossbeam_channel::{Receiver, Sender};
    use rstest::rstest;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    /// Signals on `entered` when called, then blocks until `gate` yields.
    struct GatedClassifier {
        entered: Sender<()>,
        gate: Receiver<()>,
        score: f32,
    }

    impl Classifier for GatedClassifier {
        fn classify(&mut self, batch: &FaceBatch) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            let _ = self.entered.send(());
            self.gate.recv()?;
            Ok(vec![self.score; batch.len()])
        }
    }

    /// Pops one scripted response per call.
    struct ScriptedClassifier {
        script: VecDeque<Result<f32, String>>,
    }

    impl Classifier for ScriptedClassifier {
        fn classify(&mut self, batch: &FaceBatch) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            match self.script.pop_front() {
                Some(Ok(score)) => Ok(vec![score; batch.len()]),
                Some(Err(e)) => Err(e.into()),
                None => Err("script exhausted".into()),
            }
        }
    }

    /// Tracks how many classify calls overlap.
    struct OverlapClassifier {
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl Classifier for OverlapClassifier {
        fn classify(&mut self, batch: &FaceBatch) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![0.1; batch.len()])
        }
    }

    struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn classify(&mut self, _batch: &FaceBatch) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            panic!("model crashed");
        }
    }

    /// Panics outside the job boundary, taking the worker down.
    struct PanickingLogger;

    impl InferenceLogger for PanickingLogger {
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn outcome(&mut self, _status: &InferenceStatus) {
            panic!("logger failed");
        }
        fn info(&mut self, _message: &str) {}
    }

    /// Forwards outcomes to a shared list so tests can inspect them mid-run.
    struct RecordingLogger {
        outcomes: Arc<Mutex<Vec<InferenceStatus>>>,
    }

    impl InferenceLogger for RecordingLogger {
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn outcome(&mut self, status: &InferenceStatus) {
            self.outcomes.lock().unwrap().push(status.clone());
        }
        fn info(&mut self, _message: &str) {}
    }

    fn scheduler(faces: Option<usize>, classifier: Box<dyn Classifier>) -> InferenceScheduler {
        InferenceScheduler::spawn(
            Box::new(StubExtractor { faces }),
            classifier,
            SchedulerConfig::default(),
            Box::new(NullInferenceLogger),
        )
        .unwrap()
    }

    fn gated(score: f32) -> (InferenceScheduler, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let s = scheduler(
            Some(1),
            Box::new(GatedClassifier {
                entered: entered_tx,
                gate: gate_rx,
                score,
            }),
        );
        (s, entered_rx, gate_tx)
    }

    fn offer_and_wait(s: &InferenceScheduler, index: usize) -> InferenceStatus {
        assert_eq!(s.offer(&frame(index)), OfferOutcome::Launched);
        assert!(s.wait_until_idle(WAIT));
        s.status().current()
    }

    #[test]
    fn test_starts_idle_and_pending() {
        let s = scheduler(Some(1), Box::new(StubClassifier { scores: Ok(vec![0.2]) }));
        assert!(!s.is_busy());
        assert_eq!(s.status().current(), InferenceStatus::Pending);
        assert_eq!(s.status().generation(), 0);
    }

    #[test]
    fn test_offers_while_busy_are_dropped() {
        let (s, entered, gate) = gated(0.9);

        assert_eq!(s.offer(&frame(0)), OfferOutcome::Launched);
        entered.recv_timeout(WAIT).unwrap();
        assert!(s.is_busy());
        for i in 1..=5 {
            assert_eq!(s.offer(&frame(i)), OfferOutcome::Dropped);
        }

        gate.send(()).unwrap();
        assert!(s.wait_until_idle(WAIT));
        assert_eq!(s.launched(), 1);
        assert_eq!(s.dropped(), 5);
        // Only the launched job ever publishes
        assert_eq!(s.status().generation(), 1);
        assert!(entered.try_recv().is_err());
    }

    #[test]
    fn test_never_more_than_one_job_in_flight() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let s = scheduler(
            Some(2),
            Box::new(OverlapClassifier {
                active: active.clone(),
                max_active: max_active.clone(),
            }),
        );

        for i in 0..300 {
            s.offer(&frame(i));
            if i % 10 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert!(s.wait_until_idle(WAIT));

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(s.launched() >= 1);
        assert_eq!(s.launched() + s.dropped(), 300);
        assert_eq!(s.status().generation(), s.launched());
    }

    #[test]
    fn test_concurrent_offers_launch_once() {
        let (s, entered, gate) = gated(0.2);
        let s = Arc::new(s);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = s.clone();
                thread::spawn(move || s.offer(&frame(i)))
            })
            .collect();
        let outcomes: Vec<OfferOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let launched = outcomes.iter().filter(|o| **o == OfferOutcome::Launched).count();
        assert_eq!(launched, 1);
        entered.recv_timeout(WAIT).unwrap();
        gate.send(()).unwrap();
        assert!(s.wait_until_idle(WAIT));
        assert_eq!(s.status().generation(), 1);
    }

    #[rstest]
    #[case::three_faces_one_fake(3, vec![0.2, 0.9, 0.4], Label::Fake, 0.9)]
    #[case::two_real_faces(2, vec![0.1, 0.3], Label::Real, 0.3)]
    #[case::exactly_threshold(1, vec![0.5], Label::Real, 0.5)]
    fn test_publishes_max_aggregated_verdict(
        #[case] faces: usize,
        #[case] scores: Vec<f32>,
        #[case] label: Label,
        #[case] confidence: f32,
    ) {
        let s = scheduler(Some(faces), Box::new(StubClassifier { scores: Ok(scores) }));
        let status = offer_and_wait(&s, 0);
        assert!(matches!(
            status,
            InferenceStatus::Verdict(ref r) if r.label == label && r.confidence == confidence
        ));
    }

    #[test]
    fn test_no_faces_publishes_no_face() {
        let s = scheduler(Some(0), Box::new(StubClassifier { scores: Ok(vec![]) }));
        assert_eq!(offer_and_wait(&s, 0), InferenceStatus::NoFace);
    }

    #[rstest]
    #[case::extractor_fails(None, Box::new(StubClassifier { scores: Ok(vec![0.3]) }))]
    #[case::classifier_fails(Some(1), Box::new(StubClassifier { scores: Err("oom".into()) }))]
    #[case::wrong_arity(Some(2), Box::new(StubClassifier { scores: Ok(vec![0.3]) }))]
    #[case::classifier_panics(Some(1), Box::new(PanickingClassifier))]
    fn test_failures_publish_error_and_release(
        #[case] faces: Option<usize>,
        #[case] classifier: Box<dyn Classifier>,
    ) {
        let s = scheduler(faces, classifier);
        for i in 0..3 {
            let status = offer_and_wait(&s, i);
            assert!(matches!(status, InferenceStatus::Error(_)));
            assert!(!s.is_busy());
        }
        assert_eq!(s.status().generation(), 3);
    }

    #[test]
    fn test_classifier_error_is_isolated() {
        let s = scheduler(
            Some(1),
            Box::new(ScriptedClassifier {
                script: VecDeque::from([Err("bad batch".to_string()), Ok(0.8)]),
            }),
        );

        assert_eq!(
            offer_and_wait(&s, 0),
            InferenceStatus::Error(InferenceError::Classification("bad batch".into()))
        );
        let status = offer_and_wait(&s, 1);
        assert!(matches!(status, InferenceStatus::Verdict(ref r) if r.label == Label::Fake));
    }

    #[test]
    fn test_one_publication_per_job() {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let s = InferenceScheduler::spawn(
            Box::new(StubExtractor { faces: Some(1) }),
            Box::new(StubClassifier { scores: Ok(vec![0.7]) }),
            SchedulerConfig::default(),
            Box::new(RecordingLogger {
                outcomes: outcomes.clone(),
            }),
        )
        .unwrap();

        for i in 0..4 {
            offer_and_wait(&s, i);
            assert_eq!(s.status().generation(), (i + 1) as u64);
        }
        assert_eq!(outcomes.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_job_uses_private_frame_copy() {
        let (s, entered, gate) = gated(0.9);
        let mut frame = frame(7);
        assert_eq!(s.offer(&frame), OfferOutcome::Launched);
        entered.recv_timeout(WAIT).unwrap();
        // The caller is free to reuse its buffer while the job runs
        frame = Frame::rgb(vec![255u8; 3], 1, 1, 8);
        gate.send(()).unwrap();
        assert!(s.wait_until_idle(WAIT));
        assert_eq!(frame.index(), 8);
        assert!(matches!(s.status().current(), InferenceStatus::Verdict(_)));
    }

    #[test]
    fn test_custom_threshold() {
        let s = InferenceScheduler::spawn(
            Box::new(StubExtractor { faces: Some(1) }),
            Box::new(StubClassifier { scores: Ok(vec![0.6]) }),
            SchedulerConfig {
                fake_threshold: 0.8,
                ..SchedulerConfig::default()
            },
            Box::new(NullInferenceLogger),
        )
        .unwrap();
        assert!(matches!(
            offer_and_wait(&s, 0),
            InferenceStatus::Verdict(ref r) if r.label == Label::Real
        ));
    }

    #[test]
    fn test_shutdown_returns_logger_with_stats() {
        let s = InferenceScheduler::spawn(
            Box::new(StubExtractor { faces: Some(0) }),
            Box::new(StubClassifier { scores: Ok(vec![]) }),
            SchedulerConfig::default(),
            Box::new(StatsInferenceLogger::new()),
        )
        .unwrap();
        offer_and_wait(&s, 0);
        offer_and_wait(&s, 1);
        assert!(s.shutdown().is_some());
    }

    #[test]
    fn test_shutdown_waits_for_in_flight_job() {
        let (s, entered, gate) = gated(0.1);
        let sink = s.status();
        assert_eq!(s.offer(&frame(0)), OfferOutcome::Launched);
        entered.recv_timeout(WAIT).unwrap();
        gate.send(()).unwrap();
        assert!(s.shutdown().is_some());
        assert_eq!(sink.generation(), 1);
    }

    #[test]
    fn test_logger_panic_still_publishes_and_keeps_worker() {
        let s = InferenceScheduler::spawn(
            Box::new(StubExtractor { faces: Some(0) }),
            Box::new(StubClassifier { scores: Ok(vec![]) }),
            SchedulerConfig::default(),
            Box::new(PanickingLogger),
        )
        .unwrap();

        assert_eq!(offer_and_wait(&s, 0), InferenceStatus::NoFace);
        assert_eq!(s.status().generation(), 1);

        assert_eq!(offer_and_wait(&s, 1), InferenceStatus::NoFace);
        assert_eq!(s.status().generation(), 2);
        assert!(s.shutdown().is_some());
    }
}
