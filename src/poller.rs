//! Asynchronous detection polling.
//!
//! The video source, the detector loader and the loaded detector all live on one worker
//! thread. The render loop talks to it exclusively through non-blocking requests, and picks up
//! results with [`DetectionPoller::poll`] once per frame.
//!
//! Two triggers request detections: the coarse, frame-count-gated trigger of the
//! [`Sketch`][crate::sketch::Sketch], and a self-chain that requests the next detection as soon
//! as one completes. Both may have requests in flight at the same time; redundant results are
//! harmless.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::anyhow;

use crate::{
    detection::{Detection, DetectionConfig, Detector, DetectorLoader, VideoSource},
    timer::{FpsCounter, Timer},
    worker::{promise, Promise, PromiseHandle, TrySendError, Worker},
};

/// Maximum number of detection requests that may be pending at once.
const MAX_IN_FLIGHT: usize = 2;

/// Room for every in-flight detection plus a video start and a detector load.
const QUEUE_CAPACITY: usize = MAX_IN_FLIGHT + 2;

type Pending<T> = PromiseHandle<anyhow::Result<T>>;

enum Request {
    StartVideo(Promise<anyhow::Result<bool>>),
    LoadDetector(DetectionConfig, Promise<anyhow::Result<()>>),
    Detect {
        session: u64,
        result: Promise<anyhow::Result<Vec<Detection>>>,
    },
}

impl Request {
    fn name(&self) -> &'static str {
        match self {
            Request::StartVideo(_) => "start video",
            Request::LoadDetector(..) => "load detector",
            Request::Detect { .. } => "detect",
        }
    }
}

/// Drives the external detector without ever blocking the render loop.
pub struct DetectionPoller {
    worker: Worker<Request>,
    /// Identifies the current session; requests from older sessions are skipped by the worker.
    session: Arc<AtomicU64>,
    config: DetectionConfig,

    video_ready: bool,
    detector_loaded: bool,
    /// Set once the worker thread is gone. Detection stays off for good.
    worker_exited: bool,

    video_start: Option<Pending<bool>>,
    detector_load: Option<Pending<()>>,
    in_flight: VecDeque<Pending<Vec<Detection>>>,
    /// Control requests that did not fit into the worker queue yet.
    backlog: VecDeque<Request>,
}

impl DetectionPoller {
    /// Spawns the detection worker, which takes ownership of `video` and `loader`.
    ///
    /// Neither is started or invoked until [`DetectionPoller::start_video_source`] and
    /// [`DetectionPoller::load_detector_async`] are called.
    pub fn spawn<V, L>(video: V, loader: L, config: DetectionConfig) -> anyhow::Result<Self>
    where
        V: VideoSource,
        L: DetectorLoader,
    {
        let session = Arc::new(AtomicU64::new(0));
        let mut backend = Backend {
            video,
            loader,
            detector: None,
            session: session.clone(),
            t_read: Timer::new("read"),
            t_detect: Timer::new("detect"),
            fps: FpsCounter::new("detector"),
        };
        let worker = Worker::builder()
            .name("detector")
            .capacity(QUEUE_CAPACITY)
            .spawn(move |req: Request| backend.handle(req))?;

        Ok(Self {
            worker,
            session,
            config,
            video_ready: false,
            detector_loaded: false,
            worker_exited: false,
            video_start: None,
            detector_load: None,
            in_flight: VecDeque::new(),
            backlog: VecDeque::new(),
        })
    }

    /// Returns whether the video source has reported that it is ready.
    pub fn is_video_ready(&self) -> bool {
        self.video_ready
    }

    /// Returns whether a detector has finished loading.
    pub fn is_detector_loaded(&self) -> bool {
        self.detector_loaded
    }

    /// Returns whether the worker thread has exited, eg. because the detector panicked.
    pub fn has_worker_exited(&self) -> bool {
        self.worker_exited
    }

    /// Returns the number of detection requests whose results have not arrived yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Asks the worker to start the video source.
    ///
    /// Readiness is picked up by a later [`DetectionPoller::poll`]. If the source fails to start,
    /// detection stays inactive for the rest of the session.
    pub fn start_video_source(&mut self) {
        let (promise, handle) = promise();
        self.video_start = Some(handle);
        self.send_control(Request::StartVideo(promise));
    }

    /// Asks the worker to load the detector with this poller's [`DetectionConfig`].
    ///
    /// Once loading completes, [`DetectionPoller::poll`] immediately triggers one detection
    /// cycle.
    pub fn load_detector_async(&mut self) {
        let (promise, handle) = promise();
        self.detector_load = Some(handle);
        self.send_control(Request::LoadDetector(self.config.clone(), promise));
    }

    /// Requests one detection on the current video frame.
    ///
    /// This does nothing unless the video source is ready and a detector is loaded. Returns
    /// whether a request was issued.
    pub fn trigger_detection_cycle(&mut self) -> bool {
        if !self.video_ready || !self.detector_loaded {
            return false;
        }
        if self.in_flight.len() >= MAX_IN_FLIGHT {
            log::trace!("{} detections in flight, skipping trigger", self.in_flight.len());
            return false;
        }

        let (result, handle) = promise();
        let req = Request::Detect {
            session: self.session.load(Ordering::SeqCst),
            result,
        };
        match self.worker.try_send(req) {
            Ok(()) => {
                self.in_flight.push_back(handle);
                true
            }
            Err(TrySendError::Full(_)) => {
                log::trace!("detector queue full, skipping trigger");
                false
            }
            Err(TrySendError::Exited(_)) => {
                self.on_worker_exit();
                false
            }
        }
    }

    /// Collects everything the worker finished since the last call.
    ///
    /// Returns the detection lists that completed, oldest first, with face detections removed.
    /// Every successful detection immediately requests the next one.
    pub fn poll(&mut self) -> Vec<Vec<Detection>> {
        self.flush_backlog();
        self.poll_video_start();
        self.poll_detector_load();

        let mut completed = Vec::new();
        while let Some(result) = self.in_flight.front().and_then(|h| h.poll()) {
            self.in_flight.pop_front();
            match result {
                Ok(Ok(mut detections)) => {
                    detections.retain(|d| !d.label.is_face());
                    completed.push(detections);
                    self.trigger_detection_cycle();
                }
                Ok(Err(e)) => log::warn!("detection failed: {e:#}"),
                Err(_) => self.on_worker_exit(),
            }
        }
        completed
    }

    /// Drops every pending request of the current session.
    ///
    /// Results of abandoned requests are never delivered, and requests the worker has not
    /// started yet are skipped.
    pub fn abandon_in_flight(&mut self) {
        let old = self.session.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "abandoning {} detection requests of session {old}",
            self.in_flight.len()
        );
        self.in_flight.clear();
        self.video_start = None;
        self.detector_load = None;
        self.backlog.clear();
    }

    /// Starts over as if the program was restarted: abandons all pending work, restarts the
    /// video source and reloads the detector.
    pub fn restart(&mut self) {
        self.abandon_in_flight();
        self.video_ready = false;
        self.detector_loaded = false;
        self.start_video_source();
        self.load_detector_async();
    }

    fn poll_video_start(&mut self) {
        let Some(result) = self.video_start.as_ref().and_then(|h| h.poll()) else {
            return;
        };
        self.video_start = None;
        match result {
            Ok(Ok(true)) => {
                log::info!("video source ready");
                self.video_ready = true;
            }
            Ok(Ok(false)) => log::warn!("video source did not start; hand detection is disabled"),
            Ok(Err(e)) => log::warn!("failed to start video source: {e:#}"),
            Err(_) => self.on_worker_exit(),
        }
    }

    fn poll_detector_load(&mut self) {
        let Some(result) = self.detector_load.as_ref().and_then(|h| h.poll()) else {
            return;
        };
        self.detector_load = None;
        match result {
            Ok(Ok(())) => {
                log::info!(
                    "detector loaded ({} {})",
                    self.config.model_type,
                    self.config.model_size
                );
                self.detector_loaded = true;
                self.trigger_detection_cycle();
            }
            Ok(Err(e)) => log::warn!("failed to load detector: {e:#}"),
            Err(_) => self.on_worker_exit(),
        }
    }

    fn send_control(&mut self, req: Request) {
        self.backlog.push_back(req);
        self.flush_backlog();
    }

    fn flush_backlog(&mut self) {
        while let Some(req) = self.backlog.pop_front() {
            match self.worker.try_send(req) {
                Ok(()) => {}
                Err(TrySendError::Full(req)) => {
                    log::trace!("detector queue full, deferring '{}'", req.name());
                    self.backlog.push_front(req);
                    break;
                }
                Err(TrySendError::Exited(_)) => {
                    self.backlog.clear();
                    self.on_worker_exit();
                    break;
                }
            }
        }
    }

    /// Turns detection off for good after the worker thread died.
    ///
    /// Rendering is unaffected; the sketch just stops seeing hands.
    fn on_worker_exit(&mut self) {
        if self.worker_exited {
            return;
        }
        self.worker_exited = true;
        match self.worker.reap() {
            Some(msg) => log::warn!("detector worker panicked ({msg}); hand detection is disabled"),
            None => log::warn!("detector worker exited; hand detection is disabled"),
        }

        self.video_ready = false;
        self.detector_loaded = false;
        self.in_flight.clear();
        self.video_start = None;
        self.detector_load = None;
        self.backlog.clear();
    }
}

/// Worker-side state.
struct Backend<V, L: DetectorLoader> {
    video: V,
    loader: L,
    detector: Option<L::Detector>,
    session: Arc<AtomicU64>,
    t_read: Timer,
    t_detect: Timer,
    fps: FpsCounter,
}

impl<V: VideoSource, L: DetectorLoader> Backend<V, L> {
    fn handle(&mut self, req: Request) {
        log::trace!("handling '{}'", req.name());
        match req {
            Request::StartVideo(promise) => promise.fulfill(self.video.start()),
            Request::LoadDetector(config, promise) => {
                // Drop any previous model before loading the new one.
                self.detector = None;
                promise.fulfill(self.loader.load(&config).map(|det| {
                    self.detector = Some(det);
                }));
            }
            Request::Detect { session, result } => {
                if session != self.session.load(Ordering::SeqCst) {
                    log::trace!("skipping detection of abandoned session {session}");
                    return;
                }
                result.fulfill(self.detect());
                self.fps.tick_with([&self.t_read, &self.t_detect]);
            }
        }
    }

    fn detect(&mut self) -> anyhow::Result<Vec<Detection>> {
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| anyhow!("no detector loaded"))?;
        let frame = self.t_read.time(|| self.video.read())?;
        self.t_detect.time(|| detector.detect(&frame))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize},
            Mutex,
        },
        thread,
        time::{Duration, Instant},
    };

    use anyhow::bail;

    use crate::detection::{BoundingBox, Frame, Label};

    use super::*;

    struct FakeVideo {
        ready: anyhow::Result<bool>,
        starts: Arc<AtomicUsize>,
    }

    impl FakeVideo {
        fn ready() -> Self {
            Self {
                ready: Ok(true),
                starts: Arc::default(),
            }
        }
    }

    impl VideoSource for FakeVideo {
        fn start(&mut self) -> anyhow::Result<bool> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            match &self.ready {
                Ok(ready) => Ok(*ready),
                Err(e) => bail!("{e}"),
            }
        }

        fn read(&mut self) -> anyhow::Result<Frame> {
            Ok(Frame::new(4, 4))
        }
    }

    struct FakeDetector {
        detections: Vec<Detection>,
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<AtomicBool>>,
    }

    impl Detector for FakeDetector {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                while !gate.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            Ok(self.detections.clone())
        }
    }

    fn hands() -> Vec<Detection> {
        vec![
            Detection::new("face", 0.99, BoundingBox::new(1.0, 1.0, 1.0, 1.0)),
            Detection::new("open", 0.9, BoundingBox::new(40.0, 40.0, 30.0, 40.0)),
        ]
    }

    fn loader(
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<AtomicBool>>,
    ) -> impl DetectorLoader<Detector = FakeDetector> {
        move |_: &DetectionConfig| -> anyhow::Result<_> {
            Ok(FakeDetector {
                detections: hands(),
                calls: calls.clone(),
                gate: gate.clone(),
            })
        }
    }

    /// Polls until `done` returns `true`, collecting all results.
    fn poll_until(
        poller: &mut DetectionPoller,
        mut done: impl FnMut(&DetectionPoller, &[Vec<Detection>]) -> bool,
    ) -> Vec<Vec<Detection>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut results = Vec::new();
        while !done(poller, &results) {
            assert!(Instant::now() < deadline, "timed out waiting for the poller");
            results.extend(poller.poll());
            thread::sleep(Duration::from_millis(1));
        }
        results
    }

    #[test]
    fn load_triggers_first_cycle_and_chain_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller = DetectionPoller::spawn(
            FakeVideo::ready(),
            loader(calls.clone(), None),
            DetectionConfig::default(),
        )
        .unwrap();

        poller.start_video_source();
        poll_until(&mut poller, |p, _| p.is_video_ready());
        poller.load_detector_async();

        // No coarse trigger is ever issued; the self-chain alone keeps detections coming.
        let results = poll_until(&mut poller, |_, r| r.len() >= 3);
        for list in &results {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].label, Label::Open);
        }
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn trigger_is_noop_until_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller = DetectionPoller::spawn(
            FakeVideo::ready(),
            loader(calls.clone(), None),
            DetectionConfig::default(),
        )
        .unwrap();
        assert!(!poller.trigger_detection_cycle());

        // Detector loaded first: its immediate cycle is a no-op without video.
        poller.load_detector_async();
        poll_until(&mut poller, |p, _| p.is_detector_loaded());
        assert_eq!(poller.in_flight(), 0);
        assert!(!poller.trigger_detection_cycle());

        poller.start_video_source();
        poll_until(&mut poller, |p, _| p.is_video_ready());
        assert!(poller.trigger_detection_cycle());
        let results = poll_until(&mut poller, |_, r| !r.is_empty());
        assert_eq!(results[0].len(), 1);
    }

    #[test]
    fn failed_video_start_disables_detection() {
        for ready in [Ok(false), Err(anyhow!("no camera"))] {
            let calls = Arc::new(AtomicUsize::new(0));
            let video = FakeVideo {
                ready,
                starts: Arc::default(),
            };
            let mut poller =
                DetectionPoller::spawn(video, loader(calls.clone(), None), Default::default())
                    .unwrap();
            poller.start_video_source();
            poller.load_detector_async();
            poll_until(&mut poller, |p, _| p.is_detector_loaded());
            poll_until(&mut poller, |p, _| p.video_start.is_none());

            assert!(!poller.is_video_ready());
            assert!(!poller.trigger_detection_cycle());
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn failed_load_disables_detection() {
        let mut poller = DetectionPoller::spawn(
            FakeVideo::ready(),
            |_: &DetectionConfig| -> anyhow::Result<FakeDetector> { bail!("model not found") },
            DetectionConfig::default(),
        )
        .unwrap();
        poller.start_video_source();
        poller.load_detector_async();
        poll_until(&mut poller, |p, _| {
            p.is_video_ready() && p.detector_load.is_none()
        });
        assert!(!poller.is_detector_loaded());
        assert!(!poller.trigger_detection_cycle());
    }

    #[test]
    fn abandoned_results_are_never_delivered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(AtomicBool::new(false));
        let mut poller = DetectionPoller::spawn(
            FakeVideo::ready(),
            loader(calls.clone(), Some(gate.clone())),
            DetectionConfig::default(),
        )
        .unwrap();
        poller.start_video_source();
        poll_until(&mut poller, |p, _| p.is_video_ready());
        poller.load_detector_async();
        poll_until(&mut poller, |p, _| p.in_flight() == 1);
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        // The first detection is stuck behind the gate.
        assert!(poller.trigger_detection_cycle());
        assert_eq!(poller.in_flight(), 2);
        assert!(!poller.trigger_detection_cycle());

        poller.abandon_in_flight();
        assert_eq!(poller.in_flight(), 0);
        gate.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            assert!(poller.poll().is_empty());
            thread::sleep(Duration::from_millis(5));
        }
        // The request queued behind the gated one was skipped by the worker.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            panic!("detector crashed");
        }
    }

    #[test]
    fn panicking_detector_disables_detection() {
        let mut poller = DetectionPoller::spawn(
            FakeVideo::ready(),
            |_: &DetectionConfig| -> anyhow::Result<_> { Ok(PanickingDetector) },
            DetectionConfig::default(),
        )
        .unwrap();
        poller.start_video_source();
        poll_until(&mut poller, |p, _| p.is_video_ready());
        poller.load_detector_async();

        // Keep triggering like the render loop would; nothing may unwind into this thread.
        let results = poll_until(&mut poller, |p, _| {
            let exited = p.has_worker_exited();
            assert!(exited || p.is_video_ready());
            exited
        });
        assert!(results.is_empty());
        assert!(!poller.is_video_ready());
        assert!(!poller.is_detector_loaded());
        assert_eq!(poller.in_flight(), 0);

        for _ in 0..10 {
            assert!(!poller.trigger_detection_cycle());
            assert!(poller.poll().is_empty());
        }

        // A restart cannot revive the worker, but must not fail either.
        poller.restart();
        assert!(poller.poll().is_empty());
        assert!(!poller.is_video_ready());
        drop(poller);
    }

    #[test]
    fn restart_reloads_everything() {
        let loads = Arc::new(Mutex::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let video = FakeVideo::ready();
        let starts = video.starts.clone();
        let mut poller = DetectionPoller::spawn(
            video,
            {
                let loads = loads.clone();
                let calls = calls.clone();
                move |_: &DetectionConfig| -> anyhow::Result<_> {
                    *loads.lock().unwrap() += 1;
                    Ok(FakeDetector {
                        detections: hands(),
                        calls: calls.clone(),
                        gate: None,
                    })
                }
            },
            DetectionConfig::default(),
        )
        .unwrap();
        poller.start_video_source();
        poller.load_detector_async();
        poll_until(&mut poller, |p, _| p.is_video_ready() && p.is_detector_loaded());

        poller.restart();
        assert!(!poller.is_video_ready());
        assert!(!poller.is_detector_loaded());
        poll_until(&mut poller, |p, _| p.is_video_ready() && p.is_detector_loaded());
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(*loads.lock().unwrap(), 2);
    }
}
