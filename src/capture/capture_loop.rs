use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisProvider, AnalysisResult, AnalysisService, FramePayload, TimedAnalysis};
use crate::capture::events::{CameraState, CaptureEvent, TickSequencer};
use crate::capture::frame_buffer::{FrameBuffer, PreviewFrame};
use crate::capture::overlay::{OverlayRect, Viewport, fit_to_viewport};
use crate::config::CaptureSettings;
use crate::error::AppError;
use crate::media::{FacingMode, MediaDevices, StreamConstraints, VideoStream};

/// Channels that outlive individual workers so subscribers survive a camera switch.
struct Channels {
    events: broadcast::Sender<CaptureEvent>,
    overlay: watch::Sender<Option<OverlayRect>>,
    preview: watch::Sender<Option<PreviewFrame>>,
    viewport: watch::Sender<Viewport>,
}

impl Channels {
    fn emit(&self, event: CaptureEvent) {
        // No subscribers is fine, the display may not be attached yet.
        let _ = self.events.send(event);
    }
}

struct WorkerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodically captures a frame, sends it for analysis and publishes the results.
pub struct CaptureLoop {
    settings: CaptureSettings,
    devices: Arc<dyn MediaDevices>,
    provider: Arc<dyn AnalysisProvider>,
    channels: Arc<Channels>,
    facing: FacingMode,
    runtime: Handle,
    worker: Option<WorkerHandle>,
}

impl CaptureLoop {
    pub fn builder(settings: CaptureSettings) -> CaptureLoopBuilder {
        CaptureLoopBuilder::new(settings)
    }

    /// Starts capturing with the current facing mode. Does nothing while already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let previous = self.worker.take().map(|worker| worker.task);
        let cancel = CancellationToken::new();
        let worker = Worker {
            constraints: StreamConstraints::new(
                self.facing,
                self.settings.ideal_width,
                self.settings.ideal_height,
            ),
            settings: self.settings.clone(),
            devices: self.devices.clone(),
            cycle: Arc::new(CycleContext {
                channels: self.channels.clone(),
                analysis: AnalysisService::with_timeout(
                    self.provider.clone(),
                    self.settings.analysis_timeout(),
                ),
                sequencer: TickSequencer::default(),
                discard_stale: self.settings.discard_stale_results,
                cancel: cancel.clone(),
            }),
        };
        info!("Starting capture with {:?}-facing camera", self.facing);
        self.worker = Some(WorkerHandle {
            cancel,
            task: self.runtime.spawn(worker.run(previous)),
        });
    }

    /// Cancels the timer. The worker releases the stream on its way out.
    pub fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            if !worker.cancel.is_cancelled() {
                info!("Stopping capture");
                worker.cancel.cancel();
            }
        }
    }

    /// Stops and waits until the stream has been released.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.task.await {
                warn!("Capture worker ended abnormally: {}", e);
            }
        }
    }

    /// Restarts capture from scratch with the camera facing the other way.
    pub fn switch_facing(&mut self) {
        self.facing = self.facing.flipped();
        self.stop();
        self.start();
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.cancel.is_cancelled() && !w.task.is_finished())
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.channels.events.subscribe()
    }

    pub fn overlay(&self) -> watch::Receiver<Option<OverlayRect>> {
        self.channels.overlay.subscribe()
    }

    pub fn preview(&self) -> watch::Receiver<Option<PreviewFrame>> {
        self.channels.preview.subscribe()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.channels.viewport.send_if_modified(|current| {
            if *current == viewport {
                false
            } else {
                *current = viewport;
                true
            }
        });
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    constraints: StreamConstraints,
    settings: CaptureSettings,
    devices: Arc<dyn MediaDevices>,
    cycle: Arc<CycleContext>,
}

impl Worker {
    async fn run(self, previous: Option<JoinHandle<()>>) {
        // The previous stream must be released before a new one is requested.
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        let cancel = self.cycle.cancel.clone();
        if cancel.is_cancelled() {
            return;
        }

        let channels = &self.cycle.channels;
        channels.emit(CaptureEvent::CameraStateChanged(CameraState::Initializing));
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = self.devices.open(self.constraints) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Error accessing camera: {}", e);
                channels.emit(CaptureEvent::CameraStateChanged(CameraState::Unavailable {
                    reason: e.to_string(),
                }));
                return;
            }
        };

        let (width, height) = stream.resolution();
        channels.emit(CaptureEvent::CameraStateChanged(CameraState::Live {
            facing: stream.facing(),
            width,
            height,
        }));

        let mut buffer = FrameBuffer::new(self.settings.jpeg_quality);
        let period = self.settings.interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick(stream.as_mut(), &mut buffer),
            }
        }

        stream.stop();
        channels.overlay.send_if_modified(|overlay| overlay.take().is_some());
        channels.emit(CaptureEvent::CameraStateChanged(CameraState::Stopped));
        info!("Capture stopped, camera released");
    }

    fn tick(&self, stream: &mut dyn VideoStream, buffer: &mut FrameBuffer) {
        let channels = &self.cycle.channels;
        channels.overlay.send_if_modified(|overlay| overlay.take().is_some());

        let frame_size = match buffer.capture(stream) {
            Ok(size) => size,
            Err(e) => {
                warn!("Skipping tick, frame capture failed: {}", e);
                return;
            }
        };
        let payload = match buffer.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping tick, frame encoding failed: {}", e);
                return;
            }
        };
        channels.preview.send_replace(Some(buffer.preview(payload.id)));

        let token = self.cycle.sequencer.issue();
        debug!("Tick {} captured frame {} ({} bytes)", token, payload.id, payload.bytes.len());
        tokio::spawn(self.cycle.clone().analyze(token, frame_size, payload));
    }
}

/// State shared by every analysis task spawned from one worker.
struct CycleContext {
    channels: Arc<Channels>,
    analysis: TimedAnalysis,
    sequencer: TickSequencer,
    discard_stale: bool,
    cancel: CancellationToken,
}

impl CycleContext {
    async fn analyze(self: Arc<Self>, token: u64, frame_size: (u32, u32), payload: FramePayload) {
        self.channels.emit(CaptureEvent::AnalyzingChanged(true));
        let mut analysis = self.analysis.clone();
        let outcome = analysis.analyze(payload).await;

        if self.cancel.is_cancelled() {
            debug!("Ignoring analysis for tick {} after teardown", token);
            return;
        }
        match outcome {
            Ok(_) if self.discard_stale && !self.sequencer.try_apply(token) => {
                debug!(
                    "Discarding stale analysis for tick {} (tick {} already applied, latest is {})",
                    token,
                    self.sequencer.applied(),
                    self.sequencer.latest()
                );
            }
            Ok(result) => self.publish(result, frame_size),
            Err(e) => warn!("Error analyzing face on tick {}: {}", token, e),
        }
        self.channels.emit(CaptureEvent::AnalyzingChanged(false));
    }

    fn publish(&self, result: AnalysisResult, frame_size: (u32, u32)) {
        self.channels
            .emit(CaptureEvent::FacesDetected(result.faces_detected));

        if let Some(face_box) = result.face_box.filter(|_| result.has_face()) {
            let viewport = *self.channels.viewport.borrow();
            match fit_to_viewport(&face_box, frame_size, viewport) {
                Some(rect) => {
                    self.channels.overlay.send_replace(Some(rect));
                }
                None => debug!("Viewport {:?} has no area, overlay skipped", viewport),
            }
        }

        self.channels.emit(CaptureEvent::AnalysisResult(result));
    }
}

pub struct CaptureLoopBuilder {
    settings: CaptureSettings,
    devices: Option<Arc<dyn MediaDevices>>,
    provider: Option<Arc<dyn AnalysisProvider>>,
    facing: Option<FacingMode>,
    viewport: Option<Viewport>,
}

impl CaptureLoopBuilder {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            devices: None,
            provider: None,
            facing: None,
            viewport: None,
        }
    }

    pub fn devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    // Overrides the facing mode from the settings.
    pub fn facing(mut self, facing: FacingMode) -> Self {
        self.facing = Some(facing);
        self
    }

    // Initial viewport, defaults to the preferred capture resolution.
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn build(self) -> Result<CaptureLoop, AppError> {
        let devices = self
            .devices
            .ok_or(AppError::Pipeline("Media devices not set".to_string()))?;
        let provider = self
            .provider
            .ok_or(AppError::Pipeline("Analysis provider not set".to_string()))?;
        if self.settings.interval_ms == 0 {
            return Err(AppError::InvalidSetting(
                "capture.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.settings.event_buffer == 0 {
            return Err(AppError::InvalidSetting(
                "capture.event_buffer must be greater than zero".to_string(),
            ));
        }
        let runtime = Handle::try_current()
            .map_err(|e| AppError::Pipeline(format!("No tokio runtime: {}", e)))?;

        let viewport = self.viewport.unwrap_or(Viewport::new(
            self.settings.ideal_width as f64,
            self.settings.ideal_height as f64,
        ));
        let (events, _) = broadcast::channel(self.settings.event_buffer);
        let (overlay, _) = watch::channel(None);
        let (preview, _) = watch::channel(None);
        let (viewport, _) = watch::channel(viewport);

        Ok(CaptureLoop {
            facing: self.facing.unwrap_or(self.settings.facing),
            settings: self.settings,
            devices,
            provider,
            channels: Arc::new(Channels {
                events,
                overlay,
                preview,
                viewport,
            }),
            runtime,
            worker: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FaceBox, Gender};
    use crate::error::AnalysisError;
    use crate::media::SyntheticMediaDevices;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedProvider(AnalysisResult);

    #[async_trait]
    impl AnalysisProvider for FixedProvider {
        async fn analyze(&self, _frame: &FramePayload) -> Result<AnalysisResult, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AnalysisProvider for FailingProvider {
        async fn analyze(&self, _frame: &FramePayload) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::Unavailable("model not loaded".to_string()))
        }
    }

    /// First call is slow, later calls are fast. Each result's age encodes the call.
    struct ScriptedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for ScriptedProvider {
        async fn analyze(&self, _frame: &FramePayload) -> Result<AnalysisResult, AnalysisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = if call == 0 {
                Duration::from_millis(2500)
            } else {
                Duration::from_millis(10)
            };
            tokio::time::sleep(delay).await;
            Ok(face_result(20.0 + call as f64))
        }
    }

    struct DelayedProvider(Duration);

    #[async_trait]
    impl AnalysisProvider for DelayedProvider {
        async fn analyze(&self, _frame: &FramePayload) -> Result<AnalysisResult, AnalysisError> {
            tokio::time::sleep(self.0).await;
            Ok(face_result(40.0))
        }
    }

    fn face_result(age: f64) -> AnalysisResult {
        AnalysisResult::single_face(
            FaceBox::new(100.0, 50.0, 200.0, 200.0),
            Gender::Male,
            0.9,
            age,
            0.8,
        )
    }

    fn build_loop(
        devices: SyntheticMediaDevices,
        provider: Arc<dyn AnalysisProvider>,
        settings: CaptureSettings,
    ) -> CaptureLoop {
        CaptureLoop::builder(settings)
            .devices(Arc::new(devices))
            .provider(provider)
            .viewport(Viewport::new(640.0, 480.0))
            .build()
            .expect("Failed to build capture loop")
    }

    async fn next_matching<F>(rx: &mut broadcast::Receiver<CaptureEvent>, mut pred: F) -> CaptureEvent
    where
        F: FnMut(&CaptureEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let event = rx.recv().await.expect("event channel closed");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    async fn next_result(rx: &mut broadcast::Receiver<CaptureEvent>) -> AnalysisResult {
        match next_matching(rx, |e| matches!(e, CaptureEvent::AnalysisResult(_))).await {
            CaptureEvent::AnalysisResult(result) => result,
            _ => unreachable!(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_is_scaled_into_the_viewport() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(1280, 720),
            Arc::new(FixedProvider(face_result(30.0))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        let overlay = capture.overlay();
        capture.start();

        next_result(&mut events).await;
        assert_eq!(
            *overlay.borrow(),
            Some(OverlayRect {
                x: 50.0,
                y: 85.0,
                width: 100.0,
                height: 100.0
            })
        );
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_follow_the_cycle_order() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(1280, 720),
            Arc::new(FixedProvider(face_result(30.0))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();

        let mut seen = Vec::new();
        while seen.len() < 6 {
            seen.push(next_matching(&mut events, |_| true).await);
        }
        assert_eq!(
            seen,
            vec![
                CaptureEvent::CameraStateChanged(CameraState::Initializing),
                CaptureEvent::CameraStateChanged(CameraState::Live {
                    facing: FacingMode::User,
                    width: 1280,
                    height: 720
                }),
                CaptureEvent::AnalyzingChanged(true),
                CaptureEvent::FacesDetected(1),
                CaptureEvent::AnalysisResult(face_result(30.0)),
                CaptureEvent::AnalyzingChanged(false),
            ]
        );
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_face_leaves_the_overlay_empty() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(1280, 720),
            Arc::new(FixedProvider(AnalysisResult::no_face())),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        let overlay = capture.overlay();
        capture.start();

        let count = next_matching(&mut events, |e| matches!(e, CaptureEvent::FacesDetected(_))).await;
        assert_eq!(count, CaptureEvent::FacesDetected(0));
        next_result(&mut events).await;
        assert!(overlay.borrow().is_none());
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_analysis_skips_the_tick_but_keeps_running() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(320, 240),
            Arc::new(FailingProvider),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();

        let mut finished = 0;
        while finished < 3 {
            match next_matching(&mut events, |_| true).await {
                CaptureEvent::AnalyzingChanged(false) => finished += 1,
                CaptureEvent::AnalysisResult(_) | CaptureEvent::FacesDetected(_) => {
                    panic!("failed analysis must not publish results")
                }
                _ => {}
            }
        }
        assert!(capture.is_running());
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completions_are_discarded() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(320, 240),
            Arc::new(ScriptedProvider {
                calls: AtomicUsize::new(0),
            }),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();

        let mut ages = Vec::new();
        while ages.len() < 3 {
            ages.push(next_result(&mut events).await.age);
        }
        assert_eq!(ages, vec![21.0, 22.0, 23.0]);
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn provider_slower_than_the_tick_still_publishes() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(1280, 720),
            Arc::new(DelayedProvider(Duration::from_millis(1500))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        let overlay = capture.overlay();
        capture.start();

        let mut results = 0;
        let mut cleared = 0;
        while results < 3 || cleared < 3 {
            match next_matching(&mut events, |_| true).await {
                CaptureEvent::AnalysisResult(result) => {
                    assert_eq!(result.age, 40.0);
                    if results == 0 {
                        assert!(overlay.borrow().is_some());
                    }
                    results += 1;
                }
                CaptureEvent::AnalyzingChanged(false) => cleared += 1,
                _ => {}
            }
        }
        assert!(capture.is_running());
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completions_arrive_when_sequencing_is_off() {
        let settings = CaptureSettings {
            discard_stale_results: false,
            ..CaptureSettings::default()
        };
        let mut capture = build_loop(
            SyntheticMediaDevices::new(320, 240),
            Arc::new(ScriptedProvider {
                calls: AtomicUsize::new(0),
            }),
            settings,
        );
        let mut events = capture.subscribe();
        capture.start();

        let mut ages = Vec::new();
        while ages.len() < 3 {
            ages.push(next_result(&mut events).await.age);
        }
        assert_eq!(ages, vec![21.0, 22.0, 20.0]);
        capture.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_twice_is_harmless_and_releases_the_camera() {
        let devices = SyntheticMediaDevices::new(320, 240);
        let mut capture = build_loop(
            devices.clone(),
            Arc::new(FixedProvider(face_result(30.0))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();
        next_result(&mut events).await;
        assert_eq!(devices.active_streams(), 1);

        capture.stop();
        capture.stop();
        capture.shutdown().await;
        capture.shutdown().await;

        assert!(!capture.is_running());
        assert_eq!(devices.active_streams(), 0);
        assert!(capture.overlay().borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn results_after_teardown_are_ignored() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(320, 240),
            Arc::new(DelayedProvider(Duration::from_millis(800))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();
        next_matching(&mut events, |e| *e == CaptureEvent::AnalyzingChanged(true)).await;

        capture.shutdown().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, CaptureEvent::AnalysisResult(_)),
                "result published after teardown"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn denied_camera_reports_unavailable() {
        let mut capture = build_loop(
            SyntheticMediaDevices::new(320, 240).deny_access(true),
            Arc::new(FixedProvider(face_result(30.0))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();

        let event = next_matching(&mut events, |e| {
            matches!(
                e,
                CaptureEvent::CameraStateChanged(CameraState::Unavailable { .. })
            )
        })
        .await;
        assert!(matches!(
            event,
            CaptureEvent::CameraStateChanged(CameraState::Unavailable { .. })
        ));
        capture.shutdown().await;
        assert!(!capture.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_facing_restarts_on_a_fresh_stream() {
        let devices = SyntheticMediaDevices::new(1280, 720);
        let mut capture = build_loop(
            devices.clone(),
            Arc::new(FixedProvider(face_result(30.0))),
            CaptureSettings::default(),
        );
        let mut events = capture.subscribe();
        capture.start();
        next_matching(&mut events, |e| {
            matches!(e, CaptureEvent::CameraStateChanged(CameraState::Live { .. }))
        })
        .await;

        capture.switch_facing();
        assert_eq!(capture.facing(), FacingMode::Environment);

        next_matching(&mut events, |e| {
            *e == CaptureEvent::CameraStateChanged(CameraState::Stopped)
        })
        .await;
        let live = next_matching(&mut events, |e| {
            matches!(e, CaptureEvent::CameraStateChanged(CameraState::Live { .. }))
        })
        .await;
        assert!(matches!(
            live,
            CaptureEvent::CameraStateChanged(CameraState::Live {
                facing: FacingMode::Environment,
                ..
            })
        ));
        assert_eq!(devices.active_streams(), 1);
        assert_eq!(devices.opened_streams(), 2);
        assert!(capture.is_running());
        capture.shutdown().await;
    }

    #[tokio::test]
    async fn builder_requires_devices_and_provider() {
        let missing_devices = CaptureLoop::builder(CaptureSettings::default())
            .provider(Arc::new(FailingProvider))
            .build();
        assert!(matches!(missing_devices, Err(AppError::Pipeline(_))));

        let missing_provider = CaptureLoop::builder(CaptureSettings::default())
            .devices(Arc::new(SyntheticMediaDevices::default()))
            .build();
        assert!(matches!(missing_provider, Err(AppError::Pipeline(_))));
    }
}
