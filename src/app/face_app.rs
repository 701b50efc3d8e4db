use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info, warn};

use crate::analysis::{AnalysisProvider, SimulatedAnalyzer};
use crate::app::views::{CameraView, PermissionView, ResultsView, View};
use crate::capture::{CameraState, CaptureEvent, CaptureLoop};
use crate::config::Settings;
use crate::error::AppError;
use crate::media::{MediaDevices, PermissionState, SyntheticMediaDevices, check_permission};
use crate::panel::ResultsPanel;

const IDLE_REPAINT: Duration = Duration::from_millis(100);

/// Page composition: permission gate, camera view, results panel and header count.
pub struct FaceApp {
    settings: Settings,
    runtime: Handle,
    devices: Arc<dyn MediaDevices>,
    provider: Arc<dyn AnalysisProvider>,
    permission: PermissionState,
    permission_rx: Option<oneshot::Receiver<PermissionState>>,
    permission_view: Option<PermissionView>,
    capture: Option<CaptureLoop>,
    events: Option<broadcast::Receiver<CaptureEvent>>,
    camera_view: Option<CameraView>,
    results_view: ResultsView,
    faces_detected: u32,
    errors: Vec<AppError>,
}

impl FaceApp {
    pub fn new(
        settings: Settings,
        runtime: Handle,
        devices: Arc<dyn MediaDevices>,
        provider: Arc<dyn AnalysisProvider>,
    ) -> Self {
        let results_view = ResultsView::new(ResultsPanel::new(&settings.panel));
        let mut app = Self {
            settings,
            runtime,
            devices,
            provider,
            permission: PermissionState::Checking,
            permission_rx: None,
            permission_view: None,
            capture: None,
            events: None,
            camera_view: None,
            results_view,
            faces_detected: 0,
            errors: Vec::new(),
        };
        app.request_permission();
        app
    }

    pub fn start_gui(settings: Settings) -> Result<(), AppError> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(settings.ui.window_width, settings.ui.window_height))
                .with_title("FaceLens - Face Analysis"),
            ..Default::default()
        };

        let runtime = Handle::try_current()
            .map_err(|e| AppError::Ui(format!("No tokio runtime: {}", e)))?;
        let devices: Arc<dyn MediaDevices> =
            Arc::new(SyntheticMediaDevices::from_settings(&settings.camera));
        let provider: Arc<dyn AnalysisProvider> =
            Arc::new(SimulatedAnalyzer::from_settings(&settings.analysis));

        eframe::run_native(
            "FaceLens - Face Analysis",
            options,
            Box::new(move |_cc| Ok(Box::new(FaceApp::new(settings, runtime, devices, provider)))),
        )
        .map_err(|e| AppError::Ui(e.to_string()))
    }

    fn request_permission(&mut self) {
        let (tx, rx) = oneshot::channel();
        let devices = self.devices.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(check_permission(devices.as_ref()).await);
        });
        self.permission = PermissionState::Checking;
        self.permission_rx = Some(rx);
    }

    fn poll_permission(&mut self) {
        let Some(rx) = self.permission_rx.as_mut() else {
            return;
        };
        let state = match rx.try_recv() {
            Ok(state) => state,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                PermissionState::Denied("Permission check was interrupted".to_string())
            }
        };
        self.permission_rx = None;
        match &state {
            PermissionState::Granted => {
                self.permission_view = None;
                self.start_capture();
            }
            PermissionState::Denied(reason) => {
                self.permission_view = Some(PermissionView::new(reason.clone()));
            }
            PermissionState::Checking => {}
        }
        self.permission = state;
    }

    fn start_capture(&mut self) {
        let _guard = self.runtime.enter();
        if let Some(capture) = self.capture.as_mut() {
            // Worker gave up on the stream, start a fresh one.
            capture.start();
            return;
        }
        let built = CaptureLoop::builder(self.settings.capture.clone())
            .devices(self.devices.clone())
            .provider(self.provider.clone())
            .build();
        match built {
            Ok(mut capture) => {
                self.events = Some(capture.subscribe());
                self.camera_view = Some(CameraView::new(capture.overlay(), capture.preview()));
                capture.start();
                info!("Capture started from the UI");
                self.capture = Some(capture);
            }
            Err(e) => {
                error!("Failed to start capture: {}", e);
                self.errors.push(e);
            }
        }
    }

    fn drain_events(&mut self, now: Instant) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        let mut lost_camera = None;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    match &event {
                        CaptureEvent::FacesDetected(count) => self.faces_detected = *count,
                        CaptureEvent::CameraStateChanged(state) => {
                            if let Some(view) = self.camera_view.as_mut() {
                                view.set_camera_state(state.clone());
                            }
                            if let CameraState::Unavailable { reason } = state {
                                lost_camera = Some(reason.clone());
                            }
                        }
                        _ => {}
                    }
                    self.results_view.panel_mut().apply(&event, now);
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("UI lagged behind, skipping {} capture events", n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.errors
                        .push(AppError::Ui("Capture event channel closed".to_string()));
                    self.events = None;
                    break;
                }
            }
        }
        if let Some(reason) = lost_camera {
            self.revoke_permission(reason);
        }
    }

    /// Camera lost after the initial check: fall back to the permission prompt.
    fn revoke_permission(&mut self, reason: String) {
        warn!("Camera became unavailable: {}", reason);
        self.permission_rx = None;
        self.permission_view = Some(PermissionView::new(reason.clone()));
        self.permission = PermissionState::Denied(reason);
    }

    fn draw_camera_column(&mut self, ui: &mut egui::Ui) {
        match self.permission.clone() {
            PermissionState::Checking => {
                ui.vertical_centered(|ui| {
                    ui.add_space(48.0);
                    ui.label("Checking camera access...");
                });
            }
            PermissionState::Denied(_) => {
                let retry = self.permission_view.as_mut().is_some_and(|view| {
                    view.draw(ui);
                    view.take_retry_request()
                });
                if retry {
                    self.request_permission();
                }
            }
            PermissionState::Granted => {
                if let Some(view) = self.camera_view.as_mut() {
                    view.draw(ui);
                    let viewport = view.viewport();
                    let flip = view.take_flip_request();
                    if let Some(capture) = self.capture.as_mut() {
                        capture.set_viewport(viewport);
                        if flip {
                            let _guard = self.runtime.enter();
                            capture.switch_facing();
                        }
                    }
                }
            }
        }
    }
}

impl eframe::App for FaceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.poll_permission();
        self.drain_events(now);
        self.results_view.panel_mut().advance(now);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("FaceLens");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let suffix = if self.faces_detected == 1 { "" } else { "s" };
                    ui.label(format!("{} face{} detected", self.faces_detected, suffix));
                });
            });
        });

        if !self.errors.is_empty() {
            egui::TopBottomPanel::bottom("error_panel")
                .resizable(true)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        for error in self.errors.iter().rev() {
                            ui.label(format!("[ERROR] {}", error));
                        }
                    });
                });
        }

        egui::SidePanel::right("results")
            .min_width(280.0)
            .show(ctx, |ui| self.results_view.draw(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_camera_column(ui));

        let repaint = self
            .results_view
            .panel()
            .next_repaint_in(now)
            .map_or(IDLE_REPAINT, |due| due.min(IDLE_REPAINT));
        ctx.request_repaint_after(repaint);
    }
}
