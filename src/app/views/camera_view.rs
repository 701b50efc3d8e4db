use egui::{Align2, Color32, FontId, Rect, Sense, Stroke, StrokeKind, TextureOptions, pos2, vec2};
use tokio::sync::watch;
use uuid::Uuid;

use crate::app::views::View;
use crate::capture::{CameraState, OverlayRect, PreviewFrame, Viewport};

const OVERLAY_COLOR: Color32 = Color32::from_rgb(80, 200, 255);

/// Live camera frame with the face overlay drawn on top.
pub struct CameraView {
    overlay: watch::Receiver<Option<OverlayRect>>,
    preview: watch::Receiver<Option<PreviewFrame>>,
    texture: Option<egui::TextureHandle>,
    shown_frame: Option<Uuid>,
    camera_state: CameraState,
    viewport: Viewport,
    flip_requested: bool,
}

impl CameraView {
    pub fn new(
        overlay: watch::Receiver<Option<OverlayRect>>,
        preview: watch::Receiver<Option<PreviewFrame>>,
    ) -> Self {
        Self {
            overlay,
            preview,
            texture: None,
            shown_frame: None,
            camera_state: CameraState::Initializing,
            viewport: Viewport::new(0.0, 0.0),
            flip_requested: false,
        }
    }

    pub fn set_camera_state(&mut self, state: CameraState) {
        self.camera_state = state;
    }

    /// Size of the video surface measured during the last draw.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn take_flip_request(&mut self) -> bool {
        std::mem::take(&mut self.flip_requested)
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.preview.borrow().clone() else {
            return;
        };
        if self.shown_frame == Some(frame.id) {
            return;
        }
        let color_image = egui::ColorImage::from_rgb(
            [frame.image.width() as usize, frame.image.height() as usize],
            frame.image.as_raw().as_slice(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(color_image, TextureOptions::default()),
            None => {
                self.texture =
                    Some(ctx.load_texture("camera_frame", color_image, TextureOptions::default()));
            }
        }
        self.shown_frame = Some(frame.id);
    }

    /// Where the whole frame lands inside `surface` when fitted with its aspect ratio kept.
    fn fitted_frame(surface: Rect, frame_size: [usize; 2]) -> Rect {
        let (fw, fh) = (frame_size[0] as f32, frame_size[1] as f32);
        if fw <= 0.0 || fh <= 0.0 {
            return surface;
        }
        let scale = (surface.width() / fw).min(surface.height() / fh);
        Rect::from_center_size(surface.center(), vec2(fw * scale, fh * scale))
    }

    fn status_text(&self) -> Option<String> {
        match &self.camera_state {
            CameraState::Live { .. } => None,
            CameraState::Initializing => Some("Camera initializing...".to_string()),
            CameraState::Unavailable { reason } => Some(format!("Camera unavailable: {}", reason)),
            CameraState::Stopped => Some("Camera stopped".to_string()),
        }
    }
}

impl View for CameraView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        self.refresh_texture(ui.ctx());

        let width = ui.available_width();
        let (surface, _) = ui.allocate_exact_size(vec2(width, width * 9.0 / 16.0), Sense::hover());
        self.viewport = Viewport::new(surface.width() as f64, surface.height() as f64);

        let painter = ui.painter_at(surface);
        painter.rect_filled(surface, 8.0, Color32::BLACK);

        if let Some(texture) = &self.texture {
            let fitted = Self::fitted_frame(surface, texture.size());
            painter.image(
                texture.id(),
                fitted,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        if let Some(rect) = *self.overlay.borrow() {
            let face = Rect::from_min_size(
                surface.min + vec2(rect.x as f32, rect.y as f32),
                vec2(rect.width as f32, rect.height as f32),
            );
            painter.rect_stroke(face, 4.0, Stroke::new(2.0, OVERLAY_COLOR), StrokeKind::Inside);
        }

        if let Some(status) = self.status_text() {
            painter.text(
                surface.center(),
                Align2::CENTER_CENTER,
                status,
                FontId::proportional(16.0),
                Color32::WHITE,
            );
        }

        let flip_button = Rect::from_min_size(surface.right_bottom() - vec2(52.0, 52.0), vec2(36.0, 36.0));
        if ui
            .put(flip_button, egui::Button::new("⟲"))
            .on_hover_text("Flip camera")
            .clicked()
        {
            self.flip_requested = true;
        }

        ui.vertical_centered(|ui| {
            ui.label("Position your face in the center of the frame");
        });
    }
}
