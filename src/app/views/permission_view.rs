use egui::RichText;

use crate::app::views::View;

/// Shown while camera access is missing. Keeps asking until access is granted.
pub struct PermissionView {
    reason: String,
    retry_requested: bool,
}

impl PermissionView {
    pub fn new(reason: String) -> Self {
        Self {
            reason,
            retry_requested: false,
        }
    }

    pub fn take_retry_request(&mut self) -> bool {
        std::mem::take(&mut self.retry_requested)
    }
}

impl View for PermissionView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(32.0);
            ui.label(RichText::new("Camera Access Required").size(20.0));
            ui.label("This demo needs your camera to analyze faces. No frames leave this machine.");
            ui.small(&self.reason);
            ui.add_space(12.0);
            if ui.button("Allow camera access").clicked() {
                self.retry_requested = true;
            }
        });
    }
}
