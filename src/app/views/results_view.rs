use egui::{Color32, RichText};

use crate::app::views::View;
use crate::panel::{ConfidenceClass, ConfidenceRow, PanelContent, ResultsPanel};

pub struct ResultsView {
    panel: ResultsPanel,
}

impl ResultsView {
    pub fn new(panel: ResultsPanel) -> Self {
        Self { panel }
    }

    pub fn panel(&self) -> &ResultsPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut ResultsPanel {
        &mut self.panel
    }

    fn class_color(class: ConfidenceClass) -> Color32 {
        match class {
            ConfidenceClass::High => Color32::from_rgb(34, 197, 94),
            ConfidenceClass::Medium => Color32::from_rgb(234, 179, 8),
            ConfidenceClass::Low => Color32::from_rgb(239, 68, 68),
        }
    }

    fn draw_section(ui: &mut egui::Ui, title: &str, value: &str, row: &ConfidenceRow) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.strong(title);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(row.label.to_string());
                });
            });
            ui.vertical_centered(|ui| {
                ui.label(RichText::new(value).size(24.0));
            });
            ui.add(
                egui::ProgressBar::new(row.fraction as f32).fill(Self::class_color(row.class)),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                ui.small(format!("{}% confidence", row.percent));
            });
        });
    }
}

impl View for ResultsView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        ui.heading("Analysis Results");
        ui.separator();

        if self.panel.is_analyzing() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Analyzing...");
            });
        }

        match self.panel.content() {
            PanelContent::NoFace => {
                ui.vertical_centered(|ui| {
                    ui.add_space(24.0);
                    ui.label(RichText::new("No Face Detected").size(18.0));
                    ui.label("Position your face in the camera frame to begin analysis");
                });
            }
            PanelContent::Pending => {}
            PanelContent::Results(summary) => {
                Self::draw_section(ui, "Gender", &summary.gender, &summary.gender_confidence);
                ui.add_space(8.0);
                Self::draw_section(
                    ui,
                    "Age Estimate",
                    &format!("{} years", summary.age_years),
                    &summary.age_confidence,
                );
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    ui.small("Analysis refreshes automatically while camera is active");
                });
            }
        }
    }
}
