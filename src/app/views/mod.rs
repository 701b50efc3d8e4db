pub mod camera_view;
pub mod permission_view;
pub mod results_view;

pub use camera_view::CameraView;
pub use permission_view::PermissionView;
pub use results_view::ResultsView;

pub trait View {
    fn draw(&mut self, ui: &mut egui::Ui);
}
