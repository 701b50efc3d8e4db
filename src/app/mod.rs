pub mod face_app;
pub mod views;

pub use face_app::FaceApp;
