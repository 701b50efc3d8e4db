pub mod capture_loop;
pub mod events;
pub mod frame_buffer;
pub mod overlay;

pub use capture_loop::{CaptureLoop, CaptureLoopBuilder};
pub use events::{CameraState, CaptureEvent, TickSequencer};
pub use frame_buffer::{FrameBuffer, PreviewFrame};
pub use overlay::{OverlayRect, Viewport, fit_to_viewport};
