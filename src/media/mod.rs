pub mod permission;
pub mod synthetic;

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

pub use permission::{PermissionState, check_permission};
pub use synthetic::SyntheticMediaDevices;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

/// A request for a video stream. Width and height are preferences, not requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamConstraints {
    pub fn new(facing: FacingMode, ideal_width: u32, ideal_height: u32) -> Self {
        Self {
            facing,
            ideal_width,
            ideal_height,
        }
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self::new(FacingMode::User, 1280, 720)
    }
}

/// The platform's media subsystem.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open(&self, constraints: StreamConstraints) -> Result<Box<dyn VideoStream>, MediaError>;
}

/// A live video source. Dropping or stopping it releases its tracks.
pub trait VideoStream: Send {
    /// Native resolution of the frames this stream produces.
    fn resolution(&self) -> (u32, u32);

    /// Copies the current frame into `target`, which must already have the stream's
    /// resolution.
    fn read_frame(&mut self, target: &mut RgbImage) -> Result<(), MediaError>;

    /// Releases all tracks. Calling it more than once is a no-op.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    fn facing(&self) -> FacingMode;
}
