use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::config::CameraSettings;
use crate::error::MediaError;
use crate::media::{FacingMode, MediaDevices, StreamConstraints, VideoStream};

/// A camera that renders a moving test pattern instead of talking to hardware.
#[derive(Clone)]
pub struct SyntheticMediaDevices {
    max_width: u32,
    max_height: u32,
    deny_access: bool,
    active_streams: Arc<AtomicUsize>,
    opened_streams: Arc<AtomicUsize>,
}

impl SyntheticMediaDevices {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            deny_access: false,
            active_streams: Arc::new(AtomicUsize::new(0)),
            opened_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(settings.max_width, settings.max_height).deny_access(settings.deny_access)
    }

    pub fn deny_access(mut self, deny: bool) -> Self {
        self.deny_access = deny;
        self
    }

    /// Streams opened and not yet stopped.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }

    /// Streams opened over the lifetime of this device set.
    pub fn opened_streams(&self) -> usize {
        self.opened_streams.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticMediaDevices {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

#[async_trait]
impl MediaDevices for SyntheticMediaDevices {
    async fn open(&self, constraints: StreamConstraints) -> Result<Box<dyn VideoStream>, MediaError> {
        if self.deny_access {
            return Err(MediaError::AccessDenied);
        }
        let width = constraints.ideal_width.min(self.max_width);
        let height = constraints.ideal_height.min(self.max_height);
        if width == 0 || height == 0 {
            return Err(MediaError::NotFound(format!(
                "no mode satisfies {}x{}",
                constraints.ideal_width, constraints.ideal_height
            )));
        }

        self.active_streams.fetch_add(1, Ordering::SeqCst);
        self.opened_streams.fetch_add(1, Ordering::SeqCst);
        info!(
            "Opened synthetic {:?}-facing stream at {}x{}",
            constraints.facing, width, height
        );
        Ok(Box::new(SyntheticStream {
            width,
            height,
            facing: constraints.facing,
            frame_index: 0,
            active: true,
            active_streams: self.active_streams.clone(),
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    facing: FacingMode,
    frame_index: u32,
    active: bool,
    active_streams: Arc<AtomicUsize>,
}

impl SyntheticStream {
    fn tint(&self) -> [u8; 3] {
        match self.facing {
            FacingMode::User => [40, 90, 160],
            FacingMode::Environment => [60, 140, 70],
        }
    }
}

impl VideoStream for SyntheticStream {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self, target: &mut RgbImage) -> Result<(), MediaError> {
        if !self.active {
            return Err(MediaError::Stopped);
        }
        if target.dimensions() != (self.width, self.height) {
            return Err(MediaError::NotFound(format!(
                "target buffer is {}x{}, stream is {}x{}",
                target.width(),
                target.height(),
                self.width,
                self.height
            )));
        }

        // Diagonal bands that drift a little every frame.
        let shift = self.frame_index.wrapping_mul(7);
        let [r, g, b] = self.tint();
        for (x, y, pixel) in target.enumerate_pixels_mut() {
            let band = (x.wrapping_add(y).wrapping_add(shift) / 32 % 2) as u8;
            let shade = (band * 40) + ((y * 60 / self.height.max(1)) as u8);
            *pixel = Rgb([
                r.saturating_add(shade),
                g.saturating_add(shade),
                b.saturating_add(shade),
            ]);
        }
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.active_streams.fetch_sub(1, Ordering::SeqCst);
            debug!("Synthetic {:?}-facing stream stopped", self.facing);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn facing(&self) -> FacingMode {
        self.facing
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}
