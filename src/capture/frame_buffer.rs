use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use tracing::debug;
use uuid::Uuid;

use crate::analysis::FramePayload;
use crate::error::CaptureError;
use crate::media::VideoStream;

pub const JPEG_MIME: &str = "image/jpeg";

/// The last captured frame, shared with whoever draws the live view.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub id: Uuid,
    pub image: Arc<RgbImage>,
}

/// Offscreen buffer reused across ticks. It is reallocated only when the stream's
/// native resolution changes.
pub struct FrameBuffer {
    image: RgbImage,
    quality: u8,
}

impl FrameBuffer {
    pub fn new(quality: u8) -> Self {
        Self {
            image: RgbImage::new(0, 0),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copies the stream's current frame into the buffer.
    pub fn capture(&mut self, stream: &mut dyn VideoStream) -> Result<(u32, u32), CaptureError> {
        let (width, height) = stream.resolution();
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyFrame(width, height));
        }
        if self.image.dimensions() != (width, height) {
            debug!(
                "Resizing capture buffer from {:?} to {}x{}",
                self.image.dimensions(),
                width,
                height
            );
            self.image = RgbImage::new(width, height);
        }
        stream.read_frame(&mut self.image)?;
        Ok((width, height))
    }

    /// Encodes the buffer as a JPEG payload.
    pub fn encode(&self) -> Result<FramePayload, CaptureError> {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyFrame(width, height));
        }
        let mut encoded = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut encoded, self.quality).encode_image(&self.image)?;
        Ok(FramePayload::new(
            width,
            height,
            JPEG_MIME,
            Bytes::from(encoded.into_inner()),
        ))
    }

    pub fn preview(&self, id: Uuid) -> PreviewFrame {
        PreviewFrame {
            id,
            image: Arc::new(self.image.clone()),
        }
    }
}
