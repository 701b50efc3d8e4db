use serde::Serialize;

use crate::analysis::FaceBox;

/// Size of the surface the video is shown on, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// The face rectangle as it should be drawn on the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Maps a face box from frame pixels onto a viewport showing the whole frame with its
/// aspect ratio preserved and centered. Returns `None` when either side has no area.
pub fn fit_to_viewport(
    face_box: &FaceBox,
    frame_size: (u32, u32),
    viewport: Viewport,
) -> Option<OverlayRect> {
    let (frame_width, frame_height) = (frame_size.0 as f64, frame_size.1 as f64);
    if frame_width <= 0.0 || frame_height <= 0.0 || viewport.is_empty() {
        return None;
    }

    let scale = (viewport.width / frame_width).min(viewport.height / frame_height);
    let left_offset = (viewport.width - frame_width * scale) / 2.0;
    let top_offset = (viewport.height - frame_height * scale) / 2.0;

    Some(OverlayRect {
        x: face_box.x * scale + left_offset,
        y: face_box.y * scale + top_offset,
        width: face_box.width * scale,
        height: face_box.height * scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterboxed_viewport_offsets_vertically() {
        let rect = fit_to_viewport(
            &FaceBox::new(100.0, 50.0, 200.0, 200.0),
            (1280, 720),
            Viewport::new(640.0, 480.0),
        )
        .unwrap();
        assert_eq!(
            rect,
            OverlayRect {
                x: 50.0,
                y: 85.0,
                width: 100.0,
                height: 100.0
            }
        );
    }

    #[test]
    fn pillarboxed_viewport_offsets_horizontally() {
        // scale = min(1000/1280, 360/720) = 0.5, left offset = (1000 - 640) / 2 = 180
        let rect = fit_to_viewport(
            &FaceBox::new(100.0, 50.0, 200.0, 200.0),
            (1280, 720),
            Viewport::new(1000.0, 360.0),
        )
        .unwrap();
        assert_eq!(rect.x, 230.0);
        assert_eq!(rect.y, 25.0);
        assert_eq!(rect.width, 100.0);
    }

    #[test]
    fn empty_viewport_or_frame_has_no_overlay() {
        let face_box = FaceBox::new(100.0, 50.0, 200.0, 200.0);
        assert!(fit_to_viewport(&face_box, (1280, 720), Viewport::new(0.0, 480.0)).is_none());
        assert!(fit_to_viewport(&face_box, (0, 720), Viewport::new(640.0, 480.0)).is_none());
    }
}
