//! Pointer-driven stand-ins for the camera and the hand detector.
//!
//! The window host writes the mouse state into a [`SharedPointer`] every frame. The
//! [`PointerDetector`] reports it as a single hand: "open" while hovering, "closed" while the
//! left button is held. Its bounding box inverts the canvas remap of
//! [`Detection::canvas_position`], so spots and ripples appear right under the pointer.

use std::sync::{Arc, Mutex};

use anyhow::bail;

use crate::detection::{
    BoundingBox, Detection, DetectionConfig, Detector, DetectorLoader, Frame, Label, VideoSource,
};

/// Score of a simulated hand while the button is up.
const OPEN_SCORE: f32 = 0.8;
/// Score of a simulated hand while the button is held. High enough to restart the session.
const CLOSED_SCORE: f32 = 0.9;

/// Mouse state over the canvas, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
    pub pressed: bool,
}

/// Pointer state shared between the window host and the detection worker.
///
/// `None` means the pointer is outside the window.
#[derive(Debug, Clone, Default)]
pub struct SharedPointer(Arc<Mutex<Option<Pointer>>>);

impl SharedPointer {
    pub fn set(&self, pointer: Option<Pointer>) {
        match self.0.lock() {
            Ok(mut state) => *state = pointer,
            Err(poisoned) => *poisoned.into_inner() = pointer,
        }
    }

    pub fn get(&self) -> Option<Pointer> {
        match self.0.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// A [`Detector`] that sees a hand wherever the pointer is.
pub struct PointerDetector {
    pointer: SharedPointer,
}

impl PointerDetector {
    pub fn new(pointer: SharedPointer) -> Self {
        Self { pointer }
    }
}

impl Detector for PointerDetector {
    fn detect(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
        let Some(pointer) = self.pointer.get() else {
            return Ok(Vec::new());
        };

        let (label, score) = if pointer.pressed {
            (Label::Closed, CLOSED_SCORE)
        } else {
            (Label::Open, OPEN_SCORE)
        };
        let bbox = BoundingBox::new(pointer.x / 3.0, pointer.y / 4.0, 0.0, 0.0);
        Ok(vec![Detection::new(label, score, bbox)])
    }
}

/// Loads a [`PointerDetector`] for every requested model.
pub struct PointerDetectorLoader {
    pointer: SharedPointer,
}

impl PointerDetectorLoader {
    pub fn new(pointer: SharedPointer) -> Self {
        Self { pointer }
    }
}

impl DetectorLoader for PointerDetectorLoader {
    type Detector = PointerDetector;

    fn load(&mut self, config: &DetectionConfig) -> anyhow::Result<PointerDetector> {
        log::debug!(
            "simulating '{}' ({}) with the pointer",
            config.model_type,
            config.model_size
        );
        Ok(PointerDetector::new(self.pointer.clone()))
    }
}

/// A [`VideoSource`] that produces blank frames.
pub struct BlankVideo {
    width: u32,
    height: u32,
    started: bool,
}

impl BlankVideo {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            started: false,
        }
    }
}

impl VideoSource for BlankVideo {
    fn start(&mut self) -> anyhow::Result<bool> {
        self.started = true;
        Ok(true)
    }

    fn read(&mut self) -> anyhow::Result<Frame> {
        if !self.started {
            bail!("blank video source was not started");
        }
        Ok(Frame::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn hand_lands_under_pointer() {
        let pointer = SharedPointer::default();
        let mut det = PointerDetectorLoader::new(pointer.clone())
            .load(&DetectionConfig::default())
            .unwrap();
        let frame = Frame::new(1, 1);

        assert!(det.detect(&frame).unwrap().is_empty());

        pointer.set(Some(Pointer {
            x: 640.0,
            y: 360.0,
            pressed: false,
        }));
        let dets = det.detect(&frame).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, Label::Open);
        let (x, y) = dets[0].canvas_position().unwrap();
        assert_relative_eq!(x, 640.0);
        assert_relative_eq!(y, 360.0);
    }

    #[test]
    fn pressed_pointer_is_a_confident_closed_hand() {
        let pointer = SharedPointer::default();
        pointer.set(Some(Pointer {
            x: 10.0,
            y: 10.0,
            pressed: true,
        }));
        let dets = PointerDetector::new(pointer)
            .detect(&Frame::new(1, 1))
            .unwrap();
        assert_eq!(dets[0].label, Label::Closed);
        assert!(dets[0].score > 0.7);
    }

    #[test]
    fn blank_video_needs_start() {
        let mut video = BlankVideo::new(8, 6);
        assert!(video.read().is_err());
        assert!(video.start().unwrap());
        let frame = video.read().unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
    }
}
