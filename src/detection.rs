//! Detector output types and the seams to the external detector and video source.
//!
//! The detector and the camera are opaque collaborators: the sketch only relies on the
//! [`VideoSource`], [`DetectorLoader`] and [`Detector`] traits defined here.

use std::{convert::Infallible, fmt, str::FromStr};

use image::RgbaImage;

/// A single video frame handed to the [`Detector`].
pub type Frame = RgbaImage;

/// The class of object a [`Detection`] describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Open,
    Closed,
    Pinch,
    Point,
    Face,
    /// Any label this crate does not know about. Treated like a hand.
    Other(String),
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Open => "open",
            Label::Closed => "closed",
            Label::Pinch => "pinch",
            Label::Point => "point",
            Label::Face => "face",
            Label::Other(s) => s.as_str(),
        }
    }

    #[inline]
    pub fn is_face(&self) -> bool {
        *self == Label::Face
    }
}

impl FromStr for Label {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "open" => Label::Open,
            "closed" => Label::Closed,
            "pinch" => Label::Pinch,
            "point" => Label::Point,
            "face" => Label::Face,
            other => Label::Other(other.to_string()),
        })
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(label) => label,
            Err(infallible) => match infallible {},
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An axis-aligned box in source-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns whether all coordinates are finite and the size is not negative.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// One object found by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: Label,
    /// Confidence in range 0.0 to 1.0.
    pub score: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<Label>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }

    /// Maps the bounding box into canvas space.
    ///
    /// The mapping is a fixed affine remap (`x * 3 + width`, `y * 4 + height`) rather than a
    /// scale between frame and canvas resolution. Returns `None` if the box is malformed.
    pub fn canvas_position(&self) -> Option<(f32, f32)> {
        if !self.bbox.is_valid() {
            return None;
        }
        let b = &self.bbox;
        Some((b.x * 3.0 + b.width, b.y * 4.0 + b.height))
    }
}

/// Static detector parameters, passed to [`DetectorLoader::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Mirror the input frame before detection.
    pub flip_horizontal: bool,
    /// Maximum number of boxes reported per frame.
    pub max_num_boxes: usize,
    /// Minimum confidence of reported boxes.
    pub score_threshold: f32,
    pub model_type: String,
    pub model_size: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            flip_horizontal: true,
            max_num_boxes: 20,
            score_threshold: 0.5,
            model_type: "ssd320fpnlite".into(),
            model_size: "large".into(),
        }
    }
}

/// A source of video frames.
pub trait VideoSource: Send + 'static {
    /// Starts the source. Returns whether it is ready to produce frames.
    fn start(&mut self) -> anyhow::Result<bool>;

    /// Returns the current frame.
    fn read(&mut self) -> anyhow::Result<Frame>;
}

/// A loaded object detection model.
pub trait Detector: Send + 'static {
    /// Detects objects in `frame`, in the detector's own stable order.
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<Detection>>;
}

/// Loads a [`Detector`] from a [`DetectionConfig`].
///
/// Loading may be slow; it is always performed off the render thread.
pub trait DetectorLoader: Send + 'static {
    type Detector: Detector;

    fn load(&mut self, config: &DetectionConfig) -> anyhow::Result<Self::Detector>;
}

impl<F, D> DetectorLoader for F
where
    F: FnMut(&DetectionConfig) -> anyhow::Result<D> + Send + 'static,
    D: Detector,
{
    type Detector = D;

    fn load(&mut self, config: &DetectionConfig) -> anyhow::Result<D> {
        self(config)
    }
}
