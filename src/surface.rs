//! The immediate-mode drawing surface the sketch renders onto.
//!
//! Drawing is stateful, like a pen: stroke and fill settings stay in effect until they are
//! changed, and every [`Surface::line`] or [`Surface::ellipse`] call uses the current settings.
//!
//! Two implementations are provided: the software raster [`Canvas`][crate::canvas::Canvas]
//! and [`Recorder`], which stores the calls made against it.

use crate::palette::Rgb;

/// An immediate-mode 2D drawing surface.
///
/// Opacities are given in the range 0.0 to 255.0, like color channels.
pub trait Surface {
    /// Returns the width and height of the drawable area.
    fn size(&self) -> (f32, f32);

    /// Sets the color and opacity used to outline shapes and draw lines.
    fn set_stroke(&mut self, color: Rgb, alpha: f32);

    /// Disables outlines until the next [`Surface::set_stroke`].
    fn clear_stroke(&mut self);

    /// Sets the width of lines and outlines, in pixels.
    fn set_stroke_width(&mut self, width: f32);

    /// Sets the color and opacity used to fill shapes.
    fn set_fill(&mut self, color: Rgb, alpha: f32);

    /// Disables filling until the next [`Surface::set_fill`].
    fn clear_fill(&mut self);

    /// Draws a line segment with the current stroke.
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);

    /// Draws an ellipse centered at `(x, y)` with the given diameters.
    fn ellipse(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Erases everything drawn so far. Pen settings are unaffected.
    fn clear(&mut self);
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn size(&self) -> (f32, f32) {
        (**self).size()
    }

    fn set_stroke(&mut self, color: Rgb, alpha: f32) {
        (**self).set_stroke(color, alpha)
    }

    fn clear_stroke(&mut self) {
        (**self).clear_stroke()
    }

    fn set_stroke_width(&mut self, width: f32) {
        (**self).set_stroke_width(width)
    }

    fn set_fill(&mut self, color: Rgb, alpha: f32) {
        (**self).set_fill(color, alpha)
    }

    fn clear_fill(&mut self) {
        (**self).clear_fill()
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        (**self).line(x1, y1, x2, y2)
    }

    fn ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) {
        (**self).ellipse(x, y, width, height)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

/// A single call made against a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCall {
    Stroke { color: Rgb, alpha: f32 },
    ClearStroke,
    StrokeWidth(f32),
    Fill { color: Rgb, alpha: f32 },
    ClearFill,
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    Ellipse { x: f32, y: f32, width: f32, height: f32 },
    Clear,
}

/// The pen settings in effect when a shape was drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub stroke: Option<(Rgb, f32)>,
    pub stroke_width: f32,
    pub fill: Option<(Rgb, f32)>,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            stroke: Some((Rgb::new(0.0, 0.0, 0.0), 255.0)),
            stroke_width: 1.0,
            fill: Some((Rgb::new(255.0, 255.0, 255.0), 255.0)),
        }
    }
}

impl Pen {
    fn apply(&mut self, call: &DrawCall) {
        match *call {
            DrawCall::Stroke { color, alpha } => self.stroke = Some((color, alpha)),
            DrawCall::ClearStroke => self.stroke = None,
            DrawCall::StrokeWidth(w) => self.stroke_width = w,
            DrawCall::Fill { color, alpha } => self.fill = Some((color, alpha)),
            DrawCall::ClearFill => self.fill = None,
            DrawCall::Line { .. } | DrawCall::Ellipse { .. } | DrawCall::Clear => {}
        }
    }
}

/// A [`Surface`] that draws nothing and records every call made against it.
#[derive(Debug, Clone)]
pub struct Recorder {
    width: f32,
    height: f32,
    calls: Vec<DrawCall>,
}

impl Recorder {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
        }
    }

    /// Returns all recorded calls, in order.
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Discards all recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Returns the number of [`DrawCall::Line`]s recorded.
    pub fn line_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DrawCall::Line { .. }))
            .count()
    }

    /// Returns every recorded ellipse together with the pen it was drawn with.
    pub fn ellipses(&self) -> Vec<(Pen, [f32; 4])> {
        let mut pen = Pen::default();
        let mut out = Vec::new();
        for call in &self.calls {
            pen.apply(call);
            if let DrawCall::Ellipse {
                x,
                y,
                width,
                height,
            } = *call
            {
                out.push((pen, [x, y, width, height]));
            }
        }
        out
    }

    /// Returns every recorded line together with the pen it was drawn with.
    pub fn lines(&self) -> Vec<(Pen, [f32; 4])> {
        let mut pen = Pen::default();
        let mut out = Vec::new();
        for call in &self.calls {
            pen.apply(call);
            if let DrawCall::Line { x1, y1, x2, y2 } = *call {
                out.push((pen, [x1, y1, x2, y2]));
            }
        }
        out
    }
}

impl Surface for Recorder {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn set_stroke(&mut self, color: Rgb, alpha: f32) {
        self.calls.push(DrawCall::Stroke { color, alpha });
    }

    fn clear_stroke(&mut self) {
        self.calls.push(DrawCall::ClearStroke);
    }

    fn set_stroke_width(&mut self, width: f32) {
        self.calls.push(DrawCall::StrokeWidth(width));
    }

    fn set_fill(&mut self, color: Rgb, alpha: f32) {
        self.calls.push(DrawCall::Fill { color, alpha });
    }

    fn clear_fill(&mut self) {
        self.calls.push(DrawCall::ClearFill);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.calls.push(DrawCall::Line { x1, y1, x2, y2 });
    }

    fn ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.calls.push(DrawCall::Ellipse {
            x,
            y,
            width,
            height,
        });
    }

    fn clear(&mut self) {
        self.calls.push(DrawCall::Clear);
    }
}
