//! Software raster implementing [`Surface`].

use std::{convert::Infallible, fmt};

use embedded_graphics::{
    draw_target::DrawTarget,
    pixelcolor::raw::RawU32,
    prelude::*,
    primitives::{Ellipse, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle},
};
use image::{Rgba, RgbaImage};

use crate::{palette::Rgb, surface::Surface};

/// An 8-bit RGBA color with non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// The background the canvas starts out with.
    pub const PAPER: Self = Self([250, 247, 240, 255]);

    /// Converts a floating-point color and opacity, clamping each channel to `0..=255`.
    pub fn from_rgb_alpha(color: Rgb, alpha: f32) -> Self {
        fn channel(v: f32) -> u8 {
            v.round().clamp(0.0, 255.0) as u8
        }

        Self([
            channel(color.r()),
            channel(color.g()),
            channel(color.b()),
            channel(alpha),
        ])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    /// Packs the color channels into a `0RGB` word, dropping alpha.
    #[inline]
    pub fn to_0rgb(self) -> u32 {
        u32::from(self.r()) << 16 | u32::from(self.g()) << 8 | u32::from(self.b())
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// An opaque RGBA raster that shapes are alpha-blended onto.
///
/// Nothing is ever erased while drawing: every shape is composited "source over" the
/// existing pixels, so translucent shapes accumulate.
pub struct Canvas {
    buf: RgbaImage,
    stroke: Option<Color>,
    stroke_width: u32,
    fill: Option<Color>,
}

impl Canvas {
    /// Creates a canvas of the given size, covered in [`Color::PAPER`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::from_pixel(width, height, Rgba(Color::PAPER.0)),
            stroke: Some(Color::BLACK),
            stroke_width: 1,
            fill: Some(Color::WHITE),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Gets the color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of the canvas.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Writes the canvas into `dest` as `0RGB` words, row by row.
    pub fn write_0rgb(&self, dest: &mut Vec<u32>) {
        dest.clear();
        dest.extend(self.buf.pixels().map(|p| Color(p.0).to_0rgb()));
    }

    fn style(&self) -> Option<PrimitiveStyle<Color>> {
        if self.stroke.is_none() && self.fill.is_none() {
            return None;
        }

        let mut builder = PrimitiveStyleBuilder::new();
        if let Some(stroke) = self.stroke {
            builder = builder
                .stroke_color(stroke)
                .stroke_width(self.stroke_width);
        }
        if let Some(fill) = self.fill {
            builder = builder.fill_color(fill);
        }
        Some(builder.build())
    }

    fn target(&mut self) -> Target<'_> {
        Target(&mut self.buf)
    }
}

impl Surface for Canvas {
    fn size(&self) -> (f32, f32) {
        (self.width() as f32, self.height() as f32)
    }

    fn set_stroke(&mut self, color: Rgb, alpha: f32) {
        self.stroke = Some(Color::from_rgb_alpha(color, alpha));
    }

    fn clear_stroke(&mut self) {
        self.stroke = None;
    }

    fn set_stroke_width(&mut self, width: f32) {
        // Sub-pixel strokes are still drawn one pixel wide.
        self.stroke_width = (width.round() as u32).max(1);
    }

    fn set_fill(&mut self, color: Rgb, alpha: f32) {
        self.fill = Some(Color::from_rgb_alpha(color, alpha));
    }

    fn clear_fill(&mut self) {
        self.fill = None;
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let Some(stroke) = self.stroke else { return };
        let style = PrimitiveStyle::with_stroke(stroke, self.stroke_width);
        let start = Point::new(x1.round() as i32, y1.round() as i32);
        let end = Point::new(x2.round() as i32, y2.round() as i32);
        match Line::new(start, end)
            .into_styled(style)
            .draw(&mut self.target())
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }

    fn ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let (w, h) = (width.round(), height.round());
        if !(w >= 1.0 && h >= 1.0) {
            return;
        }
        let Some(style) = self.style() else { return };

        let top_left = Point::new((x - w / 2.0).round() as i32, (y - h / 2.0).round() as i32);
        let ellipse = Ellipse::new(top_left, Size::new(w as u32, h as u32));
        match ellipse.into_styled(style).draw(&mut self.target()) {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }

    /// Covers the whole canvas in [`Color::PAPER`] again.
    fn clear(&mut self) {
        for pixel in self.buf.pixels_mut() {
            *pixel = Rgba(Color::PAPER.0);
        }
    }
}

/// Draw target compositing every incoming pixel onto the canvas buffer.
struct Target<'a>(&'a mut RgbaImage);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size {
                width: self.0.width(),
                height: self.0.height(),
            },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0
                && (pos.x as u32) < self.0.width()
                && pos.y >= 0
                && (pos.y as u32) < self.0.height()
            {
                let dest = &mut self.0[(pos.x as u32, pos.y as u32)];
                *dest = Rgba(blend_over(Color(dest.0), color).0);
            }
        }

        Ok(())
    }
}

/// Composites `src` over an opaque `dest`.
fn blend_over(dest: Color, src: Color) -> Color {
    let a = f32::from(src.a()) / 255.0;
    let mix = |d: u8, s: u8| (f32::from(s) * a + f32::from(d) * (1.0 - a)).round() as u8;
    Color([
        mix(dest.r(), src.r()),
        mix(dest.g(), src.g()),
        mix(dest.b(), src.b()),
        255,
    ])
}
