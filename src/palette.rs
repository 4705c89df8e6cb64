//! The sketch's base colors.

use std::ops::Index;

/// A color with three floating-point channels in the range 0.0 to 255.0.
///
/// Palette colors are constants; interpolated colors are derived values and may leave the
/// channel range when interpolating with an out-of-range fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub [f32; 3]);

impl Rgb {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }

    #[inline]
    pub fn r(&self) -> f32 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> f32 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> f32 {
        self.0[2]
    }

    /// Blends linearly between `self` and `other`, channel by channel.
    ///
    /// `fraction` is not clamped: values outside of `0.0..=1.0` extrapolate past either end.
    pub fn interpolate(self, other: Rgb, fraction: f32) -> Rgb {
        let [a, b] = [self.0, other.0];
        Rgb([
            a[0] + (b[0] - a[0]) * fraction,
            a[1] + (b[1] - a[1]) * fraction,
            a[2] + (b[2] - a[2]) * fraction,
        ])
    }
}

/// The fixed, ordered set of base colors used for spots and ripples.
#[derive(Debug, Clone, Copy)]
pub struct Palette([Rgb; 3]);

impl Palette {
    pub const YELLOW: usize = 0;
    pub const RED: usize = 1;
    pub const BLUE: usize = 2;

    /// Returns the number of base colors.
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the color for an arbitrary index, wrapping around the palette.
    #[inline]
    pub fn wrapping(&self, index: usize) -> Rgb {
        self.0[index % self.0.len()]
    }
}

impl Index<usize> for Palette {
    type Output = Rgb;

    #[inline]
    fn index(&self, index: usize) -> &Rgb {
        &self.0[index]
    }
}

/// `#FFEAB1` yellow, `#DF5757` red, `#4F7BFF` blue.
pub const PALETTE: Palette = Palette([
    Rgb::new(255.0, 234.0, 177.0),
    Rgb::new(233.0, 87.0, 87.0),
    Rgb::new(79.0, 123.0, 255.0),
]);

/// Free-function form of [`Rgb::interpolate`].
#[inline]
pub fn interpolate(a: Rgb, b: Rgb, fraction: f32) -> Rgb {
    a.interpolate(b, fraction)
}
