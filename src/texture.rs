//! Procedural paper texture.

use std::f32::consts::TAU;

use crate::{palette::Rgb, surface::Surface};

/// The tint every texture stroke is drawn with. Not part of the [`PALETTE`][crate::palette::PALETTE].
pub const TEXTURE_TINT: Rgb = Rgb::new(100.0, 90.0, 90.0);

const MIN_LENGTH: f32 = 2.0;
const MAX_LENGTH: f32 = 7.0;
const MIN_ALPHA: f32 = 5.0;
const MAX_ALPHA: f32 = 15.0;

/// Overlays the surface with short, faint, randomly oriented strokes.
///
/// The layer never clears anything; repeated calls keep adding to the texture already present.
pub struct TextureLayer {
    rng: fastrand::Rng,
}

impl TextureLayer {
    /// Creates a texture layer seeded from the thread-local generator.
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    /// Creates a texture layer whose strokes are fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Draws `density` independent strokes at random positions within the surface bounds.
    pub fn texturize(&mut self, surface: &mut dyn Surface, density: usize) {
        let (width, height) = surface.size();
        surface.set_stroke_width(1.0);
        for _ in 0..density {
            let alpha = self.range(MIN_ALPHA, MAX_ALPHA);
            surface.set_stroke(TEXTURE_TINT, alpha);

            let x1 = self.range(0.0, width);
            let y1 = self.range(0.0, height);
            let theta = self.range(0.0, TAU);
            let length = self.range(MIN_LENGTH, MAX_LENGTH);
            let x2 = theta.cos() * length + x1;
            let y2 = theta.sin() * length + y1;
            surface.line(x1, y1, x2, y2);
        }
    }

    fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.rng.f32() * (max - min)
    }
}

impl Default for TextureLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::surface::Recorder;

    use super::*;

    #[test]
    fn draws_density_strokes_within_bounds() {
        let mut rec = Recorder::new(640.0, 480.0);
        let mut layer = TextureLayer::with_seed(7);
        layer.texturize(&mut rec, 500);

        let lines = rec.lines();
        assert_eq!(lines.len(), 500);
        for (pen, [x1, y1, x2, y2]) in lines {
            assert!((0.0..640.0).contains(&x1));
            assert!((0.0..480.0).contains(&y1));

            let len = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
            assert!(len >= MIN_LENGTH - 1e-3 && len <= MAX_LENGTH + 1e-3, "{len}");

            let (tint, alpha) = pen.stroke.unwrap();
            assert_eq!(tint, TEXTURE_TINT);
            assert!((MIN_ALPHA..=MAX_ALPHA).contains(&alpha));
        }
    }

    #[test]
    fn zero_density_draws_nothing() {
        let mut rec = Recorder::new(10.0, 10.0);
        TextureLayer::with_seed(1).texturize(&mut rec, 0);
        assert_eq!(rec.line_count(), 0);
    }

    #[test]
    fn seeded_layers_are_deterministic() {
        let mut a = Recorder::new(100.0, 100.0);
        let mut b = Recorder::new(100.0, 100.0);
        TextureLayer::with_seed(42).texturize(&mut a, 20);
        TextureLayer::with_seed(42).texturize(&mut b, 20);
        assert_eq!(a.calls(), b.calls());
    }

    #[test]
    fn never_clears_the_surface() {
        let mut rec = Recorder::new(100.0, 100.0);
        let mut layer = TextureLayer::with_seed(3);
        layer.texturize(&mut rec, 10);
        layer.texturize(&mut rec, 10);
        assert_eq!(rec.line_count(), 20);
    }
}
