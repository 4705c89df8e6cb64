//! Expanding, fading rings marking hand movement.

use crate::{
    palette::{Palette, Rgb, PALETTE},
    surface::Surface,
};

/// Fixed per-frame animation parameters of ripples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RippleParams {
    /// Radius added per frame.
    pub growth: f32,
    /// Opacity removed per frame.
    pub fade: f32,
    /// Radius after which the color cycle repeats.
    pub period: f32,
    pub stroke_width: f32,
    /// Ring diameter relative to the ripple's radius.
    pub diameter_factor: f32,
}

impl Default for RippleParams {
    fn default() -> Self {
        Self {
            growth: 2.0,
            fade: 10.0,
            period: 150.0,
            stroke_width: 0.5,
            diameter_factor: 4.0,
        }
    }
}

/// A single ring, spawned at a hand's position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ripple {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Opacity in range 0.0 to 255.0. Never negative.
    pub alpha: f32,
    /// Index of the ripple's base color in the [`PALETTE`].
    pub hue: usize,
    /// Index of the hand slot that spawned this ripple.
    pub slot: usize,
}

impl Ripple {
    /// Creates a fresh ripple for hand slot `slot`: radius 0, fully opaque.
    pub fn new(x: f32, y: f32, slot: usize) -> Self {
        Self {
            x,
            y,
            radius: 0.0,
            alpha: 255.0,
            hue: slot % PALETTE.len(),
            slot,
        }
    }

    /// Returns the ripple's identifying key, `ripple{slot}`.
    pub fn key(&self) -> String {
        format!("ripple{}", self.slot)
    }

    /// Advances the ripple by one frame.
    pub fn advance(&mut self, params: &RippleParams) {
        self.radius += params.growth;
        self.alpha = (self.alpha - params.fade).max(0.0);
    }

    /// Returns whether the ripple has faded out completely.
    #[inline]
    pub fn is_spent(&self) -> bool {
        self.alpha <= 0.0
    }
}

/// Returns the position of `radius` in the repeating color cycle, in range `[0, 1)`.
pub fn phase(radius: f32, period: f32) -> f32 {
    radius.rem_euclid(period) / period
}

/// Computes the ring color at a given `phase`, cycling blue -> red -> yellow -> blue.
///
/// The last segment starts at phase 0.40 but measures its fraction from 0.66, so its first
/// colors extrapolate beyond yellow. The arithmetic is kept exactly as is; see DESIGN.md.
pub fn phase_color(phase: f32) -> Rgb {
    let [yellow, red, blue] = [
        PALETTE[Palette::YELLOW],
        PALETTE[Palette::RED],
        PALETTE[Palette::BLUE],
    ];
    if phase < 0.33 {
        blue.interpolate(red, phase / 0.33)
    } else if phase < 0.40 {
        red.interpolate(yellow, (phase - 0.33) / 0.33)
    } else {
        yellow.interpolate(blue, (phase - 0.66) / 0.34)
    }
}

/// The collection of active ripples.
#[derive(Debug, Default)]
pub struct RippleSystem {
    ripples: Vec<Ripple>,
    params: RippleParams,
}

impl RippleSystem {
    pub fn new(params: RippleParams) -> Self {
        Self {
            ripples: Vec::new(),
            params,
        }
    }

    pub fn spawn(&mut self, ripple: Ripple) {
        log::trace!("spawning {} at ({}, {})", ripple.key(), ripple.x, ripple.y);
        self.ripples.push(ripple);
    }

    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    pub fn len(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ripples.is_empty()
    }

    pub fn clear(&mut self) {
        self.ripples.clear();
    }

    /// Advances every ripple by one frame, draws those still visible and removes the rest.
    ///
    /// A ripple whose opacity reaches zero in this frame is not drawn.
    pub fn tick(&mut self, surface: &mut dyn Surface) {
        let params = self.params;
        for ripple in &mut self.ripples {
            ripple.advance(&params);
            if ripple.is_spent() {
                continue;
            }

            let color = phase_color(phase(ripple.radius, params.period));
            let diameter = ripple.radius * params.diameter_factor;
            surface.set_stroke(color, ripple.alpha);
            surface.clear_fill();
            surface.set_stroke_width(params.stroke_width);
            surface.ellipse(ripple.x, ripple.y, diameter, diameter);
        }
        self.ripples.retain(|r| !r.is_spent());
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::surface::Recorder;

    use super::*;

    fn assert_rgb_near(a: Rgb, b: Rgb, epsilon: f32) {
        for i in 0..3 {
            assert_abs_diff_eq!(a.0[i], b.0[i], epsilon = epsilon);
        }
    }

    #[test]
    fn decays_to_zero_after_26_frames() {
        let params = RippleParams::default();
        let mut ripple = Ripple::new(0.0, 0.0, 0);
        for _ in 0..25 {
            ripple.advance(&params);
        }
        assert_eq!(ripple.alpha, 5.0);
        assert!(!ripple.is_spent());

        ripple.advance(&params);
        assert_eq!(ripple.alpha, 0.0);
        assert_eq!(ripple.radius, 52.0);
        assert!(ripple.is_spent());

        ripple.advance(&params);
        assert_eq!(ripple.alpha, 0.0);
    }

    #[test]
    fn phase_colors() {
        assert_eq!(phase(0.0, 150.0), 0.0);
        assert_rgb_near(phase_color(phase(0.0, 150.0)), PALETTE[Palette::BLUE], 1e-4);
        assert_abs_diff_eq!(phase(49.5, 150.0), 0.33, epsilon = 1e-6);
        assert_rgb_near(phase_color(phase(49.5, 150.0)), PALETTE[Palette::RED], 1e-2);
    }

    #[test]
    fn middle_segment_blends_red_into_yellow() {
        let red = PALETTE[Palette::RED];
        let yellow = PALETTE[Palette::YELLOW];
        assert_rgb_near(phase_color(0.365), red.interpolate(yellow, 0.035 / 0.33), 1e-3);
        // Radius 54 lands inside the segment too: phase 0.36.
        assert_rgb_near(
            phase_color(phase(54.0, 150.0)),
            red.interpolate(yellow, 0.03 / 0.33),
            1e-3,
        );
        // The segment ends early, long before reaching yellow.
        let end = phase_color(0.3999);
        assert!(end.g() < yellow.g() && end.g() > red.g());
    }

    #[test]
    fn phase_wraps() {
        assert_abs_diff_eq!(phase(160.0, 150.0), phase(10.0, 150.0), epsilon = 1e-6);
        assert_eq!(phase(150.0, 150.0), 0.0);
    }

    #[test]
    fn third_segment_keeps_its_offset() {
        // At phase 0.66 the last segment is exactly yellow; below that it extrapolates.
        assert_rgb_near(phase_color(0.66), PALETTE[Palette::YELLOW], 1e-3);
        assert_rgb_near(phase_color(1.0), PALETTE[Palette::BLUE], 1e-3);
        let early = phase_color(0.40);
        let expected = PALETTE[Palette::YELLOW].interpolate(PALETTE[Palette::BLUE], -0.26 / 0.34);
        assert_rgb_near(early, expected, 1e-3);
    }

    #[test]
    fn ripple_keys_and_hues() {
        let r = Ripple::new(1.0, 2.0, 4);
        assert_eq!(r.key(), "ripple4");
        assert_eq!(r.hue, 1);
        assert_eq!(r.radius, 0.0);
        assert_eq!(r.alpha, 255.0);
    }

    #[test]
    fn draws_rings_until_spent_then_prunes() {
        let mut system = RippleSystem::new(RippleParams::default());
        system.spawn(Ripple::new(100.0, 50.0, 0));

        let mut rec = Recorder::new(640.0, 480.0);
        system.tick(&mut rec);
        let ellipses = rec.ellipses();
        assert_eq!(ellipses.len(), 1);
        let (pen, [x, y, w, h]) = ellipses[0];
        assert_eq!((x, y, w, h), (100.0, 50.0, 8.0, 8.0));
        assert_eq!(pen.fill, None);
        assert_eq!(pen.stroke_width, 0.5);
        assert_eq!(pen.stroke.unwrap().1, 245.0);

        for _ in 1..25 {
            system.tick(&mut rec);
        }
        assert_eq!(rec.ellipses().len(), 25);
        assert_eq!(system.len(), 1);

        // 26th frame: opacity reaches zero, nothing is drawn and the ripple is removed.
        system.tick(&mut rec);
        assert_eq!(rec.ellipses().len(), 25);
        assert!(system.is_empty());
    }

    #[test]
    fn empty_system_draws_nothing() {
        let mut system = RippleSystem::default();
        let mut rec = Recorder::new(10.0, 10.0);
        system.tick(&mut rec);
        assert!(rec.calls().is_empty());
    }
}
