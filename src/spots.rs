//! Watercolor spots at detected hand positions, and the decision to spawn ripples.
//!
//! Hands are identified purely by their index in the detector's output list. If the detector
//! reorders its results between cycles, hands are mismatched: a hand may be treated as new (and
//! spawn a ripple) or be compared against another hand's previous position.

use std::{collections::BTreeMap, mem};

use crate::{
    detection::{Detection, Label},
    palette::{Rgb, PALETTE},
    ripple::{Ripple, RippleSystem},
    surface::Surface,
};

/// Fixed parameters of spot rendering and movement tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotParams {
    /// Diameter of the filled disc.
    pub size: f32,
    pub fill_alpha: f32,
    /// Number of concentric rings drawn over the disc.
    pub rings: u32,
    pub ring_alpha: f32,
    /// Minimum distance a hand has to move between cycles to spawn a ripple.
    pub movement_threshold: f32,
    /// A "closed" hand above this score triggers a reset.
    pub closed_score: f32,
}

impl Default for SpotParams {
    fn default() -> Self {
        Self {
            size: 50.0,
            fill_alpha: 10.0,
            rings: 6,
            ring_alpha: 3.0,
            movement_threshold: 50.0,
            closed_score: 0.7,
        }
    }
}

/// Last known canvas positions of each hand slot, for this cycle and the previous one.
#[derive(Debug, Default, Clone)]
pub struct TrackedPositions {
    current: BTreeMap<usize, (f32, f32)>,
    previous: BTreeMap<usize, (f32, f32)>,
}

impl TrackedPositions {
    /// Returns the position recorded for `slot` in the most recent cycle.
    pub fn current(&self, slot: usize) -> Option<(f32, f32)> {
        self.current.get(&slot).copied()
    }

    /// Returns the position `slot` had in the cycle before, which new positions are compared to.
    pub fn previous(&self, slot: usize) -> Option<(f32, f32)> {
        self.previous.get(&slot).copied()
    }

    /// Keys of the hands tracked in the most recent cycle (`hand0`, `hand1`, ...).
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.current.keys().map(|slot| format!("hand{slot}"))
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Forgets every tracked hand.
    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }

    fn begin_cycle(&mut self) {
        self.current.clear();
    }

    fn end_cycle(&mut self) {
        self.previous = mem::take(&mut self.current);
        self.current = self.previous.clone();
    }

    /// Records `pos` for `slot` and returns whether it is new or moved far enough.
    fn record(&mut self, slot: usize, pos: (f32, f32), threshold: f32) -> bool {
        self.current.insert(slot, pos);
        match self.previous.get(&slot) {
            None => true,
            Some(&(px, py)) => {
                let dist = ((pos.0 - px).powi(2) + (pos.1 - py).powi(2)).sqrt();
                dist > threshold
            }
        }
    }
}

/// Summary of one processed detection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub spots: usize,
    pub ripples_spawned: usize,
    /// Number of confident "closed" hands seen. Any non-zero value requests a reset.
    pub reset_requests: usize,
    /// Detections skipped because of a malformed bounding box.
    pub skipped: usize,
}

/// Turns one cycle's detections into spots and ripple spawns.
#[derive(Debug, Default)]
pub struct HandSpotRenderer {
    params: SpotParams,
    positions: TrackedPositions,
}

impl HandSpotRenderer {
    pub fn new(params: SpotParams) -> Self {
        Self {
            params,
            positions: TrackedPositions::default(),
        }
    }

    pub fn positions(&self) -> &TrackedPositions {
        &self.positions
    }

    /// Forgets all tracked hands, so every hand in the next cycle counts as new.
    pub fn reset(&mut self) {
        self.positions.clear();
    }

    /// Processes the detections of one cycle, in detector order.
    ///
    /// Face detections are skipped. Each remaining detection at index `i` is drawn as a spot in
    /// palette color `i % 3`, and spawns a ripple if hand slot `i` is new or moved more than the
    /// movement threshold since the previous cycle. Hands missing from this cycle are forgotten.
    pub fn render(
        &mut self,
        detections: &[Detection],
        surface: &mut dyn Surface,
        ripples: &mut RippleSystem,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        self.positions.begin_cycle();

        for (i, det) in detections.iter().enumerate() {
            if det.label.is_face() {
                continue;
            }

            if det.label == Label::Closed && det.score > self.params.closed_score {
                log::info!("closed hand detected (score {:.2})", det.score);
                report.reset_requests += 1;
            }

            let Some((x, y)) = det.canvas_position() else {
                log::warn!("skipping detection with malformed bounding box: {:?}", det.bbox);
                report.skipped += 1;
                continue;
            };

            self.draw_spot(surface, x, y, PALETTE.wrapping(i));
            report.spots += 1;

            if self
                .positions
                .record(i, (x, y), self.params.movement_threshold)
            {
                ripples.spawn(Ripple::new(x, y, i));
                report.ripples_spawned += 1;
            }
        }

        self.positions.end_cycle();
        if log::log_enabled!(log::Level::Trace) {
            let hands = self.positions.keys().collect::<Vec<_>>();
            log::trace!("tracking [{}]: {report:?}", hands.join(", "));
        }
        report
    }

    /// Draws a faint disc overlaid with concentric rings of decreasing stroke width.
    fn draw_spot(&self, surface: &mut dyn Surface, x: f32, y: f32, color: Rgb) {
        let size = self.params.size;

        surface.clear_stroke();
        surface.set_fill(color, self.params.fill_alpha);
        surface.ellipse(x, y, size, size);

        surface.clear_fill();
        for ring in (1..=self.params.rings).rev() {
            let ring = ring as f32;
            surface.set_stroke(color, self.params.ring_alpha);
            surface.set_stroke_width(ring);
            surface.ellipse(x, y, size - ring * 2.0, size - ring * 2.0);
        }
    }
}
