//! The per-frame driver tying detection, spots, ripples and texture together.

use crate::{
    detection::{DetectionConfig, DetectorLoader, VideoSource},
    poller::DetectionPoller,
    ripple::{RippleParams, RippleSystem},
    spots::{HandSpotRenderer, SpotParams},
    surface::Surface,
    texture::TextureLayer,
};

/// All fixed parameters of a [`Sketch`].
#[derive(Debug, Clone, PartialEq)]
pub struct SketchConfig {
    /// Number of texture strokes drawn on a fresh canvas.
    pub seed_density: usize,
    /// A texture tick happens on every frame that is a multiple of this.
    pub texture_interval: u64,
    pub texture_density: usize,
    /// Minimum number of frames between two coarse detection triggers.
    pub detection_interval: u64,
    /// Target frame rate. Only a hint for the host.
    pub frame_rate: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub ripples: RippleParams,
    pub spots: SpotParams,
    pub detection: DetectionConfig,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            seed_density: 500,
            texture_interval: 120,
            texture_density: 200,
            detection_interval: 100,
            frame_rate: 60,
            canvas_width: 1280,
            canvas_height: 720,
            ripples: RippleParams::default(),
            spots: SpotParams::default(),
            detection: DetectionConfig::default(),
        }
    }
}

/// What the host should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// A closed hand was seen: the session started over from scratch during this frame.
    Reloaded,
}

/// One running session of the watercolor sketch.
///
/// The host creates the sketch, calls [`Sketch::setup`] once with its drawing surface and then
/// [`Sketch::tick`] once per frame with the same surface.
pub struct Sketch {
    config: SketchConfig,
    poller: DetectionPoller,
    texture: TextureLayer,
    spots: HandSpotRenderer,
    ripples: RippleSystem,
    /// Number of the current frame, starting at 1 for the first tick.
    frame_count: u64,
    /// Frame of the last coarse detection trigger.
    last_detection_frame: Option<u64>,
}

impl Sketch {
    /// Creates a sketch and spawns its detection worker.
    ///
    /// Neither `video` nor `loader` are used until [`Sketch::setup`] is called.
    pub fn new<V, L>(config: SketchConfig, video: V, loader: L) -> anyhow::Result<Self>
    where
        V: VideoSource,
        L: DetectorLoader,
    {
        let poller = DetectionPoller::spawn(video, loader, config.detection.clone())?;
        Ok(Self {
            poller,
            texture: TextureLayer::new(),
            spots: HandSpotRenderer::new(config.spots),
            ripples: RippleSystem::new(config.ripples),
            frame_count: 0,
            last_detection_frame: None,
            config,
        })
    }

    /// Replaces the texture generator, eg. with a seeded one.
    pub fn with_texture(self, texture: TextureLayer) -> Self {
        Self { texture, ..self }
    }

    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn ripples(&self) -> &RippleSystem {
        &self.ripples
    }

    pub fn spots(&self) -> &HandSpotRenderer {
        &self.spots
    }

    pub fn poller(&self) -> &DetectionPoller {
        &self.poller
    }

    /// Seeds the canvas texture, starts the video source and starts loading the detector.
    pub fn setup(&mut self, surface: &mut dyn Surface) {
        self.texture.texturize(surface, self.config.seed_density);
        self.poller.start_video_source();
        self.poller.load_detector_async();
    }

    /// Renders one frame.
    ///
    /// Detection results that arrived since the last frame are drawn first, then the texture
    /// and detection triggers run, and all ripples are drawn last.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Control {
        self.frame_count += 1;

        for detections in self.poller.poll() {
            let report = self.spots.render(&detections, surface, &mut self.ripples);
            if report.reset_requests > 0 {
                // Anything still queued belongs to the session that is being thrown away.
                self.reset(surface);
                return Control::Reloaded;
            }
        }

        if self.frame_count % self.config.texture_interval == 0 {
            self.texture.texturize(surface, self.config.texture_density);
        }

        if self.poller.is_video_ready() && self.detection_due() {
            self.poller.trigger_detection_cycle();
            self.last_detection_frame = Some(self.frame_count);
        }

        self.ripples.tick(surface);
        Control::Continue
    }

    fn detection_due(&self) -> bool {
        // Before the first trigger, behave as if the last one happened at frame -1.
        let since = match self.last_detection_frame {
            Some(frame) => self.frame_count - frame,
            None => self.frame_count + 1,
        };
        since > self.config.detection_interval
    }

    /// Starts the session over, as if the program was restarted.
    fn reset(&mut self, surface: &mut dyn Surface) {
        log::info!("closed hand detected, restarting session");

        self.poller.restart();
        self.ripples.clear();
        self.spots.reset();
        self.frame_count = 0;
        self.last_detection_frame = None;

        surface.clear();
        self.texture.texturize(surface, self.config.seed_density);
    }
}
