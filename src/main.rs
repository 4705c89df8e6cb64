//! Runs the sketch in a window, with the mouse standing in for a detected hand.
//!
//! Move the mouse over the window to paint. Hold the left button to make a fist and start over.
//! Press Escape to quit.

use std::time::Duration;

use anyhow::anyhow;
use minifb::{Key, MouseButton, MouseMode, Window, WindowOptions};
use suisai::{
    canvas::Canvas,
    sim::{BlankVideo, Pointer, PointerDetectorLoader, SharedPointer},
    sketch::{Control, Sketch, SketchConfig},
    timer::{FpsCounter, Timer},
};

fn main() -> anyhow::Result<()> {
    suisai::init_logger!();

    let config = SketchConfig::default();
    let (width, height) = (config.canvas_width, config.canvas_height);

    let mut window = Window::new(
        "suisai",
        width as usize,
        height as usize,
        WindowOptions::default(),
    )
    .map_err(|e| anyhow!("failed to open window: {e}"))?;
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(config.frame_rate));
    window.limit_update_rate(Some(frame_time));

    let pointer = SharedPointer::default();
    let mut sketch = Sketch::new(
        config,
        BlankVideo::new(width, height),
        PointerDetectorLoader::new(pointer.clone()),
    )?;
    let mut canvas = Canvas::new(width, height);
    let mut buf = Vec::with_capacity(width as usize * height as usize);

    sketch.setup(&mut canvas);

    let t_sketch = Timer::new("sketch");
    let t_present = Timer::new("present");
    let mut fps = FpsCounter::new("render");
    while window.is_open() && !window.is_key_down(Key::Escape) {
        pointer.set(
            window
                .get_mouse_pos(MouseMode::Discard)
                .map(|(x, y)| Pointer {
                    x,
                    y,
                    pressed: window.get_mouse_down(MouseButton::Left),
                }),
        );

        if t_sketch.time(|| sketch.tick(&mut canvas)) == Control::Reloaded {
            log::info!("session restarted");
        }

        t_present.time(|| -> anyhow::Result<()> {
            canvas.write_0rgb(&mut buf);
            window
                .update_with_buffer(&buf, width as usize, height as usize)
                .map_err(|e| anyhow!("failed to present frame: {e}"))
        })?;
        fps.tick_with([&t_sketch, &t_present]);
    }

    Ok(())
}
