//! Suisai: a watercolor sketch painted by your hands.
//!
//! A hand detector watches a video feed. Every detected hand leaves a soft, translucent spot on
//! the canvas, and hands that move far enough spawn expanding rings that cycle through the
//! [`palette`] while they fade out. The canvas is never wiped; instead it slowly gathers faint
//! brush strokes ([`texture`]) like paper absorbing paint. Showing a closed fist starts over.
//!
//! # Coordinates
//!
//! Canvas coordinates are in pixels, with X pointing right and Y pointing *down*. Detections
//! are reported in the detector's input frame coordinates and are mapped onto the canvas with
//! [`Detection::canvas_position`][detection::Detection::canvas_position].
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: overrides the log levels set by [`init_logger!`].

use log::LevelFilter;

pub mod canvas;
pub mod detection;
pub mod palette;
pub mod poller;
pub mod ripple;
pub mod sim;
pub mod sketch;
pub mod spots;
pub mod surface;
pub mod texture;
pub mod timer;
pub mod worker;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and Suisai will log at *debug* level, unless `RUST_LOG` says otherwise.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
