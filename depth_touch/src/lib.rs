// THEORY:
// This file is the entry point for the `depth_touch` library crate. It turns a
// depth camera looking down at any flat surface into a multi-touch input device:
// frames go in, persistent cursor add/update/remove events come out.
//
// The public API is the `TouchPipeline` and the two seams around it: the
// `DepthSource` it reads frames from and the `FrameEmitter` it reports cursors
// to. The detection stages themselves live in `core_modules` and are exposed
// for callers that want to run them individually.

pub mod config;
pub mod core_modules;
pub mod depth_source;
pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod synthetic;

pub use config::TouchConfig;
pub use core_modules::depth_frame::DepthFrame;
pub use core_modules::roi::Roi;
pub use depth_source::{CaptureSource, DepthSource, FrameGrabber};
pub use emitter::{BroadcastEmitter, EventLog, FrameEmitter, TouchFrame, TracingEmitter};
pub use error::{ConfigError, FrameError, SourceError, TouchError};
pub use pipeline::{FrameAnalysis, TouchPipeline, train_from_source};
