//! Error types for the touch pipeline.
//!
//! Errors are split by how the caller is expected to react: `ConfigError` and
//! `SourceError` abort startup, `FrameError` only costs the current frame.

use thiserror::Error;

/// Fatal problems detected while setting the pipeline up.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for `TouchConfig`.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The region of interest collapses to nothing inside the frame.
    #[error("invalid region of interest x {x_min}..{x_max}, y {y_min}..{y_max}")]
    InvalidRoi {
        x_min: u32,
        x_max: u32,
        y_min: u32,
        y_max: u32,
    },

    /// The touch band does not contain any depth value.
    #[error("touch depth band {min}..{max} is empty")]
    InvalidDepthBand { min: i32, max: i32 },

    /// The sensor resolution has a zero side.
    #[error("sensor resolution {width}x{height} is invalid")]
    InvalidResolution { width: u32, height: u32 },

    /// Background training was asked to average zero frames.
    #[error("background training needs at least one frame")]
    EmptyTraining,

    /// A training frame does not have the size of the first one.
    #[error("training frame {index} is {found:?}, expected {expected:?}")]
    DimensionMismatch {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

/// Problems with a depth source as a whole.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The device (or recording) could not be opened.
    #[error("depth source unavailable: {0}")]
    Unavailable(String),

    /// The capture task has stopped and no further frames will arrive.
    #[error("depth source closed")]
    Closed,

    /// The capture task panicked or was cancelled.
    #[error("capture task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Problems with a single frame. The frame is dropped and processing continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The raw frame could not be decoded into depth values.
    #[error("failed to decode depth frame: {0}")]
    Decode(String),

    /// The frame holds no depth readings.
    #[error("depth frame is empty")]
    Empty,

    /// The frame buffer does not have the announced size.
    #[error("frame buffer holds {found} samples, expected {expected}")]
    BufferSize { expected: usize, found: usize },

    /// The frame does not match the background resolution.
    #[error("frame is {found:?}, background is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

/// Anything that can stop the engine from starting or running.
#[derive(Error, Debug)]
pub enum TouchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),
}
