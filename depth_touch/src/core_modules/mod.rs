pub mod background_model;
pub mod blob;
pub mod blob_detector;
pub mod cursor_tracker;
pub mod depth_frame;
pub mod foreground;
pub mod roi;
pub mod utils;
