//! Internal utilities.

pub mod media;
pub mod render;
pub mod sanitize;
