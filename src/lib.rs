//! Playlist matching library - shared modules for all binaries.

pub mod batch;
pub mod checkpoint;
pub mod client;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod quota;
pub mod safety;
pub mod scoring;
pub mod table;
pub mod youtube;
