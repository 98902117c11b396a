//! wgpu bind group layouts and render pipelines.
//!
//! - `basic` builds the render pipelines for both vertex layouts and blend modes
//! - `layout` holds the two bind group layouts every pipeline shares

pub mod basic;
pub mod layout;
