//! Scene data: meshes, materials, textures, transforms and terrain.
//!
//! - `model` holds vertices, materials, CPU geometry and the GPU model
//! - `texture` wraps wgpu textures and samplers
//! - `transform` is a position/rotation/scale placement
//! - `terrain` builds a grid mesh from a heightmap and answers height queries

pub mod model;
pub mod terrain;
pub mod texture;
pub mod transform;
