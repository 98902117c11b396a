//! scene-ngin
//!
//! A small real-time scene renderer on wgpu: a height-mapped terrain, a
//! spinning cubemap skybox and textured, optionally transparent and
//! reflective models, viewed through a first-person camera lit by a single
//! point light.
//!
//! High-level modules
//! - `camera`: camera, projection and input controller
//! - `config`: startup configuration with the stock scene as default
//! - `context`: wgpu device wrapper implementing the `gpu::Device` seam
//! - `data_structures`: meshes, materials, textures, transforms, terrain
//! - `gpu`: the device and render-target traits every component draws through
//! - `pipelines`: bind group layouts and render pipeline construction
//! - `resources`: asset loading (shaders, images, meshes, cubemaps)
//! - `shader`: compiled programs, constant buffers and per-model draws
//! - `render`: per-frame draw batching and ordering
//! - `scene`: owns every component, updates and renders a frame
//! - `system`: winit event loop
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod gpu;
pub mod light;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod system;

pub use config::SceneConfig;
pub use error::{Result, SceneError, Severity};
pub use scene::Scene;
pub use system::run;
