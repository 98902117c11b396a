//! Startup configuration for the showcase scene.
//!
//! [`SceneConfig::default`] reproduces the stock scene: window size, projection
//! planes, clear colour, camera start, light and the asset files to load. All
//! asset paths are relative to [`SceneConfig::asset_root`].

use std::path::{Path, PathBuf};

use cgmath::{Deg, Point3, Vector3};

use crate::{data_structures::transform::Transform, light::Light};

pub const DEFAULT_SCREEN_WIDTH: u32 = 2560;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1440;
pub const SCREEN_DEPTH: f32 = 1000.0;
pub const SCREEN_NEAR: f32 = 0.1;

/// Where the six skybox faces come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CubemapSource {
    /// One image per face in `+X, -X, +Y, -Y, +Z, -Z` order.
    Faces([PathBuf; 6]),
    /// A single image of six square faces laid out left to right in face order.
    Strip(PathBuf),
}

/// Mesh file format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Gltf,
}

impl MeshFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "obj" => Some(MeshFormat::Obj),
            "gltf" | "glb" => Some(MeshFormat::Gltf),
            _ => None,
        }
    }
}

/// Where a regular model's geometry comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// The built-in unit quad on the plane `y = 1`.
    Quad,
    Mesh {
        path: PathBuf,
        /// Mirror z and reverse winding when the file was authored right-handed.
        right_handed: bool,
    },
}

/// One regular model placed in the scene.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub source: ModelSource,
    pub diffuse: Option<PathBuf>,
    pub normal_map: Option<PathBuf>,
    pub transform: Transform,
    pub transparent: bool,
    pub reflective: bool,
}

impl ModelSpec {
    pub fn quad(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: ModelSource::Quad,
            diffuse: None,
            normal_map: None,
            transform: Transform::new(),
            transparent: false,
            reflective: false,
        }
    }

    pub fn mesh(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Mesh {
                path: path.into(),
                right_handed: true,
            },
            ..Self::quad(name)
        }
    }

    pub fn with_diffuse(mut self, path: impl Into<PathBuf>) -> Self {
        self.diffuse = Some(path.into());
        self
    }

    pub fn with_normal_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.normal_map = Some(path.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    pub fn reflective(mut self) -> Self {
        self.reflective = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fovy: Deg<f32>,
    pub screen_near: f32,
    pub screen_depth: f32,
    pub clear_colour: wgpu::Color,
    /// Multiplier applied to the measured frame time before it reaches the scene.
    pub time_scale: f32,

    pub camera_start: Point3<f32>,
    pub camera_target: Point3<f32>,
    pub camera_speed: f32,
    pub camera_sensitivity: f32,
    /// Keep the eye this far above the terrain. `None` lets the camera fly freely.
    pub ground_clearance: Option<f32>,

    pub light: Light,

    pub asset_root: PathBuf,
    pub default_shader: PathBuf,
    pub skybox_shader: PathBuf,

    pub heightmap: PathBuf,
    pub height_scale: f32,
    pub cell_space: f32,
    pub terrain_diffuse: Option<PathBuf>,
    pub terrain_normal_map: Option<PathBuf>,

    pub cubemap: CubemapSource,
    /// Replaces the procedural sky sphere when set.
    pub skybox_mesh: Option<PathBuf>,
    pub skybox_scale: f32,
    /// Radians per second.
    pub skybox_spin: f32,
    /// Re-centre and spin the skybox around the eye every frame.
    pub skybox_follows_camera: bool,

    pub models: Vec<ModelSpec>,
    /// Per-shader draw slots available in one frame.
    pub max_draws_per_frame: u32,
}

impl SceneConfig {
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_ground_clearance(mut self, clearance: f32) -> Self {
        self.ground_clearance = Some(clearance);
        self
    }

    pub fn with_skybox_following_camera(mut self) -> Self {
        self.skybox_follows_camera = true;
        self
    }

    pub fn asset_path(&self, relative: &Path) -> PathBuf {
        self.asset_root.join(relative)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        let water = ModelSpec::quad("water")
            .with_diffuse("textures/water.png")
            .with_transform(Transform {
                position: Vector3::new(64.0, 2.0, 64.0),
                scale: Vector3::new(64.0, 1.0, 64.0),
                ..Transform::new()
            })
            .transparent()
            .reflective();
        Self {
            title: "Harry Potter Features showcase".to_string(),
            width: DEFAULT_SCREEN_WIDTH,
            height: DEFAULT_SCREEN_HEIGHT,
            fovy: Deg(45.0),
            screen_near: SCREEN_NEAR,
            screen_depth: SCREEN_DEPTH,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 0.8,
                b: 0.2,
                a: 1.0,
            },
            time_scale: 0.5,
            camera_start: Point3::new(10.0, 100.0, 10.0),
            camera_target: Point3::new(0.0, 0.0, 0.0),
            camera_speed: 20.0,
            camera_sensitivity: 0.4,
            ground_clearance: None,
            light: Light::default(),
            asset_root: PathBuf::from("assets"),
            default_shader: PathBuf::from("shaders/default.wgsl"),
            skybox_shader: PathBuf::from("shaders/skybox.wgsl"),
            heightmap: PathBuf::from("textures/heightmap.png"),
            height_scale: 0.1,
            cell_space: 1.0,
            terrain_diffuse: Some(PathBuf::from("textures/grass.png")),
            terrain_normal_map: Some(PathBuf::from("textures/grass_normal.png")),
            cubemap: CubemapSource::Strip(PathBuf::from("textures/skymap.png")),
            skybox_mesh: None,
            skybox_scale: 75.0,
            skybox_spin: 0.02,
            skybox_follows_camera: false,
            models: vec![water],
            max_draws_per_frame: 256,
        }
    }
}
