//! Asset loading from disk.
//!
//! Everything the scene needs is read and decoded here, before any GPU work:
//! shader sources, images, the heightmap, the skybox cubemap and model
//! meshes. [`SceneAssets::load`] gathers all of it for a [`SceneConfig`].

use std::path::{Path, PathBuf};

use crate::{
    config::{ModelSource, ModelSpec, SceneConfig},
    data_structures::{
        model::{Geometry, TextureImage},
        terrain::Heightmap,
    },
    error::{Result, SceneError},
};

pub mod mesh;
pub mod texture;

pub(crate) fn parent_dir(file_name: &Path) -> PathBuf {
    file_name.parent().map(Path::to_path_buf).unwrap_or_default()
}

pub async fn load_string(root: &Path, file_name: &Path) -> Result<String> {
    let path = root.join(file_name);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| SceneError::Io { path, source })
}

pub async fn load_binary(root: &Path, file_name: &Path) -> Result<Vec<u8>> {
    let path = root.join(file_name);
    tokio::fs::read(&path)
        .await
        .map_err(|source| SceneError::Io { path, source })
}

/// Decoded data for one configured model.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub spec: ModelSpec,
    pub geometry: Geometry,
    pub diffuse: Option<TextureImage>,
    pub normal_map: Option<TextureImage>,
}

impl ModelAsset {
    pub async fn load(root: &Path, spec: &ModelSpec) -> Result<Self> {
        let (geometry, mut diffuse, mut normal_map) = match &spec.source {
            ModelSource::Quad => (Geometry::quad(), None, None),
            ModelSource::Mesh { path, right_handed } => {
                let mesh = mesh::load_mesh(root, path, *right_handed).await?;
                (mesh.geometry, mesh.diffuse, mesh.normal_map)
            }
        };
        // Explicit files win over the ones named by the mesh materials.
        if let Some(path) = &spec.diffuse {
            diffuse = Some(texture::load_image(root, path).await?);
        }
        if let Some(path) = &spec.normal_map {
            normal_map = Some(texture::load_image(root, path).await?);
        }
        Ok(Self {
            spec: spec.clone(),
            geometry,
            diffuse,
            normal_map,
        })
    }
}

/// Everything [`Scene::initialize`](crate::scene::Scene::initialize) uploads.
#[derive(Debug, Clone)]
pub struct SceneAssets {
    pub default_shader: String,
    pub skybox_shader: String,
    pub skybox_geometry: Geometry,
    /// Six faces stacked vertically.
    pub cubemap: TextureImage,
    pub heightmap: Heightmap,
    pub terrain_diffuse: Option<TextureImage>,
    pub terrain_normal_map: Option<TextureImage>,
    pub models: Vec<ModelAsset>,
}

impl SceneAssets {
    pub async fn load(config: &SceneConfig) -> Result<Self> {
        let root = config.asset_root.as_path();
        log::info!("Loading assets from {root:?}");

        let default_shader = load_string(root, &config.default_shader).await?;
        let skybox_shader = load_string(root, &config.skybox_shader).await?;

        let skybox_geometry = match &config.skybox_mesh {
            Some(path) => mesh::load_mesh(root, path, true).await?.geometry,
            None => Geometry::sky_sphere(16, 32),
        };
        let cubemap = texture::load_cubemap(root, &config.cubemap).await?;

        let heightmap = texture::load_heightmap(root, &config.heightmap, config.height_scale).await?;
        let terrain_diffuse = match &config.terrain_diffuse {
            Some(path) => Some(texture::load_image(root, path).await?),
            None => None,
        };
        let terrain_normal_map = match &config.terrain_normal_map {
            Some(path) => Some(texture::load_image(root, path).await?),
            None => None,
        };

        let mut models = Vec::with_capacity(config.models.len());
        for spec in &config.models {
            models.push(ModelAsset::load(root, spec).await?);
        }
        log::info!(
            "Loaded {} models, {}x{} heightmap",
            models.len(),
            heightmap.width(),
            heightmap.depth()
        );

        Ok(Self {
            default_shader,
            skybox_shader,
            skybox_geometry,
            cubemap,
            heightmap,
            terrain_diffuse,
            terrain_normal_map,
            models,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_scene_loads_from_the_bundled_assets() {
        let config = SceneConfig::default().with_asset_root(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
        let assets = SceneAssets::load(&config).await.unwrap();

        assert!(assets.default_shader.contains("fn fs_main"));
        assert_eq!(assets.cubemap.height, assets.cubemap.width * 6);
        assert_eq!((assets.heightmap.width(), assets.heightmap.depth()), (129, 129));
        assert!(assets.terrain_diffuse.is_some());
        assert!(assets.terrain_normal_map.is_some());
        assert_eq!(assets.models.len(), 1);
        assert!(assets.models[0].diffuse.is_some());
    }

    #[tokio::test]
    async fn missing_files_report_their_path() {
        let err = load_string(Path::new("/nonexistent"), Path::new("shader.wgsl"))
            .await
            .unwrap_err();
        assert!(matches!(err, SceneError::Io { ref path, .. } if path.ends_with("shader.wgsl")));
    }
}
