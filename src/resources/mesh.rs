use std::{
    io::{BufReader, Cursor},
    path::Path,
};

use crate::{
    config::MeshFormat,
    data_structures::model::{Geometry, ModelVertex, Subset, SurfaceMaterial, TextureImage},
    error::{Result, SceneError},
    resources::{load_binary, load_string, parent_dir, texture},
};

/// A parsed mesh plus the first diffuse/normal textures its materials name.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub geometry: Geometry,
    pub diffuse: Option<TextureImage>,
    pub normal_map: Option<TextureImage>,
}

fn mesh_error(path: &Path, reason: impl ToString) -> SceneError {
    SceneError::Mesh {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Loads an OBJ or glTF mesh. The geometry is validated first, then
/// `right_handed` sources are converted to the left-handed scene convention
/// before missing normals and tangents are computed.
pub async fn load_mesh(root: &Path, file_name: &Path, right_handed: bool) -> Result<MeshAsset> {
    let format = MeshFormat::from_path(file_name)
        .ok_or_else(|| mesh_error(file_name, "unsupported mesh format"))?;
    let mut asset = match format {
        MeshFormat::Obj => load_obj(root, file_name).await?,
        MeshFormat::Gltf => load_gltf(root, file_name).await?,
    };
    let geometry = &mut asset.geometry;
    geometry.validate(&file_name.to_string_lossy())?;
    if right_handed {
        geometry.to_left_handed();
    }
    geometry.fill_missing_normals();
    geometry.compute_tangents();
    Ok(asset)
}

async fn load_obj(root: &Path, file_name: &Path) -> Result<MeshAsset> {
    let obj_text = load_string(root, file_name).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    let dir = parent_dir(file_name);

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let root = root.to_path_buf();
            let path = dir.join(p);
            async move {
                match load_string(&root, &path).await {
                    Ok(text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(text))),
                    Err(e) => {
                        log::warn!("{e}");
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        },
    )
    .await
    .map_err(|e| mesh_error(file_name, e))?;

    let materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("Materials of {file_name:?} could not be loaded ({e}), using defaults");
        Vec::new()
    });
    let geometry = obj_geometry(&models, &materials);

    let diffuse = match materials.iter().find_map(|m| m.diffuse_texture.as_ref()) {
        Some(tex) => Some(texture::load_image(root, &dir.join(tex)).await?),
        None => None,
    };
    let normal_map = match materials.iter().find_map(|m| m.normal_texture.as_ref()) {
        Some(tex) => Some(texture::load_image(root, &dir.join(tex)).await?),
        None => None,
    };
    Ok(MeshAsset {
        geometry,
        diffuse,
        normal_map,
    })
}

fn rgba(rgb: Option<[f32; 3]>, fallback: [f32; 4], alpha: f32) -> [f32; 4] {
    rgb.map_or(fallback, |[r, g, b]| [r, g, b, alpha])
}

pub fn obj_material(m: &tobj::Material) -> SurfaceMaterial {
    let defaults = SurfaceMaterial::named(&m.name);
    let alpha = m.dissolve.unwrap_or(1.0);
    SurfaceMaterial {
        diffuse: rgba(m.diffuse, [1.0, 1.0, 1.0, alpha], alpha),
        ambient: rgba(m.ambient, defaults.ambient, 1.0),
        specular: rgba(m.specular, defaults.specular, 1.0),
        shininess: m.shininess.unwrap_or(defaults.shininess).max(1.0),
        is_transparent: alpha < 1.0,
        ..defaults
    }
}

/// Concatenates every OBJ model into one buffer, one subset per model.
pub fn obj_geometry(models: &[tobj::Model], materials: &[tobj::Material]) -> Geometry {
    let mut geometry = Geometry::default();
    geometry.materials = materials.iter().map(obj_material).collect();
    let mut needs_default = geometry.materials.is_empty();

    for m in models {
        let base = geometry.vertices.len() as u32;
        let mesh = &m.mesh;
        geometry.vertices.extend((0..mesh.positions.len() / 3).map(|i| {
            ModelVertex::new(
                [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                [
                    mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                    1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                [
                    mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                    mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                    mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                ],
            )
        }));

        let start = geometry.indices.len() as u32;
        geometry.indices.extend(mesh.indices.iter().map(|i| i + base));
        let material = match mesh.material_id {
            Some(id) if id < materials.len() => id,
            _ => {
                needs_default = true;
                materials.len()
            }
        };
        geometry.subsets.push(Subset {
            start,
            count: mesh.indices.len() as u32,
            material,
        });
    }

    if needs_default {
        geometry.materials.push(SurfaceMaterial::default());
    }
    geometry
}

async fn load_gltf(root: &Path, file_name: &Path) -> Result<MeshAsset> {
    let data = load_binary(root, file_name).await?;
    let gltf = gltf::Gltf::from_slice(&data).map_err(|e| mesh_error(file_name, e))?;
    let dir = parent_dir(file_name);

    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| mesh_error(file_name, "binary chunk missing"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_binary(root, &dir.join(uri)).await?);
            }
        }
    }

    let mut geometry = Geometry::default();
    geometry.materials = gltf.materials().map(|m| gltf_material(&m)).collect();
    let default_material = geometry.materials.len();
    let mut needs_default = false;

    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive in {file_name:?}");
                continue;
            }
            let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Vec<[f32; 3]> = reader.read_normals().map_or_else(Vec::new, |n| n.collect());
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map_or_else(Vec::new, |t| t.into_f32().collect());

            let base = geometry.vertices.len() as u32;
            geometry.vertices.extend(positions.iter().enumerate().map(|(i, p)| {
                ModelVertex::new(
                    *p,
                    uvs.get(i).copied().unwrap_or_default(),
                    normals.get(i).copied().unwrap_or_default(),
                )
            }));

            let start = geometry.indices.len() as u32;
            match reader.read_indices() {
                Some(indices) => geometry.indices.extend(indices.into_u32().map(|i| i + base)),
                None => geometry.indices.extend(base..base + positions.len() as u32),
            }
            let material = primitive.material().index().unwrap_or_else(|| {
                needs_default = true;
                default_material
            });
            geometry.subsets.push(Subset {
                start,
                count: geometry.indices.len() as u32 - start,
                material,
            });
        }
    }
    if needs_default || geometry.materials.is_empty() {
        geometry.materials.push(SurfaceMaterial::default());
    }

    let mut diffuse = None;
    let mut normal_map = None;
    for material in gltf.materials() {
        if diffuse.is_none() {
            if let Some(info) = material.pbr_metallic_roughness().base_color_texture() {
                diffuse = Some(gltf_image(root, &dir, &buffer_data, info.texture().source()).await?);
            }
        }
        if normal_map.is_none() {
            if let Some(info) = material.normal_texture() {
                normal_map = Some(gltf_image(root, &dir, &buffer_data, info.texture().source()).await?);
            }
        }
    }

    Ok(MeshAsset {
        geometry,
        diffuse,
        normal_map,
    })
}

fn gltf_material(material: &gltf::Material<'_>) -> SurfaceMaterial {
    let name = material.name().unwrap_or("gltf material");
    let pbr = material.pbr_metallic_roughness();
    let diffuse = pbr.base_color_factor();
    SurfaceMaterial {
        diffuse,
        is_transparent: material.alpha_mode() == gltf::material::AlphaMode::Blend,
        ..SurfaceMaterial::named(name)
    }
}

async fn gltf_image(
    root: &Path,
    dir: &Path,
    buffer_data: &[Vec<u8>],
    image: gltf::Image<'_>,
) -> Result<TextureImage> {
    match image.source() {
        gltf::image::Source::View { view, .. } => {
            let label = format!("gltf image {}", image.index());
            let bytes = buffer_data
                .get(view.buffer().index())
                .and_then(|b| b.get(view.offset()..view.offset() + view.length()))
                .ok_or_else(|| mesh_error(Path::new(&label), "image view out of range"))?;
            let decoded = texture::decode_image(Path::new(&label), bytes)?;
            Ok(texture::to_texture_image(&label, &decoded))
        }
        gltf::image::Source::Uri { uri, .. } => texture::load_image(root, &dir.join(uri)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_OBJECTS: &str = "\
o first
v 0 0 0
v 1 0 0
v 0 0 1
vt 0 0
vt 1 0
vt 0 1
vn 0 1 0
f 1/1/1 2/2/1 3/3/1
o second
v 0 1 0
v 1 1 0
v 0 1 1
v 1 1 1
f 4/1/1 5/2/1 6/3/1
f 5/2/1 7/1/1 6/3/1
";

    /// A scratch asset root holding `files`.
    fn asset_root(name: &str, files: &[(&str, &[u8])]) -> std::path::PathBuf {
        let root = std::env::temp_dir().join(format!("scene-ngin-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        for (file, data) in files {
            std::fs::write(root.join(file), data).unwrap();
        }
        root
    }

    fn parse(src: &str) -> Vec<tobj::Model> {
        let (models, _) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(src)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Err(tobj::LoadError::OpenFileFailed),
        )
        .unwrap();
        models
    }

    #[test]
    fn obj_models_become_subsets() {
        let geometry = obj_geometry(&parse(TWO_OBJECTS), &[]);
        assert_eq!(geometry.subsets.len(), 2);
        assert_eq!(geometry.subsets[0], Subset { start: 0, count: 3, material: 0 });
        assert_eq!(geometry.subsets[1].start, 3);
        assert_eq!(geometry.subsets[1].count, 6);
        assert_eq!(geometry.materials.len(), 1);
        assert!(geometry.validate("two objects").is_ok());
        // second object's indices are rebased past the first object's vertices
        assert!(geometry.indices[3..].iter().all(|&i| i >= 3));
    }

    #[test]
    fn obj_texture_v_is_flipped() {
        let geometry = obj_geometry(&parse(TWO_OBJECTS), &[]);
        let v = geometry.vertices.iter().find(|v| v.position == [0.0, 0.0, 1.0]).unwrap();
        assert_eq!(v.tex_coords, [0.0, 0.0]);
    }

    #[test]
    fn dissolve_marks_materials_transparent() {
        let mtl = tobj::Material {
            name: "glass".into(),
            diffuse: Some([0.5, 0.5, 1.0]),
            dissolve: Some(0.4),
            ..Default::default()
        };
        let material = obj_material(&mtl);
        assert!(material.is_transparent);
        assert_eq!(material.diffuse, [0.5, 0.5, 1.0, 0.4]);
        assert_eq!(material.name, "glass");
    }

    #[test]
    fn missing_obj_normals_are_computed_from_faces() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 0 1\nf 1 3 2\n";
        let mut geometry = obj_geometry(&parse(src), &[]);
        assert!(geometry.vertices.iter().all(|v| v.normal == [0.0; 3]));
        geometry.fill_missing_normals();
        for v in &geometry.vertices {
            assert!((v.normal[1] - 1.0).abs() < 1e-6, "{:?}", v.normal);
        }
    }

    #[tokio::test]
    async fn loaded_obj_without_normals_is_lit() {
        let obj = b"v 0 0 0\nv 1 0 0\nv 0 0 1\nf 1 3 2\n";
        let root = asset_root("no-normals", &[("tri.obj", obj)]);
        let asset = load_mesh(&root, Path::new("tri.obj"), false).await.unwrap();
        assert!(asset.geometry.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }

    #[tokio::test]
    async fn gltf_indices_past_the_vertices_are_rejected() {
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]] {
            bin.extend_from_slice(bytemuck::cast_slice(&p[..]));
        }
        bin.extend_from_slice(bytemuck::cast_slice(&[0u16, 1, 5, 0][..]));
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "uri": "bad.bin", "byteLength": {len} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0, 0, 0], "max": [1, 0, 1] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}]
}}"#,
            len = bin.len()
        );
        let root = asset_root("bad-gltf", &[("bad.gltf", json.as_bytes()), ("bad.bin", &bin)]);

        let result = load_mesh(&root, Path::new("bad.gltf"), false).await;
        assert!(matches!(result, Err(SceneError::InvalidGeometry { .. })), "{result:?}");
    }
}
