//! Meshes, materials and GPU models.
//!
//! [`Geometry`] is the CPU-side mesh (vertices, indices, subsets) produced by
//! the builders here or by the loaders in [`crate::resources`]. A [`Model`]
//! uploads it once and keeps the buffers, textures and world transform that a
//! [`Shader`](crate::shader::Shader) needs to draw it.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector2, Vector3};

use crate::{
    error::{Result, SceneError},
    gpu::{BufferDesc, BufferKind, Device, RenderTarget, TextureDesc, TextureKind},
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl ModelVertex {
    pub fn new(position: [f32; 3], tex_coords: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            tex_coords,
            normal,
            tangent: [0.0; 3],
        }
    }
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x2,
            2 => Float32x3,
            3 => Float32x3,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Surface parameters for one subset of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    pub name: String,
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    pub specular: [f32; 4],
    pub reflection: [f32; 4],
    pub shininess: f32,
    pub has_texture: bool,
    pub has_reflection: bool,
    pub has_normal_map: bool,
    pub is_terrain: bool,
    pub is_transparent: bool,
    pub texture_array_index: usize,
    pub normal_map_array_index: usize,
    pub translation: [f32; 4],
}

impl SurfaceMaterial {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn terrain() -> Self {
        Self {
            is_terrain: true,
            ..Self::named("terrain")
        }
    }
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            diffuse: [1.0, 1.0, 1.0, 1.0],
            ambient: [0.2, 0.2, 0.2, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            reflection: [0.0, 0.0, 0.0, 0.0],
            shininess: 1.0,
            has_texture: false,
            has_reflection: false,
            has_normal_map: false,
            is_terrain: false,
            is_transparent: false,
            texture_array_index: 0,
            normal_map_array_index: 0,
            translation: [0.0; 4],
        }
    }
}

/// A contiguous index range drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subset {
    pub start: u32,
    pub count: u32,
    pub material: usize,
}

/// CPU-side triangle list.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub subsets: Vec<Subset>,
    pub materials: Vec<SurfaceMaterial>,
}

impl Geometry {
    /// One material over all indices.
    pub fn single(vertices: Vec<ModelVertex>, indices: Vec<u32>) -> Self {
        let count = indices.len() as u32;
        Self {
            vertices,
            indices,
            subsets: vec![Subset {
                start: 0,
                count,
                material: 0,
            }],
            materials: vec![SurfaceMaterial::default()],
        }
    }

    /// Unit quad on the plane `y = 1`, facing up.
    pub fn quad() -> Self {
        let up = [0.0, 1.0, 0.0];
        let vertices = vec![
            ModelVertex::new([-1.0, 1.0, -1.0], [0.0, 1.0], up),
            ModelVertex::new([-1.0, 1.0, 1.0], [0.0, 0.0], up),
            ModelVertex::new([1.0, 1.0, 1.0], [1.0, 0.0], up),
            ModelVertex::new([1.0, 1.0, -1.0], [1.0, 1.0], up),
        ];
        let mut geometry = Self::single(vertices, vec![0, 1, 2, 0, 2, 3]);
        geometry.compute_tangents();
        geometry
    }

    /// Unit sphere seen from the inside, used as the skybox hull.
    pub fn sky_sphere(latitudes: u32, longitudes: u32) -> Self {
        let latitudes = latitudes.max(3);
        let longitudes = longitudes.max(3);
        let mut vertices = Vec::with_capacity(((latitudes + 1) * (longitudes + 1)) as usize);
        for lat in 0..=latitudes {
            let theta = PI * lat as f32 / latitudes as f32;
            let (sin_t, cos_t) = theta.sin_cos();
            for lon in 0..=longitudes {
                let phi = 2.0 * PI * lon as f32 / longitudes as f32;
                let (sin_p, cos_p) = phi.sin_cos();
                let p = [sin_t * cos_p, cos_t, sin_t * sin_p];
                vertices.push(ModelVertex::new(
                    p,
                    [lon as f32 / longitudes as f32, lat as f32 / latitudes as f32],
                    [-p[0], -p[1], -p[2]],
                ));
            }
        }
        let row = longitudes + 1;
        let mut indices = Vec::with_capacity((latitudes * longitudes * 6) as usize);
        for lat in 0..latitudes {
            for lon in 0..longitudes {
                let a = lat * row + lon;
                let b = a + row;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        Self::single(vertices, indices)
    }

    pub fn validate(&self, label: &str) -> Result<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(SceneError::geometry(label, "no vertices or indices"));
        }
        if self.indices.len() % 3 != 0 {
            return Err(SceneError::geometry(label, "index count is not a multiple of three"));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(i) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(SceneError::geometry(
                label,
                format!("index {i} out of range for {vertex_count} vertices"),
            ));
        }
        let index_count = self.indices.len() as u32;
        if self.subsets.iter().any(|s| s.start + s.count > index_count) {
            return Err(SceneError::geometry(label, "subset exceeds the index buffer"));
        }
        if self.subsets.iter().any(|s| s.material >= self.materials.len()) {
            return Err(SceneError::geometry(label, "subset names a missing material"));
        }
        Ok(())
    }

    /// Mirrors z and reverses the winding so right-handed assets render the
    /// right way round in the left-handed scene.
    pub fn to_left_handed(&mut self) {
        for v in &mut self.vertices {
            v.position[2] = -v.position[2];
            v.normal[2] = -v.normal[2];
            v.tangent[2] = -v.tangent[2];
        }
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    /// Smoothed face normals for every vertex without one. Vertices that touch
    /// no triangle point up. Indices must already be validated.
    pub fn fill_missing_normals(&mut self) {
        let missing: Vec<bool> = self
            .vertices
            .iter()
            .map(|v| Vector3::from(v.normal).magnitude2() <= f32::EPSILON)
            .collect();
        if !missing.contains(&true) {
            return;
        }

        let vertices = &mut self.vertices;
        let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let p = |i: u32| Vector3::from(vertices[i as usize].position);
            let n = (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]));
            for &i in tri {
                sums[i as usize] += n;
            }
        }
        for ((v, n), missing) in vertices.iter_mut().zip(sums).zip(missing) {
            if !missing {
                continue;
            }
            v.normal = if n.magnitude2() > f32::EPSILON {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            };
        }
    }

    /// Per-vertex tangents averaged over the adjacent triangles.
    pub fn compute_tangents(&mut self) {
        let vertices = &mut self.vertices;
        let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
        let mut triangles_included = vec![0u32; vertices.len()];

        for c in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
            let pos0: Vector3<f32> = vertices[i0].position.into();
            let pos1: Vector3<f32> = vertices[i1].position.into();
            let pos2: Vector3<f32> = vertices[i2].position.into();
            let uv0: Vector2<f32> = vertices[i0].tex_coords.into();
            let uv1: Vector2<f32> = vertices[i1].tex_coords.into();
            let uv2: Vector2<f32> = vertices[i2].tex_coords.into();

            let delta_pos1 = pos1 - pos0;
            let delta_pos2 = pos2 - pos0;
            let delta_uv1 = uv1 - uv0;
            let delta_uv2 = uv2 - uv0;

            // delta_pos = delta_uv.x * T + delta_uv.y * B, solved for T
            let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) / det;
            for i in [i0, i1, i2] {
                sums[i] += tangent;
                triangles_included[i] += 1;
            }
        }

        for (i, v) in vertices.iter_mut().enumerate() {
            if triangles_included[i] == 0 {
                continue;
            }
            let t = sums[i] / triangles_included[i] as f32;
            if t.magnitude2() > f32::EPSILON {
                v.tangent = t.normalize().into();
            }
        }
    }
}

/// Decoded RGBA8 image data, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn solid(label: &str, rgba: [u8; 4]) -> Self {
        Self {
            label: label.to_string(),
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }

    pub fn desc(&self, kind: TextureKind) -> TextureDesc<'_> {
        let height = if kind == TextureKind::Cube {
            self.height / 6
        } else {
            self.height
        };
        TextureDesc {
            label: &self.label,
            kind,
            width: self.width,
            height,
            rgba: &self.rgba,
        }
    }
}

/// GPU-resident mesh with its materials, textures and world transform.
pub struct Model<D: Device> {
    name: String,
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    vertex_count: u32,
    index_count: u32,
    subsets: Vec<Subset>,
    materials: Vec<SurfaceMaterial>,
    diffuse: Option<D::Texture>,
    normal_map: Option<D::Texture>,
    cubemap: Option<D::Texture>,
    bindings: Option<D::Bindings>,
    world: Matrix4<f32>,
}

impl<D: Device> Model<D> {
    /// Uploads `geometry` once. Empty or inconsistent geometry is rejected.
    pub fn from_geometry(device: &D, name: &str, geometry: &Geometry) -> Result<Self> {
        geometry.validate(name)?;
        let vertex_buffer = device.create_buffer(&BufferDesc::init(
            &format!("{name} vertex buffer"),
            BufferKind::Vertex,
            bytemuck::cast_slice(&geometry.vertices),
        ))?;
        let index_buffer = device.create_buffer(&BufferDesc::init(
            &format!("{name} index buffer"),
            BufferKind::Index,
            bytemuck::cast_slice(&geometry.indices),
        ))?;

        let index_count = geometry.indices.len() as u32;
        let subsets = if geometry.subsets.is_empty() {
            vec![Subset {
                start: 0,
                count: index_count,
                material: 0,
            }]
        } else {
            geometry.subsets.clone()
        };
        let materials = if geometry.materials.is_empty() {
            vec![SurfaceMaterial::named(name)]
        } else {
            geometry.materials.clone()
        };
        log::debug!(
            "Uploaded model {name}: {} vertices, {index_count} indices, {} subsets",
            geometry.vertices.len(),
            subsets.len()
        );

        Ok(Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            vertex_count: geometry.vertices.len() as u32,
            index_count,
            subsets,
            materials,
            diffuse: None,
            normal_map: None,
            cubemap: None,
            bindings: None,
            world: Matrix4::identity(),
        })
    }

    pub fn quad(device: &D, name: &str) -> Result<Self> {
        Self::from_geometry(device, name, &Geometry::quad())
    }

    pub fn load_texture(&mut self, device: &D, image: &TextureImage) -> Result<()> {
        self.diffuse = Some(device.create_texture(&image.desc(TextureKind::Colour))?);
        self.materials.iter_mut().for_each(|m| m.has_texture = true);
        self.bindings = None;
        Ok(())
    }

    pub fn load_normal_map(&mut self, device: &D, image: &TextureImage) -> Result<()> {
        self.normal_map = Some(device.create_texture(&image.desc(TextureKind::Linear))?);
        self.materials.iter_mut().for_each(|m| m.has_normal_map = true);
        self.bindings = None;
        Ok(())
    }

    /// `image` holds the six faces stacked vertically.
    pub fn set_cubemap_texture(&mut self, device: &D, image: &TextureImage) -> Result<()> {
        self.cubemap = Some(device.create_texture(&image.desc(TextureKind::Cube))?);
        self.bindings = None;
        Ok(())
    }

    /// Binds vertex and index buffers. Drawing is issued by the shader.
    pub fn render(&self, target: &mut dyn RenderTarget<D>) {
        target.set_geometry(&self.vertex_buffer, &self.index_buffer);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn subsets(&self) -> &[Subset] {
        &self.subsets
    }

    pub fn materials(&self) -> &[SurfaceMaterial] {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut [SurfaceMaterial] {
        &mut self.materials
    }

    /// The material of `subset`. Uploaded geometry is validated, so every
    /// subset names an existing material.
    pub fn material_for(&self, subset: &Subset) -> &SurfaceMaterial {
        &self.materials[subset.material]
    }

    pub fn is_transparent(&self) -> bool {
        self.materials.iter().any(|m| m.is_transparent)
    }

    pub fn diffuse(&self) -> Option<&D::Texture> {
        self.diffuse.as_ref()
    }

    pub fn normal_map(&self) -> Option<&D::Texture> {
        self.normal_map.as_ref()
    }

    pub fn cubemap(&self) -> Option<&D::Texture> {
        self.cubemap.as_ref()
    }

    pub fn bindings(&self) -> Option<&D::Bindings> {
        self.bindings.as_ref()
    }

    pub(crate) fn set_bindings(&mut self, bindings: D::Bindings) {
        self.bindings = Some(bindings);
    }

    pub fn world(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn set_world(&mut self, world: Matrix4<f32>) {
        self.world = world;
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.world.w.truncate()
    }
}
