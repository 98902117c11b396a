//! The graphics device seam.
//!
//! Scene components never talk to wgpu directly. They create resources and
//! record draws through [`Device`] and [`RenderTarget`], which
//! [`Context`](crate::context::Context) implements on top of wgpu. Every
//! resource handle is an owned value that releases its GPU object on drop.
//!
//! Bindings follow one fixed layout shared by every program:
//!
//! - group 0: object constants (dynamic offset), camera constants, light
//!   constants, material constants (dynamic offset)
//! - group 1: diffuse texture, cubemap, normal map, sampler

use std::ops::Range;

use cgmath::Matrix4;

use crate::error::{Result, SceneError};

pub const CONSTANTS_GROUP: u32 = 0;
pub const TEXTURES_GROUP: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
}

#[derive(Debug, Clone, Copy)]
pub enum BufferContents<'a> {
    Init(&'a [u8]),
    Zeroed(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub contents: BufferContents<'a>,
}

impl<'a> BufferDesc<'a> {
    pub fn init(label: &'a str, kind: BufferKind, data: &'a [u8]) -> Self {
        Self {
            label,
            kind,
            contents: BufferContents::Init(data),
        }
    }

    pub fn zeroed(label: &'a str, kind: BufferKind, size: u64) -> Self {
        Self {
            label,
            kind,
            contents: BufferContents::Zeroed(size),
        }
    }

    pub fn size(&self) -> u64 {
        match self.contents {
            BufferContents::Init(data) => data.len() as u64,
            BufferContents::Zeroed(size) => size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size() == 0 {
            return Err(SceneError::creation(self.label, "buffer has zero size"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// sRGB colour data.
    Colour,
    /// Linear data such as normal maps.
    Linear,
    /// Six sRGB faces in `+X, -X, +Y, -Y, +Z, -Z` order.
    Cube,
}

impl TextureKind {
    pub fn layers(self) -> u32 {
        match self {
            TextureKind::Cube => 6,
            _ => 1,
        }
    }
}

/// RGBA8 texels for a 2D texture or all faces of a cube, face after face.
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
}

impl TextureDesc<'_> {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::creation(self.label, "texture has no texels"));
        }
        if self.kind == TextureKind::Cube && self.width != self.height {
            return Err(SceneError::creation(self.label, "cube faces must be square"));
        }
        let expected = self.width as usize * self.height as usize * 4 * self.kind.layers() as usize;
        if self.rgba.len() != expected {
            return Err(SceneError::creation(
                self.label,
                format!("expected {expected} bytes of RGBA data, got {}", self.rgba.len()),
            ));
        }
        Ok(())
    }
}

/// Vertex attributes a program reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// Position, texture coordinate, normal and tangent.
    Full,
    /// Position only, with the stride of the full vertex.
    PositionOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    Alpha,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub layout: VertexLayout,
    pub blend: BlendMode,
    pub cull_back_faces: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    /// Trilinear filtering.
    Linear,
    Anisotropic,
}

/// Resources for one bind group.
pub enum BindingsDesc<'a, D: Device + ?Sized> {
    Constants {
        object: &'a D::Buffer,
        object_size: u64,
        camera: &'a D::Buffer,
        light: &'a D::Buffer,
        material: &'a D::Buffer,
        material_size: u64,
    },
    Textures {
        diffuse: &'a D::Texture,
        cubemap: &'a D::Texture,
        normal_map: &'a D::Texture,
        sampler: SamplerKind,
    },
}

/// A graphics device that owns the swapchain and creates GPU resources.
pub trait Device {
    type Buffer;
    type Texture;
    type Program;
    type Bindings;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<Self::Buffer>;
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);
    fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<Self::Texture>;
    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<Self::Program>;
    fn create_bindings(
        &self,
        label: &str,
        program: &Self::Program,
        desc: &BindingsDesc<'_, Self>,
    ) -> Result<Self::Bindings>;

    /// Required alignment of dynamic constant buffer offsets.
    fn constant_alignment(&self) -> u64;

    fn projection_matrix(&self) -> Matrix4<f32>;

    /// Clears the back buffer and depth, hands a target to `draw`, then presents.
    fn render_frame(
        &self,
        clear: wgpu::Color,
        draw: &mut dyn FnMut(&mut dyn RenderTarget<Self>) -> Result<()>,
    ) -> Result<()>;
}

/// Records draw commands into the current frame.
pub trait RenderTarget<D: Device + ?Sized> {
    fn set_program(&mut self, program: &D::Program);
    fn set_geometry(&mut self, vertices: &D::Buffer, indices: &D::Buffer);
    fn set_bindings(&mut self, group: u32, bindings: &D::Bindings, offsets: &[u32]);
    fn draw_indexed(&mut self, indices: Range<u32>);
}

/// Rounds `size` up to the next multiple of `alignment`.
pub fn align_to(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    size.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up() {
        assert_eq!(align_to(192, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(80, 0), 80);
    }

    #[test]
    fn texture_validation_checks_size_and_shape() {
        let texel = [255u8; 4];
        let ok = TextureDesc {
            label: "white",
            kind: TextureKind::Colour,
            width: 1,
            height: 1,
            rgba: &texel,
        };
        assert!(ok.validate().is_ok());

        let cube = TextureDesc {
            kind: TextureKind::Cube,
            ..ok
        };
        assert!(cube.validate().is_err());

        let faces = [0u8; 4 * 6];
        let cube = TextureDesc { rgba: &faces, ..cube };
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn empty_buffers_are_rejected() {
        assert!(BufferDesc::init("empty", BufferKind::Vertex, &[]).validate().is_err());
        assert!(BufferDesc::zeroed("slots", BufferKind::Constant, 256).validate().is_ok());
    }
}
