//! Shader programs and their constant buffers.
//!
//! A [`Shader`] owns a compiled program (plus an alpha-blended variant for the
//! default kind), four constant buffers and the placeholder textures bound
//! when a model lacks its own. Object and material constants change per draw,
//! so their buffers hold one aligned slot per draw and every draw binds its
//! slot through dynamic offsets. Camera and light constants are written once
//! per frame in [`Shader::begin_frame`].

use bytemuck::Zeroable;
use cgmath::{Matrix4, Point3, SquareMatrix};

use crate::{
    camera::Camera,
    data_structures::model::{Model, SurfaceMaterial, TextureImage},
    error::{Result, SceneError},
    gpu::{
        BindingsDesc, BlendMode, BufferDesc, BufferKind, CONSTANTS_GROUP, Device, ProgramDesc,
        RenderTarget, SamplerKind, TEXTURES_GROUP, TextureDesc, TextureKind, VertexLayout,
        align_to,
    },
    light::Light,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectConstants {
    pub world_view_proj: [[f32; 4]; 4],
    pub world: [[f32; 4]; 4],
    pub inverse_world: [[f32; 4]; 4],
}

impl ObjectConstants {
    pub fn new(world: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let inverse = world.invert().unwrap_or_else(Matrix4::identity);
        Self {
            world_view_proj: (projection * view * world).into(),
            world: world.into(),
            inverse_world: inverse.into(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraConstants {
    pub position: [f32; 3],
    _padding: f32,
}

impl CameraConstants {
    pub fn new(position: Point3<f32>) -> Self {
        Self {
            position: position.into(),
            _padding: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightConstants {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub position: [f32; 3],
    pub range: f32,
    pub attenuation: [f32; 3],
    _padding: f32,
}

impl From<&Light> for LightConstants {
    fn from(light: &Light) -> Self {
        Self {
            ambient: light.ambient,
            diffuse: light.diffuse,
            specular: light.specular,
            position: light.position.into(),
            range: light.range,
            attenuation: light.attenuation.into(),
            _padding: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialConstants {
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    pub specular: [f32; 4],
    pub has_texture: u32,
    pub is_terrain: u32,
    pub has_normal_map: u32,
    pub has_reflection: u32,
    pub shininess: f32,
    pub is_transparent: u32,
    _padding: [u32; 2],
}

impl MaterialConstants {
    /// `reflections` gates the material's reflection flag on whether an
    /// environment cubemap takes part in this draw.
    pub fn new(material: &SurfaceMaterial, reflections: bool) -> Self {
        Self {
            diffuse: material.diffuse,
            ambient: material.ambient,
            specular: material.specular,
            has_texture: material.has_texture as u32,
            is_terrain: material.is_terrain as u32,
            has_normal_map: material.has_normal_map as u32,
            has_reflection: (material.has_reflection && reflections) as u32,
            shininess: material.shininess,
            is_transparent: material.is_transparent as u32,
            _padding: [0; 2],
        }
    }
}

pub const OBJECT_CONSTANTS_SIZE: u64 = std::mem::size_of::<ObjectConstants>() as u64;
pub const CAMERA_CONSTANTS_SIZE: u64 = std::mem::size_of::<CameraConstants>() as u64;
pub const LIGHT_CONSTANTS_SIZE: u64 = std::mem::size_of::<LightConstants>() as u64;
pub const MATERIAL_CONSTANTS_SIZE: u64 = std::mem::size_of::<MaterialConstants>() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    /// Lit, textured models with the full vertex layout.
    Default,
    /// Position-only vertices sampling the cubemap the shader owns.
    Skybox,
}

impl ShaderKind {
    fn vertex_layout(self) -> VertexLayout {
        match self {
            ShaderKind::Default => VertexLayout::Full,
            ShaderKind::Skybox => VertexLayout::PositionOnly,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShaderDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
}

impl<'a> ShaderDesc<'a> {
    pub fn new(label: &'a str, source: &'a str) -> Self {
        Self {
            label,
            source,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
        }
    }
}

pub struct Shader<D: Device> {
    label: String,
    kind: ShaderKind,
    constants: D::Bindings,
    blended: Option<D::Program>,
    program: D::Program,
    object_buffer: D::Buffer,
    camera_buffer: D::Buffer,
    light_buffer: D::Buffer,
    material_buffer: D::Buffer,
    white: D::Texture,
    flat_normal: D::Texture,
    cubemap: D::Texture,
    object_stride: u64,
    material_stride: u64,
    capacity: u32,
    cursor: u32,
    blending: bool,
    last_object: ObjectConstants,
    last_camera: CameraConstants,
    last_light: LightConstants,
    last_material: MaterialConstants,
}

impl<D: Device> Shader<D> {
    /// Compiles the default program and its blended variant.
    pub fn initialize(device: &D, desc: &ShaderDesc<'_>, max_draws: u32) -> Result<Self> {
        let black = [0u8, 0, 0, 255].repeat(6);
        let placeholder = TextureDesc {
            label: "placeholder cubemap",
            kind: TextureKind::Cube,
            width: 1,
            height: 1,
            rgba: &black,
        };
        Self::build(device, desc, ShaderKind::Default, &placeholder, max_draws)
    }

    /// Compiles the skybox program and uploads its cubemap, six faces stacked
    /// vertically in `cubemap`.
    pub fn initialize_skybox(
        device: &D,
        desc: &ShaderDesc<'_>,
        cubemap: &TextureImage,
        max_draws: u32,
    ) -> Result<Self> {
        Self::build(device, desc, ShaderKind::Skybox, &cubemap.desc(TextureKind::Cube), max_draws)
    }

    fn build(
        device: &D,
        desc: &ShaderDesc<'_>,
        kind: ShaderKind,
        cubemap: &TextureDesc<'_>,
        max_draws: u32,
    ) -> Result<Self> {
        let max_draws = max_draws.max(1);
        let program_desc = ProgramDesc {
            label: desc.label,
            source: desc.source,
            vertex_entry: desc.vertex_entry,
            fragment_entry: desc.fragment_entry,
            layout: kind.vertex_layout(),
            blend: BlendMode::Opaque,
            cull_back_faces: kind == ShaderKind::Default,
        };
        let program = device.create_program(&program_desc).inspect_err(|e| {
            log::error!("Shader {} could not be built: {e}", desc.label);
        })?;
        let blended = match kind {
            ShaderKind::Default => Some(device.create_program(&ProgramDesc {
                blend: BlendMode::Alpha,
                ..program_desc
            })?),
            ShaderKind::Skybox => None,
        };

        let alignment = device.constant_alignment();
        let object_stride = align_to(OBJECT_CONSTANTS_SIZE, alignment);
        let material_stride = align_to(MATERIAL_CONSTANTS_SIZE, alignment);
        let last_camera = CameraConstants::new(Point3::new(0.0, 0.0, 0.0));
        let last_light = LightConstants::from(&Light::default());

        let object_buffer = device.create_buffer(&BufferDesc::zeroed(
            &format!("{} object constants", desc.label),
            BufferKind::Constant,
            object_stride * max_draws as u64,
        ))?;
        let camera_buffer = device.create_buffer(&BufferDesc::init(
            &format!("{} camera constants", desc.label),
            BufferKind::Constant,
            bytemuck::bytes_of(&last_camera),
        ))?;
        let light_buffer = device.create_buffer(&BufferDesc::init(
            &format!("{} light constants", desc.label),
            BufferKind::Constant,
            bytemuck::bytes_of(&last_light),
        ))?;
        let material_buffer = device.create_buffer(&BufferDesc::zeroed(
            &format!("{} material constants", desc.label),
            BufferKind::Constant,
            material_stride * max_draws as u64,
        ))?;

        let white = device.create_texture(&TextureDesc {
            label: "placeholder diffuse",
            kind: TextureKind::Colour,
            width: 1,
            height: 1,
            rgba: &[255, 255, 255, 255],
        })?;
        // neutral tangent-space normal
        let flat_normal = device.create_texture(&TextureDesc {
            label: "placeholder normal map",
            kind: TextureKind::Linear,
            width: 1,
            height: 1,
            rgba: &[127, 127, 255, 255],
        })?;
        let cubemap = device.create_texture(cubemap)?;

        let constants = device.create_bindings(
            &format!("{} constants", desc.label),
            &program,
            &BindingsDesc::Constants {
                object: &object_buffer,
                object_size: OBJECT_CONSTANTS_SIZE,
                camera: &camera_buffer,
                light: &light_buffer,
                material: &material_buffer,
                material_size: MATERIAL_CONSTANTS_SIZE,
            },
        )?;
        log::info!("Shader {} ready with {max_draws} draw slots", desc.label);

        Ok(Self {
            label: desc.label.to_string(),
            kind,
            constants,
            blended,
            program,
            object_buffer,
            camera_buffer,
            light_buffer,
            material_buffer,
            white,
            flat_normal,
            cubemap,
            object_stride,
            material_stride,
            capacity: max_draws,
            cursor: 0,
            blending: false,
            last_object: ObjectConstants::zeroed(),
            last_camera,
            last_light,
            last_material: MaterialConstants::zeroed(),
        })
    }

    /// Builds `model`'s texture bindings. Textures the materials do not ask
    /// for, or that the model lacks, are replaced by placeholders. `environment`
    /// is the cubemap reflections sample when the model brings none.
    pub fn bind_model(&self, device: &D, model: &mut Model<D>, environment: Option<&D::Texture>) -> Result<()> {
        let materials = model.materials();
        let wants_texture = materials.iter().any(|m| m.has_texture);
        let wants_normal_map = materials.iter().any(|m| m.has_normal_map);
        let sampler = if materials.iter().any(|m| m.is_terrain) {
            SamplerKind::Anisotropic
        } else {
            SamplerKind::Linear
        };

        let diffuse = model.diffuse().filter(|_| wants_texture).unwrap_or(&self.white);
        let normal_map = model
            .normal_map()
            .filter(|_| wants_normal_map)
            .unwrap_or(&self.flat_normal);
        let cubemap = model.cubemap().or(environment).unwrap_or(&self.cubemap);

        let bindings = device.create_bindings(
            &format!("{} textures", model.name()),
            &self.program,
            &BindingsDesc::Textures {
                diffuse,
                cubemap,
                normal_map,
                sampler,
            },
        )?;
        model.set_bindings(bindings);
        Ok(())
    }

    /// Resets the draw slots and uploads the per-frame constants.
    pub fn begin_frame(&mut self, device: &D, camera: &Camera, light: &Light) {
        self.cursor = 0;
        self.last_camera = CameraConstants::new(camera.position());
        self.last_light = LightConstants::from(light);
        device.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&self.last_camera));
        device.write_buffer(&self.light_buffer, 0, bytemuck::bytes_of(&self.last_light));
    }

    pub fn enable_alpha_blending(&mut self) {
        self.blending = true;
    }

    pub fn disable_alpha_blending(&mut self) {
        self.blending = false;
    }

    pub fn render(
        &mut self,
        device: &D,
        target: &mut dyn RenderTarget<D>,
        model: &Model<D>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) -> Result<()> {
        self.draw(device, target, model, view, projection, false)
    }

    /// Like [`Shader::render`], with reflections of the bound cubemap enabled
    /// for materials that ask for them.
    pub fn render_with_cubemap(
        &mut self,
        device: &D,
        target: &mut dyn RenderTarget<D>,
        model: &Model<D>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) -> Result<()> {
        self.draw(device, target, model, view, projection, true)
    }

    fn draw(
        &mut self,
        device: &D,
        target: &mut dyn RenderTarget<D>,
        model: &Model<D>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        reflections: bool,
    ) -> Result<()> {
        let bindings = model.bindings().ok_or_else(|| SceneError::Unprepared {
            label: model.name().to_string(),
        })?;
        let needed = model.subsets().len() as u32;
        if self.cursor + needed > self.capacity {
            return Err(SceneError::DrawBudget {
                label: self.label.clone(),
                capacity: self.capacity,
            });
        }

        let object = ObjectConstants::new(model.world(), view, projection);
        self.last_object = object;

        model.render(target);
        target.set_program(match (&self.blended, self.blending) {
            (Some(blended), true) => blended,
            _ => &self.program,
        });
        target.set_bindings(TEXTURES_GROUP, bindings, &[]);

        for subset in model.subsets() {
            let material = MaterialConstants::new(model.material_for(subset), reflections);
            let object_offset = self.cursor as u64 * self.object_stride;
            let material_offset = self.cursor as u64 * self.material_stride;
            self.cursor += 1;

            device.write_buffer(&self.object_buffer, object_offset, bytemuck::bytes_of(&object));
            device.write_buffer(&self.material_buffer, material_offset, bytemuck::bytes_of(&material));
            self.last_material = material;

            target.set_bindings(
                CONSTANTS_GROUP,
                &self.constants,
                &[object_offset as u32, material_offset as u32],
            );
            target.draw_indexed(subset.start..subset.start + subset.count);
        }
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    /// The cubemap bound when a model brings none of its own.
    pub fn environment(&self) -> &D::Texture {
        &self.cubemap
    }

    pub fn is_blending(&self) -> bool {
        self.blending
    }

    /// Draw slots used since the last [`Shader::begin_frame`].
    pub fn draws_this_frame(&self) -> u32 {
        self.cursor
    }

    pub fn last_object(&self) -> &ObjectConstants {
        &self.last_object
    }

    pub fn last_camera(&self) -> &CameraConstants {
        &self.last_camera
    }

    pub fn last_light(&self) -> &LightConstants {
        &self.last_light
    }

    pub fn last_material(&self) -> &MaterialConstants {
        &self.last_material
    }
}
