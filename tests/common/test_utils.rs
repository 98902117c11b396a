use std::{cell::RefCell, collections::HashMap, ops::Range, rc::Rc};

use cgmath::{Deg, Matrix4};
use scene_ngin::{
    camera::perspective_lh,
    config::ModelSpec,
    data_structures::{
        model::{Geometry, TextureImage},
        terrain::Heightmap,
    },
    error::{Result, SceneError},
    gpu::{
        BindingsDesc, BlendMode, BufferDesc, BufferKind, Device, ProgramDesc, RenderTarget,
        TextureDesc, TextureKind,
    },
    resources::{ModelAsset, SceneAssets},
};

/// A draw as the mock render target saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub geometry: String,
    pub program: String,
    pub blend: BlendMode,
    pub constant_offsets: Vec<u32>,
    pub indices: Range<u32>,
}

#[derive(Debug, Default)]
pub struct Ledger {
    next_id: u64,
    labels: HashMap<u64, String>,
    releases: HashMap<u64, u32>,
    writes: Vec<(String, u64, Vec<u8>)>,
    draws: Vec<DrawCall>,
    frames: u32,
}

impl Ledger {
    fn acquire(&mut self, label: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.labels.insert(id, label.to_string());
        id
    }

    pub fn created(&self) -> usize {
        self.labels.len()
    }

    pub fn live(&self) -> usize {
        self.labels
            .keys()
            .filter(|id| self.releases.get(id).copied().unwrap_or(0) == 0)
            .count()
    }

    /// Every handle ever created was released, and none twice.
    pub fn all_released_once(&self) -> bool {
        self.labels
            .keys()
            .all(|id| self.releases.get(id).copied() == Some(1))
    }

    pub fn first_label(&self) -> Option<&str> {
        self.labels.get(&0).map(String::as_str)
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// The bytes last written to the buffer labelled `label` at `offset`.
    pub fn last_write(&self, label: &str, offset: u64) -> Option<&[u8]> {
        self.writes
            .iter()
            .rev()
            .find(|(l, o, _)| l == label && *o == offset)
            .map(|(_, _, data)| data.as_slice())
    }
}

pub type SharedLedger = Rc<RefCell<Ledger>>;

#[derive(Debug)]
pub struct Handle {
    id: u64,
    label: String,
    ledger: SharedLedger,
}

impl Handle {
    fn new(ledger: &SharedLedger, label: &str) -> Self {
        let id = ledger.borrow_mut().acquire(label);
        Self {
            id,
            label: label.to_string(),
            ledger: ledger.clone(),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        *self.ledger.borrow_mut().releases.entry(self.id).or_default() += 1;
    }
}

#[derive(Debug)]
pub struct MockBuffer {
    pub handle: Handle,
    pub kind: BufferKind,
    pub size: u64,
}

#[derive(Debug)]
pub struct MockTexture {
    pub handle: Handle,
    pub kind: TextureKind,
}

#[derive(Debug)]
pub struct MockProgram {
    pub handle: Handle,
    pub blend: BlendMode,
}

#[derive(Debug)]
pub struct MockBindings {
    pub handle: Handle,
}

/// Records every resource and draw instead of touching a GPU.
pub struct MockDevice {
    ledger: SharedLedger,
    failing_program: Option<String>,
    projection: Matrix4<f32>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            ledger: SharedLedger::default(),
            failing_program: None,
            projection: perspective_lh(Deg(45.0).into(), 16.0 / 9.0, 0.1, 1000.0),
        }
    }

    /// Programs labelled `label` fail to compile.
    pub fn failing_program(mut self, label: &str) -> Self {
        self.failing_program = Some(label.to_string());
        self
    }

    pub fn ledger(&self) -> SharedLedger {
        self.ledger.clone()
    }
}

impl Device for MockDevice {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type Program = MockProgram;
    type Bindings = MockBindings;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<MockBuffer> {
        desc.validate()?;
        Ok(MockBuffer {
            handle: Handle::new(&self.ledger, desc.label),
            kind: desc.kind,
            size: desc.size(),
        })
    }

    fn write_buffer(&self, buffer: &MockBuffer, offset: u64, data: &[u8]) {
        assert!(offset + data.len() as u64 <= buffer.size, "write past the end of {}", buffer.handle.label);
        self.ledger
            .borrow_mut()
            .writes
            .push((buffer.handle.label.clone(), offset, data.to_vec()));
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<MockTexture> {
        desc.validate()?;
        Ok(MockTexture {
            handle: Handle::new(&self.ledger, desc.label),
            kind: desc.kind,
        })
    }

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<MockProgram> {
        if self.failing_program.as_deref() == Some(desc.label) {
            return Err(SceneError::ShaderCompile {
                label: desc.label.to_string(),
                message: "syntax error".to_string(),
            });
        }
        Ok(MockProgram {
            handle: Handle::new(&self.ledger, desc.label),
            blend: desc.blend,
        })
    }

    fn create_bindings(
        &self,
        label: &str,
        _program: &MockProgram,
        desc: &BindingsDesc<'_, Self>,
    ) -> Result<MockBindings> {
        if let BindingsDesc::Textures { cubemap, .. } = desc {
            assert_eq!(cubemap.kind, TextureKind::Cube, "{label} binds a non-cube environment");
        }
        Ok(MockBindings {
            handle: Handle::new(&self.ledger, label),
        })
    }

    fn constant_alignment(&self) -> u64 {
        256
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection
    }

    fn render_frame(
        &self,
        _clear: wgpu::Color,
        draw: &mut dyn FnMut(&mut dyn RenderTarget<Self>) -> Result<()>,
    ) -> Result<()> {
        let mut target = MockTarget {
            ledger: self.ledger.clone(),
            geometry: None,
            program: None,
            offsets: Vec::new(),
        };
        draw(&mut target)?;
        self.ledger.borrow_mut().frames += 1;
        Ok(())
    }
}

struct MockTarget {
    ledger: SharedLedger,
    geometry: Option<String>,
    program: Option<(String, BlendMode)>,
    offsets: Vec<u32>,
}

impl RenderTarget<MockDevice> for MockTarget {
    fn set_program(&mut self, program: &MockProgram) {
        self.program = Some((program.handle.label.clone(), program.blend));
    }

    fn set_geometry(&mut self, vertices: &MockBuffer, indices: &MockBuffer) {
        assert_eq!(vertices.kind, BufferKind::Vertex);
        assert_eq!(indices.kind, BufferKind::Index);
        self.geometry = Some(vertices.handle.label.clone());
    }

    fn set_bindings(&mut self, group: u32, _bindings: &MockBindings, offsets: &[u32]) {
        if group == scene_ngin::gpu::CONSTANTS_GROUP {
            self.offsets = offsets.to_vec();
        }
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        let geometry = self.geometry.clone().expect("draw without geometry");
        let (program, blend) = self.program.clone().expect("draw without program");
        self.ledger.borrow_mut().draws.push(DrawCall {
            geometry,
            program,
            blend,
            constant_offsets: self.offsets.clone(),
            indices,
        });
    }
}

pub const DEFAULT_SHADER: &str = "fn vs_main() {}\nfn fs_main() {}\n";
pub const SKYBOX_SHADER: &str = "fn vs_main() {}\nfn fs_main() {}\n";

/// In-memory assets for a small scene: a flat 4x4 terrain, a sphere skybox
/// and the given models.
pub fn assets(models: Vec<ModelAsset>) -> SceneAssets {
    SceneAssets {
        default_shader: DEFAULT_SHADER.to_string(),
        skybox_shader: SKYBOX_SHADER.to_string(),
        skybox_geometry: Geometry::sky_sphere(4, 8),
        cubemap: TextureImage {
            label: "sky".to_string(),
            width: 1,
            height: 6,
            rgba: [40u8, 80, 200, 255].repeat(6),
        },
        heightmap: Heightmap::flat(4, 4, 0.0).expect("flat heightmap"),
        terrain_diffuse: Some(TextureImage::solid("grass", [0, 200, 0, 255])),
        terrain_normal_map: None,
        models,
    }
}

pub fn quad_asset(spec: ModelSpec) -> ModelAsset {
    ModelAsset {
        spec,
        geometry: Geometry::quad(),
        diffuse: None,
        normal_map: None,
    }
}

pub fn assert_matrix_close(a: [[f32; 4]; 4], b: [[f32; 4]; 4]) {
    for (x, y) in a.iter().flatten().zip(b.iter().flatten()) {
        assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
    }
}
