//! The scene: one device, camera, light, two shaders, terrain, skybox and
//! the regular models.
//!
//! A [`Scene`] is only ever observed initialised. [`Scene::initialize`]
//! either returns a complete scene or the first fatal error, and
//! [`Scene::shutdown`] consumes it. Components are released in reverse order
//! of acquisition, the device last.

use cgmath::{EuclideanSpace, Matrix4, Point3, Rad};

use crate::{
    camera::Camera,
    config::SceneConfig,
    context::Context,
    data_structures::{model::Model, terrain::Terrain},
    error::Result,
    gpu::Device,
    light::Light,
    render::{FramePlan, Render},
    resources::{ModelAsset, SceneAssets},
    shader::{Shader, ShaderDesc},
};

/// The skybox angle wraps back to zero once it passes this.
pub const SKYBOX_ANGLE_WRAP: f32 = 6.28;

#[derive(Debug, Clone)]
struct Settings {
    clear_colour: wgpu::Color,
    ground_clearance: Option<f32>,
    skybox_scale: f32,
    skybox_spin: f32,
    skybox_angle: f32,
    skybox_follows_camera: bool,
}

// Field order is drop order.
pub struct Scene<D: Device> {
    models: Vec<Model<D>>,
    terrain: Terrain<D>,
    skybox: Model<D>,
    skybox_shader: Shader<D>,
    shader: Shader<D>,
    light: Light,
    camera: Camera,
    settings: Settings,
    device: D,
}

impl<D: Device> Scene<D> {
    pub fn initialize(device: D, config: &SceneConfig, assets: SceneAssets) -> Result<Self> {
        log::info!("Initialising scene");
        let mut camera = Camera::new(config.camera_start);
        let target = config.camera_target;
        camera.set_target_position(target.x, target.y, target.z);
        camera.update_camera();

        let light = config.light;

        let shader = Shader::initialize(
            &device,
            &ShaderDesc::new("default", &assets.default_shader),
            config.max_draws_per_frame,
        )?;

        let skybox_shader = Shader::initialize_skybox(
            &device,
            &ShaderDesc::new("skybox", &assets.skybox_shader),
            &assets.cubemap,
            config.max_draws_per_frame,
        )?;
        let mut skybox = Model::from_geometry(&device, "skybox", &assets.skybox_geometry)?;
        skybox.set_world(Matrix4::from_scale(config.skybox_scale));
        skybox_shader.bind_model(&device, &mut skybox, None)?;

        let mut terrain = Terrain::create(&device, assets.heightmap, config.cell_space)?;
        if let Some(image) = &assets.terrain_diffuse {
            terrain.model_mut().load_texture(&device, image)?;
        }
        if let Some(image) = &assets.terrain_normal_map {
            terrain.model_mut().load_normal_map(&device, image)?;
        }
        shader.bind_model(&device, terrain.model_mut(), None)?;

        let mut scene = Self {
            models: Vec::with_capacity(assets.models.len()),
            terrain,
            skybox,
            skybox_shader,
            shader,
            light,
            camera,
            settings: Settings {
                clear_colour: config.clear_colour,
                ground_clearance: config.ground_clearance,
                skybox_scale: config.skybox_scale,
                skybox_spin: config.skybox_spin,
                skybox_angle: 0.0,
                skybox_follows_camera: config.skybox_follows_camera,
            },
            device,
        };
        for asset in &assets.models {
            let model = scene.build_model(asset)?;
            scene.add_model(model)?;
        }
        log::info!("Scene ready with {} models", scene.models.len());
        Ok(scene)
    }

    /// Uploads a configured model with its textures, flags and transform.
    pub fn build_model(&self, asset: &ModelAsset) -> Result<Model<D>> {
        let spec = &asset.spec;
        let mut model = Model::from_geometry(&self.device, &spec.name, &asset.geometry)?;
        if let Some(image) = &asset.diffuse {
            model.load_texture(&self.device, image)?;
        }
        if let Some(image) = &asset.normal_map {
            model.load_normal_map(&self.device, image)?;
        }
        for material in model.materials_mut() {
            material.is_transparent |= spec.transparent;
            material.has_reflection |= spec.reflective;
        }
        model.set_world(spec.transform.to_matrix());
        Ok(model)
    }

    /// Binds `model` to the default shader and appends it to the scene.
    /// Reflective materials sample the skybox cubemap.
    pub fn add_model(&mut self, mut model: Model<D>) -> Result<()> {
        self.shader
            .bind_model(&self.device, &mut model, Some(self.skybox_shader.environment()))?;
        self.models.push(model);
        Ok(())
    }

    pub fn render_frame(&mut self, dt: f32) -> Result<()> {
        self.update(dt);
        self.render()
    }

    /// Advances the camera and the skybox by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        match self.settings.ground_clearance {
            Some(clearance) => {
                let terrain = &self.terrain;
                self.camera
                    .update_camera_grounded(|x, z| terrain.triangle_height(x, z).map(|h| h + clearance));
            }
            None => self.camera.update_camera(),
        }

        let settings = &mut self.settings;
        settings.skybox_angle += settings.skybox_spin * dt;
        if settings.skybox_angle > SKYBOX_ANGLE_WRAP {
            settings.skybox_angle = 0.0;
        }
        let centre = if settings.skybox_follows_camera {
            self.camera.position()
        } else {
            Point3::origin()
        };
        self.skybox.set_world(
            Matrix4::from_translation(centre.to_vec())
                * Matrix4::from_angle_y(Rad(settings.skybox_angle))
                * Matrix4::from_scale(settings.skybox_scale),
        );
    }

    /// Draws one frame: terrain, opaque models, skybox, then the transparent
    /// models back to front with alpha blending. Draws that fail recoverably
    /// are logged and skipped.
    pub fn render(&mut self) -> Result<()> {
        let Self {
            models,
            terrain,
            skybox,
            skybox_shader,
            shader,
            light,
            camera,
            settings,
            device,
        } = self;
        let device = &*device;

        let view = camera.view_matrix();
        let projection = device.projection_matrix();
        shader.begin_frame(device, camera, light);
        skybox_shader.begin_frame(device, camera, light);

        let mut plan = FramePlan::default();
        Render::Composed(vec![
            Render::Terrain(terrain.model()),
            Render::Composed(models.iter().map(Render::from).collect()),
            Render::Skybox(skybox),
        ])
        .set_pipelines(&mut plan);
        plan.sort_transparent(camera.position());

        device.render_frame(settings.clear_colour, &mut |target| {
            for model in plan.terrain.iter().chain(&plan.opaque) {
                skip_recoverable(draw(shader, device, target, model, view, projection))?;
            }
            for model in &plan.skybox {
                skip_recoverable(skybox_shader.render(device, target, model, view, projection))?;
            }
            shader.enable_alpha_blending();
            let result = plan
                .transparent
                .iter()
                .try_for_each(|model| skip_recoverable(draw(shader, device, target, model, view, projection)));
            shader.disable_alpha_blending();
            result
        })
    }

    /// Releases every component in reverse order of acquisition.
    pub fn shutdown(self) {
        log::info!("Shutting down scene");
        let Self {
            models,
            terrain,
            skybox,
            skybox_shader,
            shader,
            light: _,
            camera: _,
            settings: _,
            device,
        } = self;
        drop(models);
        drop(terrain);
        drop(skybox);
        drop(skybox_shader);
        drop(shader);
        drop(device);
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn light_mut(&mut self) -> &mut Light {
        &mut self.light
    }

    pub fn shader(&self) -> &Shader<D> {
        &self.shader
    }

    pub fn skybox_shader(&self) -> &Shader<D> {
        &self.skybox_shader
    }

    pub fn terrain(&self) -> &Terrain<D> {
        &self.terrain
    }

    pub fn skybox(&self) -> &Model<D> {
        &self.skybox
    }

    pub fn skybox_angle(&self) -> f32 {
        self.settings.skybox_angle
    }

    pub fn models(&self) -> &[Model<D>] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [Model<D>] {
        &mut self.models
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl Scene<Context> {
    pub fn resize(&mut self, width: u32, height: u32) {
        self.device.resize(width, height);
    }
}

fn draw<D: Device>(
    shader: &mut Shader<D>,
    device: &D,
    target: &mut dyn crate::gpu::RenderTarget<D>,
    model: &Model<D>,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
) -> Result<()> {
    if model.materials().iter().any(|m| m.has_reflection) {
        shader.render_with_cubemap(device, target, model, view, projection)
    } else {
        shader.render(device, target, model, view, projection)
    }
}

fn skip_recoverable(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if !e.is_fatal() => {
            log::warn!("Skipping draw: {e}");
            Ok(())
        }
        other => other,
    }
}
