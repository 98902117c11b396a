mod common;

use cgmath::{Matrix4, Point3, Vector3};
use common::test_utils::{MockDevice, assert_matrix_close, assets, quad_asset};
use scene_ngin::{
    SceneConfig, SceneError,
    camera::look_at_lh,
    config::ModelSpec,
    data_structures::{model::Model, transform::Transform},
    gpu::{BlendMode, Device},
    light::Light,
    scene::Scene,
    shader::{ObjectConstants, Shader, ShaderDesc},
};

fn look_from_behind(scene: &mut Scene<MockDevice>) {
    let camera = scene.camera_mut();
    camera.set_position(0.0, 0.0, -10.0);
    camera.set_target_position(0.0, 0.0, 0.0);
}

#[test]
fn uploaded_wvp_is_projection_view_world() {
    let transform = Transform {
        position: Vector3::new(1.0, 2.0, 3.0),
        scale: Vector3::new(2.0, 2.0, 2.0),
        ..Transform::new()
    };
    let device = MockDevice::new();
    let ledger = device.ledger();
    let mut scene = Scene::initialize(
        device,
        &SceneConfig::default(),
        assets(vec![quad_asset(ModelSpec::quad("box").with_transform(transform))]),
    )
    .unwrap();
    look_from_behind(&mut scene);
    scene.render_frame(0.0).unwrap();

    let world = transform.to_matrix();
    let view = look_at_lh(Point3::new(0.0, 0.0, -10.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
    let expected: [[f32; 4]; 4] = (scene.device().projection_matrix() * view * world).into();

    assert_matrix_close(scene.shader().last_object().world_view_proj, expected);

    // terrain takes slot 0, the box slot 1
    let ledger = ledger.borrow();
    let draw = ledger
        .draws()
        .iter()
        .find(|d| d.geometry == "box vertex buffer")
        .unwrap();
    assert_eq!(draw.constant_offsets, vec![256, 256]);
    let bytes = ledger.last_write("default object constants", 256).unwrap();
    let uploaded: ObjectConstants = bytemuck::pod_read_unaligned(bytes);
    assert_matrix_close(uploaded.world_view_proj, expected);
    let world: [[f32; 4]; 4] = world.into();
    assert_matrix_close(uploaded.world, world);
}

#[test]
fn frame_draws_terrain_opaque_skybox_then_transparent_back_to_front() {
    let at = |z: f32| Transform::from(Vector3::new(0.0, 0.0, z));
    let device = MockDevice::new();
    let ledger = device.ledger();
    let mut scene = Scene::initialize(
        device,
        &SceneConfig::default(),
        assets(vec![
            quad_asset(ModelSpec::quad("near").with_transform(at(5.0)).transparent()),
            quad_asset(ModelSpec::quad("solid")),
            quad_asset(ModelSpec::quad("far").with_transform(at(50.0)).transparent()),
        ]),
    )
    .unwrap();
    look_from_behind(&mut scene);
    scene.render().unwrap();

    let ledger = ledger.borrow();
    let order: Vec<(&str, &str, BlendMode)> = ledger
        .draws()
        .iter()
        .map(|d| (d.geometry.as_str(), d.program.as_str(), d.blend))
        .collect();
    assert_eq!(
        order,
        vec![
            ("terrain vertex buffer", "default", BlendMode::Opaque),
            ("solid vertex buffer", "default", BlendMode::Opaque),
            ("skybox vertex buffer", "skybox", BlendMode::Opaque),
            ("far vertex buffer", "default", BlendMode::Alpha),
            ("near vertex buffer", "default", BlendMode::Alpha),
        ]
    );
    assert!(!scene.shader().is_blending());
}

#[test]
fn every_draw_gets_its_own_constant_slot() {
    let device = MockDevice::new();
    let ledger = device.ledger();
    let mut scene = Scene::initialize(
        device,
        &SceneConfig::default(),
        assets(vec![quad_asset(ModelSpec::quad("a")), quad_asset(ModelSpec::quad("b"))]),
    )
    .unwrap();
    scene.render().unwrap();

    let ledger = ledger.borrow();
    let default_draws: Vec<_> = ledger.draws().iter().filter(|d| d.program == "default").collect();
    assert_eq!(default_draws.len(), 3);
    for (slot, draw) in default_draws.iter().enumerate() {
        let offset = slot as u32 * 256;
        assert_eq!(draw.constant_offsets, vec![offset, offset]);
    }
    assert_eq!(scene.shader().draws_this_frame(), 3);
}

#[test]
fn skybox_angle_wraps_to_zero() {
    let config = SceneConfig {
        skybox_spin: 1.0,
        ..SceneConfig::default()
    };
    let mut scene = Scene::initialize(MockDevice::new(), &config, assets(vec![])).unwrap();

    scene.render_frame(4.0).unwrap();
    assert_eq!(scene.skybox_angle(), 4.0);
    scene.render_frame(4.0).unwrap();
    assert_eq!(scene.skybox_angle(), 0.0);
    scene.render_frame(1.0).unwrap();
    assert_eq!(scene.skybox_angle(), 1.0);
    assert_eq!(scene.skybox().translation(), Vector3::new(0.0, 0.0, 0.0));
}

#[test]
fn skybox_can_follow_the_camera() {
    let config = SceneConfig::default().with_skybox_following_camera();
    let mut scene = Scene::initialize(MockDevice::new(), &config, assets(vec![])).unwrap();
    scene.camera_mut().set_position(3.0, 4.0, 5.0);
    scene.render_frame(0.0).unwrap();

    assert_eq!(scene.skybox().translation(), Vector3::new(3.0, 4.0, 5.0));
}

#[test]
fn ground_clearance_keeps_the_camera_above_the_terrain() {
    let config = SceneConfig::default().with_ground_clearance(1.5);
    let mut scene = Scene::initialize(MockDevice::new(), &config, assets(vec![])).unwrap();

    scene.camera_mut().set_position(1.0, 50.0, 1.0);
    scene.render_frame(0.0).unwrap();
    assert_eq!(scene.camera().position().y, 1.5);

    // off the grid the height is left alone
    scene.camera_mut().set_position(100.0, 50.0, 100.0);
    scene.render_frame(0.0).unwrap();
    assert_eq!(scene.camera().position().y, 50.0);
}

#[test]
fn exhausted_draw_slots_skip_draws_without_failing_the_frame() {
    let config = SceneConfig {
        max_draws_per_frame: 2,
        ..SceneConfig::default()
    };
    let device = MockDevice::new();
    let ledger = device.ledger();
    let mut scene = Scene::initialize(
        device,
        &config,
        assets(vec![
            quad_asset(ModelSpec::quad("solid")),
            quad_asset(ModelSpec::quad("glass").transparent()),
        ]),
    )
    .unwrap();
    scene.render().unwrap();

    assert_eq!(scene.shader().draws_this_frame(), 2);
    assert!(!scene.shader().is_blending());
    let ledger = ledger.borrow();
    assert!(ledger.draws().iter().all(|d| d.geometry != "glass vertex buffer"));
    assert_eq!(ledger.frames(), 1);
}

#[test]
fn unbound_models_are_a_recoverable_error() {
    let device = MockDevice::new();
    let mut shader = Shader::initialize(&device, &ShaderDesc::new("default", "fn vs_main( fn fs_main("), 4).unwrap();
    let model = Model::quad(&device, "bare").unwrap();

    let camera = scene_ngin::camera::Camera::new(Point3::new(0.0, 0.0, -10.0));
    shader.begin_frame(&device, &camera, &Light::default());
    let result = device.render_frame(wgpu::Color::BLACK, &mut |target| {
        shader.render(&device, target, &model, Matrix4::from_scale(1.0), Matrix4::from_scale(1.0))
    });

    let err = result.unwrap_err();
    assert!(matches!(err, SceneError::Unprepared { ref label } if label == "bare"));
    assert!(!err.is_fatal());
}

#[test]
fn camera_and_light_are_uploaded_each_frame() {
    let mut scene = Scene::initialize(MockDevice::new(), &SceneConfig::default(), assets(vec![])).unwrap();
    scene.light_mut().set_position(1.0, 2.0, 3.0);
    scene.camera_mut().set_position(4.0, 5.0, 6.0);
    scene.render().unwrap();

    assert_eq!(scene.shader().last_light().position, [1.0, 2.0, 3.0]);
    assert_eq!(scene.shader().last_camera().position, [4.0, 5.0, 6.0]);
    assert_eq!(scene.skybox_shader().last_camera().position, [4.0, 5.0, 6.0]);
}
