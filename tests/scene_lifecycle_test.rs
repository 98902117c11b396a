mod common;

use common::test_utils::{MockDevice, assets, quad_asset};
use scene_ngin::{
    SceneConfig, SceneError,
    config::ModelSpec,
    data_structures::model::Geometry,
    gpu::Device,
    resources::ModelAsset,
    scene::Scene,
};

#[test]
fn shutdown_releases_every_handle_once() {
    let device = MockDevice::new();
    let ledger = device.ledger();
    let scene = Scene::initialize(
        device,
        &SceneConfig::default(),
        assets(vec![quad_asset(ModelSpec::quad("water").transparent().reflective())]),
    )
    .unwrap();

    assert!(ledger.borrow().created() > 0);
    assert_eq!(ledger.borrow().live(), ledger.borrow().created());

    scene.shutdown();
    let ledger = ledger.borrow();
    assert_eq!(ledger.live(), 0);
    assert!(ledger.all_released_once());
}

#[test]
fn dropping_a_rendered_scene_releases_everything() {
    let device = MockDevice::new();
    let ledger = device.ledger();
    let mut scene = Scene::initialize(
        device,
        &SceneConfig::default(),
        assets(vec![quad_asset(ModelSpec::quad("a")), quad_asset(ModelSpec::quad("b"))]),
    )
    .unwrap();
    scene.render_frame(0.016).unwrap();
    scene.render_frame(0.016).unwrap();
    drop(scene);
    assert!(ledger.borrow().all_released_once());
    assert_eq!(ledger.borrow().frames(), 2);
}

#[test]
fn default_shader_is_acquired_first() {
    let device = MockDevice::new();
    let ledger = device.ledger();
    let _scene = Scene::initialize(device, &SceneConfig::default(), assets(vec![])).unwrap();
    assert_eq!(ledger.borrow().first_label(), Some("default"));
}

#[test]
fn shader_compile_failure_is_fatal_and_leaks_nothing() {
    let device = MockDevice::new().failing_program("skybox");
    let ledger = device.ledger();
    let result = Scene::initialize(device, &SceneConfig::default(), assets(vec![]));

    let err = result.err().expect("initialisation should fail");
    assert!(matches!(err, SceneError::ShaderCompile { ref label, .. } if label == "skybox"));
    assert!(err.is_fatal());
    let ledger = ledger.borrow();
    assert!(ledger.created() > 0, "the default shader was built before the failure");
    assert!(ledger.all_released_once());
}

#[test]
fn empty_model_geometry_is_rejected() {
    let device = MockDevice::new();
    let ledger = device.ledger();
    let empty = ModelAsset {
        spec: ModelSpec::quad("nothing"),
        geometry: Geometry::default(),
        diffuse: None,
        normal_map: None,
    };
    let result = Scene::initialize(device, &SceneConfig::default(), assets(vec![empty]));

    assert!(matches!(result, Err(SceneError::InvalidGeometry { .. })));
    assert!(ledger.borrow().all_released_once());
}

#[test]
fn models_added_later_are_bound() {
    let device = MockDevice::new();
    let mut scene = Scene::initialize(device, &SceneConfig::default(), assets(vec![])).unwrap();
    let model = scene.build_model(&quad_asset(ModelSpec::quad("late"))).unwrap();
    scene.add_model(model).unwrap();

    assert_eq!(scene.models().len(), 1);
    assert!(scene.models()[0].bindings().is_some());
    assert_eq!(scene.device().constant_alignment(), 256);
}
