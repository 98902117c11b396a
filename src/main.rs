use scene_ngin::SceneConfig;

fn main() -> anyhow::Result<()> {
    let mut config = SceneConfig::default();
    if let Ok(root) = std::env::var("SCENE_ASSETS") {
        config = config.with_asset_root(root);
    }
    scene_ngin::run(config)
}
