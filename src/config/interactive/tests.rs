use super::load_existing_config as load_existing_config_impl;
use crate::config::Config;

#[test]
fn load_existing_config_keeps_loaded() {
    let loaded = Config {
        base_dir: std::path::PathBuf::from("/tmp/docqa-test"),
        ..Config::default()
    };
    let config = load_existing_config_impl(Ok(loaded.clone())).expect("config passes through");
    assert_eq!(config, loaded);
}

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let config = load_existing_config_impl(Err(anyhow::anyhow!("broken file")))
        .expect("defaults are used when loading fails");
    assert_eq!(config.llm, crate::config::LlmConfig::default());
    assert_eq!(config.chat, crate::config::ChatConfig::default());
}
