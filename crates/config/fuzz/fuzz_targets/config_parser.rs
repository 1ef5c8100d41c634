//! Arbitrary config files must never panic the loader.
//! Run with: cargo fuzz run config_parser

#![no_main]
use libfuzzer_sys::fuzz_target;
use marketsync_config::{Config, ConfigManager};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = toml::from_str::<Config>(s);

    // Goes through version migration as well as parsing
    if let Ok(dir) = tempfile::TempDir::new() {
        if let Ok(manager) = ConfigManager::with_directory(dir.path().to_path_buf()) {
            if std::fs::write(manager.config_path(), s).is_ok() {
                let _ = manager.load();
            }
        }
    }
});
