//! Config directory loading
//!
//! One JSON file per pipeline; the file stem is the config name. A file
//! that fails to parse is skipped with an error log so one bad config
//! never takes down the rest of the set.

use std::path::Path;

use conduit_config::PipelineConfig;

/// Load every `*.json` pipeline config under a directory
pub fn load_config_dir(dir: &Path) -> anyhow::Result<Vec<PipelineConfig>> {
    let mut configs = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    for path in entries {
        let name = match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        let body = std::fs::read_to_string(&path)?;
        match PipelineConfig::from_json(&name, &body) {
            Ok(config) => configs.push(config),
            Err(error) => {
                tracing::error!(config = %name, %error, "skipping invalid config");
            }
        }
    }
    Ok(configs)
}
