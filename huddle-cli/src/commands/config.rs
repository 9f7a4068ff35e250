use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use shared::config::server::{Config, Profile};

/// Serializes the defaults for `profile` in `format` (`yaml` or `json`).
///
/// # Errors
/// Returns an error if the format is unsupported.
pub fn render_config(profile: Profile, format: &str) -> Result<String> {
    let config = Config::default_for_profile(profile);
    match format {
        "yaml" => Ok(serde_yml::to_string(&config)?),
        "json" => Ok(serde_json::to_string_pretty(&config)?),
        other => bail!("unsupported format `{other}`; use 'yaml' or 'json'"),
    }
}

/// Writes `huddle.yaml` or `huddle.json` into `dir`.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(dir: &Path, profile: Profile, format: &str) -> Result<()> {
    let serialized = render_config(profile, format)?;
    let path = dir.join(format!("huddle.{format}"));
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_yaml_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        generate_config(dir.path(), Profile::Prod, "yaml").unwrap();

        let path = dir.path().join("huddle.yaml");
        let loaded: Config = serde_yml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, Config::default_for_profile(Profile::Prod));
    }

    #[test]
    fn json_is_supported_and_toml_is_not() {
        let json = render_config(Profile::Dev, "json").unwrap();
        assert!(json.contains("\"default_page_size\": 30"));
        assert!(render_config(Profile::Dev, "toml").is_err());
    }
}
