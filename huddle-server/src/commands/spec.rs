//! Writes the OpenAPI document for the chat API.

use crate::openapi::ApiDoc;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use utoipa::OpenApi;

fn render(json: bool) -> anyhow::Result<String> {
    let openapi = ApiDoc::openapi();
    Ok(if json {
        openapi.to_json()?
    } else {
        openapi.to_yaml()?
    })
}

/// Emits the OpenAPI document.
///
/// `None` or `"yaml"` streams YAML to stdout and `"json"` streams JSON. Any other value is a file
/// path; a `.json` extension selects JSON, everything else YAML.
///
/// # Errors
/// Returns an error if the document cannot be rendered or written.
pub fn generate_spec(output_path: Option<&str>) -> anyhow::Result<()> {
    match output_path {
        None | Some("yaml") => io::stdout().write_all(render(false)?.as_bytes())?,
        Some("json") => io::stdout().write_all(render(true)?.as_bytes())?,
        Some(path) => {
            let path = Path::new(path);
            let json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            fs::write(path, render(json)?)?;
            println!("OpenAPI spec written to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_json_when_extension_is_json() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("huddle.json");
        generate_spec(Some(output.to_str().unwrap())).unwrap();

        let written = fs::read_to_string(&output).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["info"]["title"], "Huddle API");
    }

    #[test]
    fn writes_yaml_for_other_extensions() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("huddle.yaml");
        generate_spec(Some(output.to_str().unwrap())).unwrap();

        let written = fs::read_to_string(&output).unwrap();
        let value: serde_yml::Value = serde_yml::from_str(&written).unwrap();
        assert!(value["paths"]
            .get("/api/conversations/{conversation_id}/messages")
            .is_some());
    }
}
