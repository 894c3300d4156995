pub mod destroy;
pub mod preview;
pub mod up;

use std::path::Path;
use std::sync::Arc;

use gantry_core::StackConfig;
use gantry_gcp::{GcpApi, SimulatedGcp, Stack};

/// Load config from the file when it exists, otherwise from the
/// environment. A `--template` flag value overrides the config field.
pub(crate) fn load_config(
    config_path: &str,
    template: Option<&str>,
) -> anyhow::Result<StackConfig> {
    let path = Path::new(config_path);
    let mut config = if path.exists() {
        StackConfig::from_file(path)?
    } else {
        StackConfig::from_env()?
    };
    if let Some(template) = template {
        config.openapi_template = template.to_string();
    }
    Ok(config)
}

/// The provider behind the stack. Real API clients live outside this
/// repository; the CLI drives the deterministic simulated provider.
pub(crate) fn provider() -> Arc<dyn GcpApi> {
    Arc::new(SimulatedGcp::new())
}

pub(crate) fn declare(config_path: &str, template: Option<&str>) -> anyhow::Result<Stack> {
    let config = load_config(config_path, template)?;
    Ok(Stack::declare(provider(), &config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn template_flag_overrides_config_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[stack]
project = "demo-proj"
openapi_template = "from-file.yaml"
"#
        )
        .unwrap();
        let path = f.path().to_str().unwrap();

        let config = load_config(path, None).unwrap();
        assert_eq!(config.openapi_template, "from-file.yaml");

        let config = load_config(path, Some("from-flag.yaml")).unwrap();
        assert_eq!(config.openapi_template, "from-flag.yaml");
    }
}
