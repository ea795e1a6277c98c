//! `${VAR}` expansion for the path, URL and command settings of a layer.

use crate::{ConfigError, Layer};

impl Layer {
    /// Expand `${VAR}` and `${VAR:-default}` in every expandable setting.
    ///
    /// Runs once per load, after presets are overlaid, so a preset may refer
    /// to variables the base layer never mentions.
    pub(crate) fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let fields = [
            ("input.dir", &mut self.input.dir),
            ("output.dir", &mut self.output.dir),
            ("output.base_url", &mut self.output.base_url),
            ("renderer.command", &mut self.renderer.command),
        ];
        for (field, value) in fields {
            if let Some(raw) = value.as_deref() {
                *value = Some(expand_setting(raw, field)?);
            }
        }
        Ok(())
    }
}

/// Expand one setting. Bare `$VAR` is left alone so URLs pass through.
fn expand_setting(raw: &str, field: &str) -> Result<String, ConfigError> {
    if !raw.contains("${") {
        return Ok(raw.to_owned());
    }

    shellexpand::env_with_context(raw, |name| match std::env::var(name) {
        Ok(val) => Ok(Some(val)),
        Err(_) => Err(name.to_owned()),
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set (in \"{raw}\")", e.cause),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layer(toml: &str) -> Layer {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_renderer_command_expanded() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("BAKE_TEST_NODE_BIN", "/opt/node/bin");
        }
        let mut layer = layer("[renderer]\ncommand = \"${BAKE_TEST_NODE_BIN}/mmdc\"\nargs = [\"${KEEP}\"]\n");
        layer.expand_env_vars().unwrap();
        assert_eq!(layer.renderer.command.as_deref(), Some("/opt/node/bin/mmdc"));
        // Arguments are passed to the renderer untouched
        assert_eq!(layer.renderer.args, Some(vec!["${KEEP}".to_owned()]));
        unsafe {
            std::env::remove_var("BAKE_TEST_NODE_BIN");
        }
    }

    #[test]
    fn test_default_fills_unset_dirs() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("BAKE_TEST_UNSET_ROOT");
        }
        let mut layer = layer(
            "[input]\ndir = \"${BAKE_TEST_UNSET_ROOT:-site}/articles\"\n\n\
             [output]\ndir = \"${BAKE_TEST_UNSET_ROOT:-site}/img\"\nbase_url = \"/img/$id\"\n",
        );
        layer.expand_env_vars().unwrap();
        assert_eq!(layer.input.dir.as_deref(), Some("site/articles"));
        assert_eq!(layer.output.dir.as_deref(), Some("site/img"));
        assert_eq!(layer.output.base_url.as_deref(), Some("/img/$id"));
    }

    #[test]
    fn test_unset_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("BAKE_TEST_MISSING_CMD");
        }
        let mut layer = layer("[renderer]\ncommand = \"${BAKE_TEST_MISSING_CMD}\"\n");
        let err = layer.expand_env_vars().unwrap_err();
        match &err {
            ConfigError::EnvVar { field, .. } => assert_eq!(field, "renderer.command"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("BAKE_TEST_MISSING_CMD"));
    }

    #[test]
    fn test_unset_fields_stay_unset() {
        let mut layer = Layer::default();
        layer.expand_env_vars().unwrap();
        assert_eq!(layer.input.dir, None);
        assert_eq!(layer.renderer.command, None);
    }
}
