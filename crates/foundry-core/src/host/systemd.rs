//! systemd unit rendering and service control.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use anyhow::Context;
use tracing::info;

use super::command::run;
use super::{ServiceManager, UnitRenderer};

const FOUNDRY_UNIT: &str = include_str!("../../templates/foundryvtt.service");

/// Renders built-in templates by substituting `{{key}}` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    templates: BTreeMap<String, String>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            crate::config::paths::SERVICE_NAME.to_string(),
            FOUNDRY_UNIT.to_string(),
        );
        Self { templates }
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: &str, body: &str) -> Self {
        self.templates.insert(name.to_string(), body.to_string());
        self
    }

    pub fn render_to_string(
        &self,
        template: &str,
        context: &BTreeMap<String, String>,
    ) -> anyhow::Result<String> {
        let body = self
            .templates
            .get(template)
            .ok_or_else(|| anyhow::anyhow!("Unknown template: {}", template))?;
        substitute(body, context).with_context(|| format!("Failed to render template {template}"))
    }
}

impl UnitRenderer for TemplateRenderer {
    fn render(
        &self,
        template: &str,
        destination: &Path,
        context: &BTreeMap<String, String>,
        mode: u32,
    ) -> anyhow::Result<()> {
        let rendered = self.render_to_string(template, context)?;
        let parent = destination.parent().ok_or_else(|| {
            anyhow::anyhow!("Unit path has no parent: {}", destination.display())
        })?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        // Write beside the target and rename over it; the unit is read-only.
        let tmp = destination.with_extension("tmp");
        std::fs::write(&tmp, rendered)
            .with_context(|| format!("Failed to write unit file: {}", tmp.display()))?;
        set_mode(&tmp, mode)?;
        std::fs::rename(&tmp, destination)
            .with_context(|| format!("Failed to install unit file: {}", destination.display()))?;

        info!(template, destination = %destination.display(), "rendered service unit");
        Ok(())
    }
}

fn substitute(body: &str, context: &BTreeMap<String, String>) -> anyhow::Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or_else(|| anyhow::anyhow!("Unclosed placeholder"))?;
        let key = after[..close].trim();
        let value = context
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("Missing value for placeholder '{}'", key))?;
        out.push_str(value);
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

/// `systemctl` front end.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

impl Systemctl {
    pub fn new() -> Self {
        Self
    }

    fn systemctl(&self, args: &[&str]) -> anyhow::Result<()> {
        run(Command::new("systemctl").args(args))?;
        Ok(())
    }
}

impl ServiceManager for Systemctl {
    fn enable(&self, name: &str) -> anyhow::Result<()> {
        info!(service = name, "enabling service");
        self.systemctl(&["enable", name])
    }

    fn start(&self, name: &str) -> anyhow::Result<()> {
        info!(service = name, "starting service");
        self.systemctl(&["start", name])
    }

    fn stop(&self, name: &str) -> anyhow::Result<()> {
        info!(service = name, "stopping service");
        self.systemctl(&["stop", name])
    }

    fn daemon_reload(&self) -> anyhow::Result<()> {
        self.systemctl(&["daemon-reload"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::SERVICE_NAME;
    use tempfile::TempDir;

    fn context() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("install_path".to_string(), "/opt/foundry/vtt".to_string()),
            ("data_path".to_string(), "/opt/foundry/userdata".to_string()),
        ])
    }

    #[test]
    fn foundry_unit_references_paths() {
        let rendered = TemplateRenderer::new()
            .render_to_string(SERVICE_NAME, &context())
            .unwrap();

        assert!(rendered.contains(
            "ExecStart=/usr/bin/node /opt/foundry/vtt/resources/app/main.js --dataPath=/opt/foundry/userdata"
        ));
        assert!(rendered.contains("WorkingDirectory=/opt/foundry/vtt"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn missing_placeholder_value_fails() {
        let renderer = TemplateRenderer::new().with_template("t", "a={{ a }} b={{b}}");
        let ctx = BTreeMap::from([("a".to_string(), "1".to_string())]);
        let err = renderer.render_to_string("t", &ctx).unwrap_err();
        assert!(format!("{err:#}").contains("'b'"));
    }

    #[test]
    fn unknown_template_fails() {
        assert!(
            TemplateRenderer::new()
                .render_to_string("nope.service", &context())
                .is_err()
        );
    }

    #[cfg(unix)]
    #[test]
    fn render_sets_mode_and_can_overwrite() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("system").join(SERVICE_NAME);
        let renderer = TemplateRenderer::new();

        renderer.render(SERVICE_NAME, &dest, &context(), 0o440).unwrap();
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o440);

        let mut moved = context();
        moved.insert("data_path".to_string(), "/srv/foundry".to_string());
        renderer.render(SERVICE_NAME, &dest, &moved, 0o440).unwrap();
        assert!(
            std::fs::read_to_string(&dest)
                .unwrap()
                .contains("--dataPath=/srv/foundry")
        );
    }
}
