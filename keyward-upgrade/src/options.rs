//! Upgrade options and artifact filename templates.

use crate::error::{UpgradeError, UpgradeResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Default artifact filename template.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{program}_{platform}_{arch}{.ext}";

/// Default release channel.
pub const DEFAULT_CHANNEL: &str = "stable";

/// What to upgrade from, and how to find the artifact for this platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeOptions {
    /// Version currently running.
    pub current_version: String,
    /// Product scope. Empty means the client config's product.
    pub product: String,
    /// Package scope, if any.
    pub package: Option<String>,
    /// Version constraint, e.g. `1.0` to stay on 1.x.
    pub constraint: Option<String>,
    /// Release channel: `stable`, `rc`, `beta`, `alpha` or `dev`.
    pub channel: String,
    /// Personal Ed25519 public key (hex) that signs releases. Must not be
    /// the account key. Empty skips signature verification.
    pub public_key: String,
    /// Artifact filename template. See [`render_filename`].
    pub filename: String,
    /// Program name. Defaults to the running executable's file stem.
    pub program: Option<String>,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            current_version: String::new(),
            product: String::new(),
            package: None,
            constraint: None,
            channel: DEFAULT_CHANNEL.to_string(),
            public_key: String::new(),
            filename: DEFAULT_FILENAME_TEMPLATE.to_string(),
            program: None,
        }
    }
}

impl UpgradeOptions {
    /// Returns the configured program name or the running executable's.
    #[must_use]
    pub fn program(&self) -> String {
        if let Some(program) = self.program.as_deref().filter(|p| !p.is_empty()) {
            return program.to_string();
        }
        env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default()
    }
}

/// Values available to a filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameVars {
    /// Program name.
    pub program: String,
    /// Platform in release naming (`linux`, `darwin`, `windows`).
    pub platform: String,
    /// Architecture in release naming (`amd64`, `arm64`, `386`).
    pub arch: String,
    /// Executable extension without the dot; empty outside Windows.
    pub ext: String,
    /// Release channel.
    pub channel: String,
    /// Release version.
    pub version: String,
}

impl FilenameVars {
    /// Variables for the running platform.
    #[must_use]
    pub fn current(program: String, channel: &str, version: &str) -> Self {
        Self {
            program,
            platform: release_platform(env::consts::OS).to_string(),
            arch: release_arch(env::consts::ARCH).to_string(),
            ext: env::consts::EXE_EXTENSION.to_string(),
            channel: channel.to_string(),
            version: version.to_string(),
        }
    }
}

/// Maps a Rust target OS onto release platform names.
#[must_use]
pub fn release_platform(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Maps a Rust target arch onto release arch names.
#[must_use]
pub fn release_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Renders a filename template.
///
/// Placeholders are `{program}`, `{platform}`, `{arch}`, `{ext}`,
/// `{channel}` and `{version}`. `{.ext}` renders as `.ext` when there is
/// an extension and as nothing otherwise.
///
/// # Errors
///
/// `FilenameTemplate` for an unclosed brace or an unknown placeholder.
pub fn render_filename(template: &str, vars: &FilenameVars) -> UpgradeResult<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| UpgradeError::FilenameTemplate(format!("unclosed `{{` in {template:?}")))?;

        match &after[..end] {
            "program" => out.push_str(&vars.program),
            "platform" => out.push_str(&vars.platform),
            "arch" => out.push_str(&vars.arch),
            "ext" => out.push_str(&vars.ext),
            ".ext" if !vars.ext.is_empty() => {
                out.push('.');
                out.push_str(&vars.ext);
            }
            ".ext" => {}
            "channel" => out.push_str(&vars.channel),
            "version" => out.push_str(&vars.version),
            unknown => {
                return Err(UpgradeError::FilenameTemplate(format!(
                    "unknown variable `{unknown}`"
                )));
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
