use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, IndexBuildError};
use crate::models::LicensePolicy;
use crate::policy::{PolicyIndex, PolicyResolver};

/// Policy bundle compiled into the binary, used when no config file is found.
const EMBEDDED_POLICY: &str = include_str!("../assets/license-policy.json");

/// Directory name used for project and user config lookups.
const CONFIG_DIR: &str = "bom-license-policy";

/// On-disk shape of a policy configuration (JSON or TOML).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default)]
    policies: Vec<LicensePolicy>,
    /// Annotation texts keyed by the refs used in `annotationRefs`.
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    /// Reject invalid entries and family usage mismatches instead of
    /// skipping them with a warning.
    #[serde(default)]
    strict: bool,
}

/// A loaded policy list together with its lazily built [`PolicyIndex`].
///
/// The index is built on the first call to [`index`](Self::index); concurrent
/// first callers block until that single build finishes and all observe the
/// same index afterwards.
#[derive(Debug)]
pub struct PolicyConfig {
    policies: Vec<LicensePolicy>,
    annotations: BTreeMap<String, String>,
    strict: bool,
    index: OnceCell<PolicyIndex>,
}

impl PolicyConfig {
    pub fn new(policies: Vec<LicensePolicy>) -> Self {
        Self::from_document(PolicyDocument {
            policies,
            ..PolicyDocument::default()
        })
    }

    fn from_document(doc: PolicyDocument) -> Self {
        Self {
            policies: doc.policies,
            annotations: doc.annotations,
            strict: doc.strict,
            index: OnceCell::new(),
        }
    }

    /// The policy bundle shipped with the tool.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json_str(EMBEDDED_POLICY)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_document(serde_json::from_str(content)?))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_document(toml::from_str(content)?))
    }

    /// Read a config file; `.toml` files are parsed as TOML, anything else as
    /// JSON.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Force strict validation on or off. Clears any built index.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self.reset();
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The raw policy records, as loaded.
    pub fn policies(&self) -> &[LicensePolicy] {
        &self.policies
    }

    pub fn annotation(&self, reference: &str) -> Option<&str> {
        self.annotations.get(reference).map(String::as_str)
    }

    /// The index over the loaded policies, built on first use.
    pub fn index(&self) -> Result<&PolicyIndex, IndexBuildError> {
        self.index
            .get_or_try_init(|| PolicyIndex::build(&self.policies, self.strict))
    }

    pub fn resolver(&self) -> Result<PolicyResolver<'_>, IndexBuildError> {
        self.index().map(PolicyResolver::new)
    }

    /// Drop the built index; the next query rebuilds it.
    pub fn reset(&mut self) {
        self.index.take();
    }

    /// Replace the policy records and drop the built index.
    pub fn reload(&mut self, policies: Vec<LicensePolicy>) {
        self.policies = policies;
        self.reset();
    }
}

/// Load the policy configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.bom-license-policy/policy.json` (or `policy.toml`)
/// 3. `~/.config/bom-license-policy/policy.json` (or `policy.toml`)
/// 4. The embedded default bundle
pub fn load_config(
    project_path: &Path,
    config_override: Option<&Path>,
) -> Result<PolicyConfig, ConfigError> {
    if let Some(path) = config_override {
        return PolicyConfig::from_path(path);
    }

    let project_dir = project_path.join(format!(".{CONFIG_DIR}"));
    if let Some(path) = find_policy_file(&project_dir) {
        tracing::debug!(path = %path.display(), "using project policy config");
        return PolicyConfig::from_path(&path);
    }

    if let Some(home) = dirs::home_dir() {
        let home_dir = home.join(".config").join(CONFIG_DIR);
        if let Some(path) = find_policy_file(&home_dir) {
            tracing::debug!(path = %path.display(), "using user policy config");
            return PolicyConfig::from_path(&path);
        }
    }

    tracing::debug!("no policy config found, using embedded default");
    PolicyConfig::embedded()
}

fn find_policy_file(dir: &Path) -> Option<PathBuf> {
    ["policy.json", "policy.toml"]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}
