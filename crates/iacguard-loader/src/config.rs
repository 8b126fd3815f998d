//! Configuration for multi-tier policy loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use iacguard_core::PolicyIndex;

/// Policy directory below a home or workspace root.
pub const POLICY_DIR: &str = ".iacguard/policies";

/// Returns the user-global policy directory (`~/.iacguard/policies`).
#[must_use]
pub fn user_policy_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(POLICY_DIR))
}

/// Sources for [`load_with_fallback`](crate::load_with_fallback), lowest
/// priority first: embedded, user-global, workspace-local.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Pre-computed index, usually read from a snapshot.
    pub embedded: Option<PolicyIndex>,

    /// User-global policy directory.
    pub user_dir: Option<PathBuf>,

    /// Workspace-local policy directory.
    pub workspace_dir: Option<PathBuf>,

    /// Extra helper modules (name to source) available to every tier.
    pub extra_modules: BTreeMap<String, String>,
}

impl LoaderConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with the conventional user and workspace
    /// directories.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacguard_loader::LoaderConfig;
    ///
    /// let config = LoaderConfig::standard("/work/project");
    /// assert_eq!(
    ///     config.workspace_dir.as_deref(),
    ///     Some(std::path::Path::new("/work/project/.iacguard/policies"))
    /// );
    /// ```
    #[must_use]
    pub fn standard(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            user_dir: user_policy_dir(),
            workspace_dir: Some(workspace_root.as_ref().join(POLICY_DIR)),
            ..Self::default()
        }
    }

    /// Sets the embedded tier.
    #[must_use]
    pub fn with_embedded(mut self, index: PolicyIndex) -> Self {
        self.embedded = Some(index);
        self
    }

    /// Sets the user-global directory.
    #[must_use]
    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    /// Sets the workspace-local directory.
    #[must_use]
    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = Some(dir.into());
        self
    }

    /// Adds extra helper modules.
    #[must_use]
    pub fn with_extra_modules(mut self, modules: BTreeMap<String, String>) -> Self {
        self.extra_modules.extend(modules);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_config() {
        let config = LoaderConfig::standard("/repo");
        assert_eq!(
            config.workspace_dir,
            Some(PathBuf::from("/repo/.iacguard/policies"))
        );
        assert_eq!(config.user_dir, user_policy_dir());
        assert!(config.embedded.is_none());
    }

    #[test]
    fn test_builder() {
        let config = LoaderConfig::new()
            .with_user_dir("/home/u/p")
            .with_workspace_dir("/w/p")
            .with_extra_modules(BTreeMap::from([("x.rego".to_string(), "package x".to_string())]))
            .with_embedded(PolicyIndex::new());

        assert_eq!(config.user_dir, Some(PathBuf::from("/home/u/p")));
        assert_eq!(config.workspace_dir, Some(PathBuf::from("/w/p")));
        assert_eq!(config.extra_modules.len(), 1);
        assert!(config.embedded.is_some());
    }
}
