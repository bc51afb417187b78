//! Paths never taken from the primary archive.
//!
//! Two kinds of rule compose here. A name rule matches one top-level file
//! exactly (`users.xml` but not `course/users.xml`). A prefix rule matches a
//! whole subtree (`course/blocks/`).

use crate::config::MergeConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionRule {
    TopLevelName(String),
    PathPrefix(String),
}

impl ExclusionRule {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            ExclusionRule::TopLevelName(name) => !path.contains('/') && path == name,
            ExclusionRule::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    rules: Vec<ExclusionRule>,
}

impl ExclusionSet {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        let names = config
            .excluded_files
            .iter()
            .map(|n| ExclusionRule::TopLevelName(n.clone()));
        let prefixes = config
            .excluded_prefixes
            .iter()
            .map(|p| ExclusionRule::PathPrefix(p.clone()));
        Self::new(names.chain(prefixes).collect())
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Does any rule match this file path (or index filename)?
    pub fn is_excluded(&self, path: &str) -> bool {
        self.rules.iter().any(|r| r.matches(path))
    }

    /// Directories are matched with a trailing slash so that a prefix rule
    /// also covers the directory it names
    pub fn is_excluded_dir(&self, dir: &str) -> bool {
        self.rules.iter().any(|r| match r {
            ExclusionRule::TopLevelName(_) => false,
            ExclusionRule::PathPrefix(_) => r.matches(&format!("{}/", dir)),
        })
    }
}
