// src/config.rs

//! Repository stack configuration
//!
//! A stack is described either by a JSON file or by `NAME=PATH[:PRIORITY]`
//! command line arguments. Repositories without an explicit priority get
//! their position in the stack, so later repositories win version ties.

use crate::error::{Error, Result};
use crate::repository::{Repository, RepositoryStack};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// One repository in a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Overrides the name stored in the index
    #[serde(default)]
    pub name: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub priority: Option<i32>,
}

impl FromStr for RepositoryEntry {
    type Err = Error;

    /// Parse `[NAME=]PATH[:PRIORITY]`
    fn from_str(s: &str) -> Result<Self> {
        let (name, rest) = match s.split_once('=') {
            Some((name, rest)) if !name.is_empty() => (Some(name.to_string()), rest),
            Some(_) => {
                return Err(Error::Config(format!("empty repository name in '{}'", s)));
            }
            None => (None, s),
        };

        let (path, priority) = match rest.rsplit_once(':') {
            Some((path, priority)) => match priority.parse::<i32>() {
                Ok(priority) => (path, Some(priority)),
                Err(_) => (rest, None),
            },
            None => (rest, None),
        };

        if path.is_empty() {
            return Err(Error::Config(format!("missing repository path in '{}'", s)));
        }

        Ok(Self {
            name,
            path: PathBuf::from(path),
            priority,
        })
    }
}

/// Ordered list of repositories making up a stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
    /// Directory relative repository paths are resolved against
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl StackConfig {
    pub fn new(repositories: Vec<RepositoryEntry>) -> Self {
        Self {
            repositories,
            base_dir: None,
        }
    }

    /// Read a JSON stack file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading stack configuration from {}", path.display());

        let data = fs::read_to_string(path)?;
        let mut config: StackConfig = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Append entries after the ones already configured
    pub fn extend(&mut self, entries: impl IntoIterator<Item = RepositoryEntry>) {
        self.repositories.extend(entries);
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Load every configured repository into a stack
    pub fn build_stack(&self) -> Result<RepositoryStack> {
        if self.repositories.is_empty() {
            return Err(Error::Config("no repositories configured".to_string()));
        }

        let mut stack = RepositoryStack::new();
        for (position, entry) in self.repositories.iter().enumerate() {
            let priority = entry.priority.unwrap_or(position as i32);
            let mut repository = Repository::load(self.resolve_path(&entry.path), priority)?;
            if let Some(name) = &entry.name {
                repository.rename(name);
            }
            stack.push(repository);
        }
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        let e: RepositoryEntry = "gentoo=/var/db/gentoo.json:5".parse().unwrap();
        assert_eq!(e.name.as_deref(), Some("gentoo"));
        assert_eq!(e.path, PathBuf::from("/var/db/gentoo.json"));
        assert_eq!(e.priority, Some(5));

        let e: RepositoryEntry = "index.json.gz".parse().unwrap();
        assert_eq!(e.name, None);
        assert_eq!(e.priority, None);

        let e: RepositoryEntry = "x=c:/weird:path".parse().unwrap();
        assert_eq!(e.path, PathBuf::from("c:/weird:path"));
        assert_eq!(e.priority, None);
    }

    #[test]
    fn test_parse_entry_errors() {
        assert!(matches!("=foo.json".parse::<RepositoryEntry>(), Err(Error::Config(_))));
        assert!(matches!("name=".parse::<RepositoryEntry>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_stack_rejected() {
        assert!(matches!(
            StackConfig::default().build_stack(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bad_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.json");
        fs::write(&path, r#"{"repositories": [{"name": 3}]}"#).unwrap();
        assert!(matches!(StackConfig::load(&path), Err(Error::Config(_))));
    }
}
