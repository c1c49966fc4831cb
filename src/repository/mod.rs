// src/repository/mod.rs

//! In-memory repositories and repository stacks
//!
//! Repositories are loaded from JSON index files (optionally gzip
//! compressed) and keep their packages in a `Vec`, so iterating a repository
//! or a stack is restartable and always yields the same order.

use crate::error::{Error, Result};
use crate::packages::memory::MemoryPackage;
use crate::query::{PackageIter, PackageSet};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// On-disk repository index format
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<MemoryPackage>,
}

/// A named, prioritized collection of packages
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    priority: i32,
    packages: Vec<MemoryPackage>,
}

impl Repository {
    /// Create a repository; packages without a repository name get this one
    pub fn new(name: &str, priority: i32, packages: Vec<MemoryPackage>) -> Self {
        let packages = packages
            .into_iter()
            .map(|mut pkg| {
                pkg.repository.get_or_insert_with(|| name.to_string());
                pkg.priority = priority;
                pkg
            })
            .collect();

        Self {
            name: name.to_string(),
            priority,
            packages,
        }
    }

    pub fn from_index(index: RepositoryIndex, priority: i32) -> Self {
        Self::new(&index.name, priority, index.packages)
    }

    /// Load a repository index from a `.json` or `.json.gz` file
    pub fn load(path: impl AsRef<Path>, priority: i32) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading repository index from {}", path.display());

        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let index: RepositoryIndex = serde_json::from_reader(BufReader::new(reader))?;
        info!(
            "Loaded repository '{}' ({} packages, priority {})",
            index.name,
            index.packages.len(),
            priority
        );
        Ok(Self::from_index(index, priority))
    }

    /// Write this repository back out as a plain JSON index
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let index = RepositoryIndex {
            name: self.name.clone(),
            packages: self.packages.clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &index)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: &str) {
        for pkg in &mut self.packages {
            if pkg.repository.as_deref() == Some(self.name.as_str()) {
                pkg.repository = Some(name.to_string());
            }
        }
        self.name = name.to_string();
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn packages(&self) -> &[MemoryPackage] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }
}

impl PackageSet for Repository {
    type Package = MemoryPackage;

    fn iter(&self) -> PackageIter<'_, MemoryPackage> {
        Box::new(self.packages.iter().map(|p| Ok::<_, Error>(p)))
    }
}

/// Several repositories acting as one package set
///
/// Packages are yielded repository by repository, in stack order.
#[derive(Debug, Clone, Default)]
pub struct RepositoryStack {
    repositories: Vec<Repository>,
}

impl RepositoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, repository: Repository) {
        if self.repository(repository.name()).is_some() {
            warn!(
                "Repository '{}' is stacked more than once; lookups by name see the first",
                repository.name()
            );
        }
        info!(
            "Stacking repository '{}' (priority {})",
            repository.name(),
            repository.priority()
        );
        self.repositories.push(repository);
    }

    /// Look up a repository by name
    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name() == name)
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }
}

impl FromIterator<Repository> for RepositoryStack {
    fn from_iter<I: IntoIterator<Item = Repository>>(iter: I) -> Self {
        let mut stack = Self::new();
        for repository in iter {
            stack.push(repository);
        }
        stack
    }
}

impl PackageSet for RepositoryStack {
    type Package = MemoryPackage;

    fn iter(&self) -> PackageIter<'_, MemoryPackage> {
        Box::new(
            self.repositories
                .iter()
                .flat_map(|r| r.packages.iter())
                .map(|p| Ok::<_, Error>(p)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::atom::DepAtom;
    use crate::packages::traits::Package;

    fn pkg(key: &str, version: &str) -> MemoryPackage {
        MemoryPackage::new(key, version).unwrap()
    }

    #[test]
    fn test_repository_tags_packages() {
        let r = Repository::new("gentoo", 3, vec![pkg("app/foo", "1")]);
        let p = r.best().unwrap();
        assert_eq!(p.repository(), Some("gentoo"));
        assert_eq!(p.priority(), 3);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let r = Repository::new("gentoo", 0, vec![pkg("app/foo", "1"), pkg("app/foo", "2")]);
        let first: Vec<_> = r.iter().map(|p| p.unwrap().version().to_string()).collect();
        let second: Vec<_> = r.iter().map(|p| p.unwrap().version().to_string()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stack_priority_breaks_ties() {
        let stack: RepositoryStack = [
            Repository::new("gentoo", 0, vec![pkg("app/foo", "1"), pkg("app/foo", "2")]),
            Repository::new("overlay", 10, vec![pkg("app/foo", "2")]),
        ]
        .into_iter()
        .collect();

        assert_eq!(stack.iter().count(), 3);
        let best = stack.best().unwrap();
        assert_eq!(best.repository(), Some("overlay"));

        let from_gentoo = stack.select(DepAtom::parse("app/foo::gentoo").unwrap()).unwrap();
        assert_eq!(from_gentoo.version().to_string(), "2");
        assert_eq!(from_gentoo.repository(), Some("gentoo"));
        assert!(stack.repository("overlay").is_some());
    }

    #[test]
    fn test_newer_version_beats_priority() {
        let stack: RepositoryStack = [
            Repository::new("gentoo", 0, vec![pkg("app/foo", "3")]),
            Repository::new("overlay", 10, vec![pkg("app/foo", "2")]),
        ]
        .into_iter()
        .collect();
        assert_eq!(stack.best().unwrap().version().to_string(), "3");
    }

    #[test]
    fn test_rename() {
        let mut r = Repository::new("a", 0, vec![pkg("app/foo", "1")]);
        r.rename("b");
        assert_eq!(r.name(), "b");
        assert_eq!(r.packages()[0].repository(), Some("b"));
    }
}
