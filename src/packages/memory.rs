// src/packages/memory.rs

//! In-memory package records
//!
//! `MemoryPackage` is the package type behind JSON repository indexes. Every
//! field is reachable through `Package::attribute`, with nested paths for
//! structured fields (`description.short`, `metadata.SRC_URI`,
//! `upstream.remote_ids`).

use crate::depend::{DepParser, DepSet, PmsDepParser};
use crate::error::Result;
use crate::packages::atom::{DepAtom, PackageKey};
use crate::packages::attr::AttrValue;
use crate::packages::meta::{Maintainer, Upstream, UseFlag};
use crate::packages::traits::{Package, core_attribute};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_slot() -> String {
    "0".to_string()
}

fn default_eapi() -> String {
    "0".to_string()
}

/// Prefixes of the nested attribute paths of a `MemoryPackage`, core ones
/// included
const NAMESPACES: &[&str] = &[
    "key",
    "version",
    "description",
    "metadata",
    "use",
    "maintainers",
    "upstream",
];

/// Short and long package descriptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub long: Option<String>,
}

/// A package record held entirely in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPackage {
    pub key: PackageKey,
    pub version: Version,
    #[serde(default = "default_slot")]
    pub slot: String,
    #[serde(default)]
    pub subslot: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    /// Set from the owning repository, never read from the index
    #[serde(skip)]
    pub priority: i32,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_eapi")]
    pub eapi: String,
    #[serde(default)]
    pub description: Description,
    #[serde(default)]
    pub homepages: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub inherits: Vec<String>,
    /// IUSE entries, possibly with `+`/`-` default markers
    #[serde(default)]
    pub iuse: Vec<String>,
    /// USE flags in effect for this package instance
    #[serde(default)]
    pub applied_use: Vec<String>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub restrict: String,
    #[serde(default)]
    pub properties: String,
    #[serde(default)]
    pub required_use: String,
    #[serde(default)]
    pub build_dependencies: String,
    /// BDEPEND; falls back to DEPEND when absent
    #[serde(default)]
    pub cbuild_build_dependencies: Option<String>,
    #[serde(default)]
    pub run_dependencies: String,
    #[serde(default)]
    pub post_dependencies: String,
    /// Phase functions the ebuild defines; `None` when unknown
    #[serde(default)]
    pub defined_phases: Option<Vec<String>>,
    /// Whether the repository's package.mask masks this package
    #[serde(default)]
    pub repo_masked: bool,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    #[serde(default)]
    pub upstream: Upstream,
    /// Free-form metadata variables
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Which dependency variable to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyClass {
    /// DEPEND
    Build,
    /// BDEPEND
    CbuildBuild,
    /// RDEPEND
    Run,
    /// PDEPEND
    Post,
}

impl MemoryPackage {
    /// Create a package with default metadata
    pub fn new(key: &str, version: &str) -> Result<Self> {
        Ok(Self {
            key: PackageKey::parse(key)?,
            version: Version::parse(version)?,
            slot: default_slot(),
            subslot: None,
            repository: None,
            priority: 0,
            path: None,
            eapi: default_eapi(),
            description: Description::default(),
            homepages: Vec::new(),
            keywords: Vec::new(),
            inherits: Vec::new(),
            iuse: Vec::new(),
            applied_use: Vec::new(),
            license: String::new(),
            restrict: String::new(),
            properties: String::new(),
            required_use: String::new(),
            build_dependencies: String::new(),
            cbuild_build_dependencies: None,
            run_dependencies: String::new(),
            post_dependencies: String::new(),
            defined_phases: None,
            repo_masked: false,
            maintainers: Vec::new(),
            upstream: Upstream::default(),
            metadata: BTreeMap::new(),
        })
    }

    /// IUSE flags with their default markers and applied state
    pub fn use_flags(&self) -> Vec<UseFlag<'_>> {
        self.iuse
            .iter()
            .map(|entry| {
                let (name, default) = UseFlag::parse_iuse(entry);
                UseFlag {
                    name,
                    default,
                    enabled: self.applied_use.iter().any(|f| f == name),
                }
            })
            .collect()
    }

    fn use_names(&self, keep: impl Fn(&UseFlag<'_>) -> bool) -> AttrValue {
        let names: Vec<&str> = self
            .use_flags()
            .into_iter()
            .filter(|f| keep(f))
            .map(|f| f.name)
            .collect();
        AttrValue::from(names)
    }

    fn raw_dependencies(&self, class: DependencyClass) -> &str {
        match class {
            DependencyClass::Build => &self.build_dependencies,
            DependencyClass::CbuildBuild => self
                .cbuild_build_dependencies
                .as_deref()
                .unwrap_or(&self.build_dependencies),
            DependencyClass::Run => &self.run_dependencies,
            DependencyClass::Post => &self.post_dependencies,
        }
    }

    /// Parse one of the dependency variables
    pub fn dependencies(&self, class: DependencyClass) -> Result<DepSet<DepAtom>> {
        PmsDepParser::new().parse(self.raw_dependencies(class))
    }

    /// Parse a dependency variable and resolve it against this package's
    /// applied USE flags
    pub fn evaluated_dependencies(&self, class: DependencyClass) -> Result<DepSet<DepAtom>> {
        Ok(self.dependencies(class)?.without_conditionals(&self.applied_use))
    }

    pub fn license_spec(&self) -> Result<DepSet<String>> {
        PmsDepParser::new().parse(&self.license)
    }

    pub fn required_use_spec(&self) -> Result<DepSet<String>> {
        PmsDepParser::new().parse(&self.required_use)
    }

    pub fn restrict_spec(&self) -> Result<DepSet<String>> {
        PmsDepParser::new().parse(&self.restrict)
    }

    pub fn properties_spec(&self) -> Result<DepSet<String>> {
        PmsDepParser::new().parse(&self.properties)
    }
}

impl Package for MemoryPackage {
    fn key(&self) -> &PackageKey {
        &self.key
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn slot(&self) -> &str {
        &self.slot
    }

    fn subslot(&self) -> &str {
        self.subslot.as_deref().unwrap_or(&self.slot)
    }

    fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn attribute(&self, path: &str) -> Option<AttrValue> {
        if let Some(value) = core_attribute(self, path) {
            return Some(value);
        }

        let value = match path {
            "path" => AttrValue::from(self.path.as_deref()),
            "eapi" => AttrValue::from(&self.eapi),
            "description" | "description.short" => AttrValue::from(&self.description.short),
            "description.long" => AttrValue::from(self.description.long.as_deref()),
            "homepages" => AttrValue::from(self.homepages.clone()),
            "keywords" => AttrValue::from(self.keywords.clone()),
            "inherits" => AttrValue::from(self.inherits.clone()),
            "use" => self.use_names(|_| true),
            "use.enabled" => self.use_names(|f| f.enabled),
            "use.disabled" => self.use_names(|f| !f.enabled),
            "use.default_enabled" => self.use_names(|f| f.default == Some(true)),
            "use.default_disabled" => self.use_names(|f| f.default == Some(false)),
            "applied_use" => AttrValue::from(self.applied_use.clone()),
            "license" => AttrValue::from(&self.license),
            "restrict" => AttrValue::from(&self.restrict),
            "properties" => AttrValue::from(&self.properties),
            "required_use" => AttrValue::from(&self.required_use),
            "build_dependencies" => AttrValue::from(self.raw_dependencies(DependencyClass::Build)),
            "cbuild_build_dependencies" => {
                AttrValue::from(self.raw_dependencies(DependencyClass::CbuildBuild))
            }
            "run_dependencies" => AttrValue::from(self.raw_dependencies(DependencyClass::Run)),
            "post_dependencies" => AttrValue::from(self.raw_dependencies(DependencyClass::Post)),
            "defined_phases" => AttrValue::from(self.defined_phases.clone()),
            "repo_masked" => AttrValue::Bool(self.repo_masked),
            "maintainers" => display_list(&self.maintainers),
            "maintainers.email" => AttrValue::from(
                self.maintainers
                    .iter()
                    .map(|m| m.email.as_str())
                    .collect::<Vec<_>>(),
            ),
            "maintainers.name" => AttrValue::from(
                self.maintainers
                    .iter()
                    .filter_map(|m| m.name.as_deref())
                    .collect::<Vec<_>>(),
            ),
            "upstream.bugs_to" => AttrValue::from(self.upstream.bugs_to.as_deref()),
            "upstream.changelog" => AttrValue::from(self.upstream.changelog.as_deref()),
            "upstream.docs" => AttrValue::from(
                self.upstream
                    .docs
                    .iter()
                    .map(|d| d.url.as_str())
                    .collect::<Vec<_>>(),
            ),
            "upstream.maintainers" => display_list(&self.upstream.maintainers),
            "upstream.remote_ids" => display_list(&self.upstream.remote_ids),
            _ => {
                let name = path.strip_prefix("metadata.")?;
                return self.metadata.get(name).map(AttrValue::from);
            }
        };
        Some(value)
    }

    fn attribute_namespaces(&self) -> &[&str] {
        NAMESPACES
    }
}

fn display_list<T: std::fmt::Display>(items: &[T]) -> AttrValue {
    AttrValue::List(items.iter().map(|i| AttrValue::Str(i.to_string())).collect())
}
