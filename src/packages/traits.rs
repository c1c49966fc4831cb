// src/packages/traits.rs

//! Capability contracts every backend satisfies
//!
//! The query algebra and depset code never see concrete backend types; they
//! work against `Package` and `Atom` trait objects.

use crate::packages::atom::PackageKey;
use crate::packages::attr::AttrValue;
use crate::version::Version;
use std::cmp::Ordering;
use std::fmt;

/// Attribute paths every package resolves through `core_attribute`
pub const CORE_ATTRIBUTES: &[&str] = &[
    "key",
    "key.category",
    "key.package",
    "version",
    "version.without_revision",
    "version.revision",
    "slot",
    "subslot",
    "repository",
];

/// Structured prefixes of the core attribute paths
pub const CORE_NAMESPACES: &[&str] = &["key", "version"];

/// A single, uniquely identified package
pub trait Package: fmt::Debug {
    /// The (category, name) identity shared by all versions
    fn key(&self) -> &PackageKey;

    /// The package version
    fn version(&self) -> &Version;

    /// The package slot
    fn slot(&self) -> &str;

    /// The package subslot (defaults to the slot)
    fn subslot(&self) -> &str {
        self.slot()
    }

    /// The repository this package comes from, if known
    fn repository(&self) -> Option<&str>;

    /// Source priority; greater wins `best` ties between equal versions
    fn priority(&self) -> i32 {
        0
    }

    /// Look up an attribute by structured path (`description.short`)
    ///
    /// Returns `None` when the path does not exist for this package, and
    /// `Some(AttrValue::None)` when it exists but is unset.
    fn attribute(&self, path: &str) -> Option<AttrValue> {
        core_attribute(self, path)
    }

    /// Path prefixes that have nested members (`description` for
    /// `description.short`)
    ///
    /// Keyword lookups only turn a `_` into `.` right after one of these.
    /// Dotted entries declare deeper levels.
    fn attribute_namespaces(&self) -> &[&str] {
        CORE_NAMESPACES
    }
}

/// A constraint over packages with a membership test
pub trait Atom: fmt::Debug + fmt::Display {
    /// Whether `pkg` is in the set of packages this atom describes
    fn contains(&self, pkg: &dyn Package) -> bool;

    /// The key (possibly without category)
    fn key(&self) -> &PackageKey;

    /// The version constraint, if any
    fn version(&self) -> Option<&Version>;

    fn slot(&self) -> Option<&str>;

    fn subslot(&self) -> Option<&str>;

    fn repository(&self) -> Option<&str>;

    /// Whether the atom names a full `category/package` key
    fn complete(&self) -> bool {
        self.key().is_complete()
    }

    /// Whether this is a blocker (negated) atom
    fn blocking(&self) -> bool;
}

/// Resolve the attribute paths shared by every package
pub fn core_attribute<P: Package + ?Sized>(pkg: &P, path: &str) -> Option<AttrValue> {
    let value = match path {
        "key" => AttrValue::from(pkg.key().to_string()),
        "key.category" => AttrValue::from(pkg.key().category()),
        "key.package" => AttrValue::from(pkg.key().package()),
        "version" => AttrValue::from(pkg.version().to_string()),
        "version.without_revision" => AttrValue::from(pkg.version().without_revision()),
        "version.revision" => {
            let revision = pkg.version().revision();
            i64::try_from(revision)
                .map(AttrValue::Int)
                .unwrap_or_else(|_| AttrValue::from(revision.to_string()))
        }
        "slot" => AttrValue::from(pkg.slot()),
        "subslot" => AttrValue::from(pkg.subslot()),
        "repository" => AttrValue::from(pkg.repository()),
        _ => return None,
    };
    Some(value)
}

/// Composite package order: key, then version, then source priority
///
/// Only meaningful between packages sharing a key; across keys it is still
/// total so sorting never panics.
pub fn compare_packages(a: &dyn Package, b: &dyn Package) -> Ordering {
    a.key()
        .cmp(b.key())
        .then_with(|| a.version().cmp(b.version()))
        .then_with(|| a.priority().cmp(&b.priority()))
}
