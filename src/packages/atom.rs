// src/packages/atom.rs

//! Package keys and the PMS-syntax reference atom
//!
//! Atoms look like `>=app-misc/foo-1.2-r1:2/2.1=::gentoo[ssl]`. The category
//! may be left out (`foo`, `>=foo-1`), giving an incomplete atom that matches
//! on package name alone.

use crate::error::{Error, Result};
use crate::packages::traits::{Atom, Package};
use crate::query::{AtomMatcher, PackageSet};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static CATEGORY_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_.-]*$").expect("category regex is valid")
});

static PACKAGE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_-]*$").expect("package regex is valid")
});

static SLOT_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9+_.-]*$").expect("slot regex is valid")
});

static REPO_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").expect("repository regex is valid")
});

/// The (category, package) identity of a package family
///
/// Equality and ordering use the canonical `category/package` string. Keys
/// derived from unqualified user input have no category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageKey {
    full: String,
    slash: Option<usize>,
}

impl PackageKey {
    /// Build a key from already-validated parts
    pub fn new(category: Option<&str>, package: &str) -> Self {
        match category {
            Some(category) => Self {
                full: format!("{}/{}", category, package),
                slash: Some(category.len()),
            },
            None => Self {
                full: package.to_string(),
                slash: None,
            },
        }
    }

    /// Parse `category/package` or a bare `package`
    pub fn parse(s: &str) -> Result<Self> {
        let (category, package) = match s.split_once('/') {
            Some((c, p)) => (Some(c), p),
            None => (None, s),
        };

        if let Some(category) = category {
            if !CATEGORY_RE.is_match(category) {
                return Err(Error::InvalidAtom(format!("invalid category in '{}'", s)));
            }
        }
        if !PACKAGE_RE.is_match(package) {
            return Err(Error::InvalidAtom(format!("invalid package name in '{}'", s)));
        }

        Ok(Self::new(category, package))
    }

    pub fn category(&self) -> Option<&str> {
        self.slash.map(|i| &self.full[..i])
    }

    pub fn package(&self) -> &str {
        match self.slash {
            Some(i) => &self.full[i + 1..],
            None => &self.full,
        }
    }

    /// Whether the key carries a category
    pub fn is_complete(&self) -> bool {
        self.slash.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl FromStr for PackageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PackageKey> for String {
    fn from(key: PackageKey) -> Self {
        key.full
    }
}

/// Blocker strength (`!` or `!!`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    Weak,
    Strong,
}

/// Version comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Less,
    LessOrEqual,
    Equal,
    /// `=cat/pkg-1.2*`
    EqualGlob,
    /// `~cat/pkg-1.2`, any revision
    Approximate,
    GreaterOrEqual,
    Greater,
}

impl Operator {
    fn prefix(&self) -> &'static str {
        match self {
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Equal | Operator::EqualGlob => "=",
            Operator::Approximate => "~",
            Operator::GreaterOrEqual => ">=",
            Operator::Greater => ">",
        }
    }
}

/// Slot operator (`:=` or `:*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOperator {
    Equal,
    Star,
}

/// A parsed PMS package atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepAtom {
    blocker: Option<Blocker>,
    operator: Option<Operator>,
    key: PackageKey,
    version: Option<Version>,
    slot: Option<String>,
    subslot: Option<String>,
    slot_operator: Option<SlotOperator>,
    repository: Option<String>,
    use_deps: Option<String>,
}

impl DepAtom {
    /// Parse an atom string
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |why: &str| Error::InvalidAtom(format!("{}: '{}'", why, s));

        let mut rest = s.trim();
        if rest.is_empty() {
            return Err(invalid("empty atom"));
        }

        let blocker = if let Some(r) = rest.strip_prefix("!!") {
            rest = r;
            Some(Blocker::Strong)
        } else if let Some(r) = rest.strip_prefix('!') {
            rest = r;
            Some(Blocker::Weak)
        } else {
            None
        };

        let mut operator = None;
        for (prefix, op) in [
            ("<=", Operator::LessOrEqual),
            (">=", Operator::GreaterOrEqual),
            ("<", Operator::Less),
            (">", Operator::Greater),
            ("=", Operator::Equal),
            ("~", Operator::Approximate),
        ] {
            if let Some(r) = rest.strip_prefix(prefix) {
                rest = r;
                operator = Some(op);
                break;
            }
        }

        let mut use_deps = None;
        if let Some(r) = rest.strip_suffix(']') {
            let open = r.rfind('[').ok_or_else(|| invalid("unbalanced USE dependency"))?;
            use_deps = Some(r[open + 1..].to_string());
            rest = &r[..open];
        }

        let mut repository = None;
        if let Some((r, repo)) = rest.split_once("::") {
            if !REPO_RE.is_match(repo) {
                return Err(invalid("invalid repository name"));
            }
            repository = Some(repo.to_string());
            rest = r;
        }

        let (mut slot, mut subslot, mut slot_operator) = (None, None, None);
        if let Some((r, slot_str)) = rest.split_once(':') {
            rest = r;
            let slot_str = match slot_str {
                "=" => {
                    slot_operator = Some(SlotOperator::Equal);
                    ""
                }
                "*" => {
                    slot_operator = Some(SlotOperator::Star);
                    ""
                }
                other => match other.strip_suffix('=') {
                    Some(name) => {
                        slot_operator = Some(SlotOperator::Equal);
                        name
                    }
                    None => other,
                },
            };
            if !slot_str.is_empty() {
                let (name, sub) = match slot_str.split_once('/') {
                    Some((name, sub)) => (name, Some(sub)),
                    None => (slot_str, None),
                };
                if !SLOT_RE.is_match(name) || sub.is_some_and(|s| !SLOT_RE.is_match(s)) {
                    return Err(invalid("invalid slot"));
                }
                slot = Some(name.to_string());
                subslot = sub.map(str::to_string);
            }
        }

        if operator == Some(Operator::Equal) {
            if let Some(r) = rest.strip_suffix('*') {
                rest = r;
                operator = Some(Operator::EqualGlob);
            }
        }

        let (name, version) = match split_version(rest) {
            Some((name, version)) => (name, Some(version)),
            None => (rest, None),
        };

        match (operator.is_some(), version.is_some()) {
            (true, false) => return Err(invalid("version operator without version")),
            (false, true) => return Err(invalid("version without operator")),
            _ => {}
        }

        let key = PackageKey::parse(name).map_err(|_| invalid("invalid package key"))?;

        Ok(Self {
            blocker,
            operator,
            key,
            version,
            slot,
            subslot,
            slot_operator,
            repository,
            use_deps,
        })
    }

    /// An atom matching every package with `pkg`'s key
    pub fn unversioned_of(pkg: &dyn Package) -> Self {
        Self::from_key(pkg.key().clone())
    }

    /// An atom matching every package in `pkg`'s key and slot
    pub fn slotted_of(pkg: &dyn Package) -> Self {
        let mut atom = Self::from_key(pkg.key().clone());
        atom.slot = Some(pkg.slot().to_string());
        atom
    }

    fn from_key(key: PackageKey) -> Self {
        Self {
            blocker: None,
            operator: None,
            key,
            version: None,
            slot: None,
            subslot: None,
            slot_operator: None,
            repository: None,
            use_deps: None,
        }
    }

    /// This atom without blocker, version, slot and repository restrictions
    pub fn unversioned(&self) -> Self {
        Self::from_key(self.key.clone())
    }

    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    pub fn blocker(&self) -> Option<Blocker> {
        self.blocker
    }

    pub fn slot_operator(&self) -> Option<SlotOperator> {
        self.slot_operator
    }

    /// Raw USE dependency block; kept for display, not evaluated by `contains`
    pub fn use_deps(&self) -> Option<&str> {
        self.use_deps.as_deref()
    }

    /// Complete this atom against a package set
    ///
    /// The best package the atom selects supplies the full key, so an
    /// unqualified `foo` becomes `app-misc/foo`. Fails like `select` when the
    /// atom matches nothing or several keys.
    pub fn associate<S: PackageSet>(&self, set: &S) -> Result<DepAtom> {
        let pkg = set.select(AtomMatcher::new(self.clone()))?;
        let mut atom = self.clone();
        atom.key = pkg.key().clone();
        Ok(atom)
    }

    fn matches(&self, pkg: &dyn Package) -> bool {
        let key_matches = if self.key.is_complete() {
            pkg.key() == &self.key
        } else {
            pkg.key().package() == self.key.package()
        };
        if !key_matches {
            return false;
        }

        if let (Some(op), Some(wanted)) = (self.operator, &self.version) {
            let have = pkg.version();
            let ok = match op {
                Operator::Less => have < wanted,
                Operator::LessOrEqual => have <= wanted,
                Operator::Equal => have == wanted,
                Operator::EqualGlob => have.matches_glob(&wanted.to_string()),
                Operator::Approximate => have.cmp_without_revision(wanted) == Ordering::Equal,
                Operator::GreaterOrEqual => have >= wanted,
                Operator::Greater => have > wanted,
            };
            if !ok {
                return false;
            }
        }

        if self.slot.as_deref().is_some_and(|s| s != pkg.slot()) {
            return false;
        }
        if self.subslot.as_deref().is_some_and(|s| s != pkg.subslot()) {
            return false;
        }
        if let Some(repo) = &self.repository {
            if pkg.repository() != Some(repo.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Split `name-1.2-r3` into name and version at the first hyphen that
/// starts a valid version
fn split_version(s: &str) -> Option<(&str, Version)> {
    s.match_indices('-').find_map(|(i, _)| {
        let (name, ver) = (&s[..i], &s[i + 1..]);
        if name.is_empty() {
            return None;
        }
        Version::parse(ver).ok().map(|v| (name, v))
    })
}

impl Atom for DepAtom {
    fn contains(&self, pkg: &dyn Package) -> bool {
        self.matches(pkg) != self.blocking()
    }

    fn key(&self) -> &PackageKey {
        &self.key
    }

    fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    fn subslot(&self) -> Option<&str> {
        self.subslot.as_deref()
    }

    fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    fn blocking(&self) -> bool {
        self.blocker.is_some()
    }
}

impl fmt::Display for DepAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.blocker {
            Some(Blocker::Strong) => f.write_str("!!")?,
            Some(Blocker::Weak) => f.write_str("!")?,
            None => {}
        }
        if let Some(op) = self.operator {
            f.write_str(op.prefix())?;
        }
        f.write_str(self.key.as_str())?;
        if let Some(version) = &self.version {
            write!(f, "-{}", version)?;
        }
        if self.operator == Some(Operator::EqualGlob) {
            f.write_str("*")?;
        }
        if self.slot.is_some() || self.slot_operator.is_some() {
            f.write_str(":")?;
            if let Some(slot) = &self.slot {
                f.write_str(slot)?;
            }
            if let Some(subslot) = &self.subslot {
                write!(f, "/{}", subslot)?;
            }
            match self.slot_operator {
                Some(SlotOperator::Equal) => f.write_str("=")?,
                Some(SlotOperator::Star) => f.write_str("*")?,
                None => {}
            }
        }
        if let Some(repo) = &self.repository {
            write!(f, "::{}", repo)?;
        }
        if let Some(use_deps) = &self.use_deps {
            write!(f, "[{}]", use_deps)?;
        }
        Ok(())
    }
}

impl FromStr for DepAtom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DepAtom {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<DepAtom> for String {
    fn from(atom: DepAtom) -> Self {
        atom.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::memory::MemoryPackage;

    fn pkg(key: &str, version: &str, slot: &str) -> MemoryPackage {
        let mut p = MemoryPackage::new(key, version).unwrap();
        p.slot = slot.to_string();
        p
    }

    #[test]
    fn test_invalid_atoms() {
        for s in ["<>foo", "=bar", "*/*::baz", "", "foo/bar-1", "a/b/c", ">=foo/bar", "foo[ssl"] {
            assert!(DepAtom::parse(s).is_err(), "{:?} should be rejected", s);
        }
    }

    #[test]
    fn test_stringification_roundtrip() {
        for s in [
            "foo/bar",
            ">=baz/bar-100",
            "foo/baz:10",
            "bar/baz::foo",
            ">=foo/fooz-29.5:bazmania",
            "~baz/inga-4.1:2::foo",
            "!!<dev-libs/openssl-3:0/3=",
            "=app-misc/foo-1.2*",
            "dev-lang/python:3.12[sqlite,-tk]",
            "dev-libs/glib:=",
        ] {
            assert_eq!(DepAtom::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_atom_parts() {
        let a = DepAtom::parse(">=app-foo/bar-19-r1:5::baz").unwrap();
        assert_eq!(a.key().category(), Some("app-foo"));
        assert_eq!(a.key().package(), "bar");
        assert_eq!(a.key().as_str(), "app-foo/bar");
        assert_eq!(a.version().unwrap().without_revision(), "19");
        assert_eq!(a.version().unwrap().revision(), 1);
        assert_eq!(a.slot(), Some("5"));
        assert_eq!(a.repository(), Some("baz"));
        assert!(a.complete());
        assert!(!a.blocking());
    }

    #[test]
    fn test_atom_parts_incomplete() {
        let a = DepAtom::parse(">=bar-19-r1:5::baz").unwrap();
        assert!(a.key().category().is_none());
        assert_eq!(a.key().package(), "bar");
        assert!(!a.complete());
        assert_eq!(a.version().unwrap().to_string(), "19-r1");

        let a = DepAtom::parse("bar").unwrap();
        assert!(a.version().is_none());
        assert!(a.slot().is_none());
        assert!(a.repository().is_none());
    }

    #[test]
    fn test_hyphenated_names() {
        let a = DepAtom::parse("=x11-libs/gtk+-3.24.38").unwrap();
        assert_eq!(a.key().as_str(), "x11-libs/gtk+");
        let a = DepAtom::parse(">=dev-python/typing-extensions-4").unwrap();
        assert_eq!(a.key().package(), "typing-extensions");
    }

    #[test]
    fn test_glob_reaches_suffixed_versions() {
        let glob = DepAtom::parse("=app-misc/foo-1.2*").unwrap();
        assert!(glob.contains(&pkg("app-misc/foo", "1.2_rc1", "0")));
        assert!(glob.contains(&pkg("app-misc/foo", "1.2.5-r2", "0")));
        assert!(!glob.contains(&pkg("app-misc/foo", "1.20", "0")));
        assert!(!glob.contains(&pkg("app-misc/foo", "1.1_p3", "0")));
    }

    #[test]
    fn test_contains_versions() {
        let p = pkg("app-misc/foo", "1.2-r1", "0");
        let yes = [
            "app-misc/foo",
            "foo",
            ">=app-misc/foo-1.2",
            "<app-misc/foo-1.3",
            "=app-misc/foo-1.2-r1",
            "~app-misc/foo-1.2",
            "=app-misc/foo-1*",
            "app-misc/foo:0",
        ];
        for s in yes {
            assert!(DepAtom::parse(s).unwrap().contains(&p), "{} should match", s);
        }
        let no = [
            "app-misc/bar",
            "other/foo",
            ">app-misc/foo-1.2-r1",
            "=app-misc/foo-1.2",
            "app-misc/foo:1",
            "app-misc/foo::gentoo",
        ];
        for s in no {
            assert!(!DepAtom::parse(s).unwrap().contains(&p), "{} should not match", s);
        }
    }

    #[test]
    fn test_blocker_inverts() {
        let p = pkg("app-misc/foo", "1", "0");
        let a = DepAtom::parse("!app-misc/foo").unwrap();
        assert!(a.blocking());
        assert!(!a.contains(&p));
        assert!(DepAtom::parse("!app-misc/bar").unwrap().contains(&p));
    }

    #[test]
    fn test_derived_atoms() {
        let p = pkg("app-misc/foo", "1", "2");
        assert_eq!(DepAtom::slotted_of(&p).to_string(), "app-misc/foo:2");
        assert_eq!(DepAtom::unversioned_of(&p).to_string(), "app-misc/foo");
        let a = DepAtom::parse("!>=app-misc/foo-1:2").unwrap();
        assert_eq!(a.unversioned().to_string(), "app-misc/foo");
    }

    #[test]
    fn test_key_ordering_is_canonical_string() {
        let a = PackageKey::parse("app-misc/foo").unwrap();
        let b = PackageKey::parse("app-misc/foo-bar").unwrap();
        let c = PackageKey::parse("app-misc2/a").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_ne!(a, PackageKey::parse("foo").unwrap());
    }
}
