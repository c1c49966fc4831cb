// src/query/matcher.rs

//! Package matchers
//!
//! A `Matcher` answers "does this package match?" for three shapes of
//! condition: an arbitrary predicate, an atom membership test, and a keyword
//! attribute comparison. Matchers never mutate the package they inspect.

use crate::error::{Error, Result};
use crate::packages::atom::DepAtom;
use crate::packages::attr::AttrValue;
use crate::packages::traits::{Atom, Package};
use std::cell::OnceCell;
use std::fmt;
use tracing::debug;

/// A condition over packages
pub trait Matcher {
    /// Whether `pkg` satisfies the condition
    ///
    /// Fails only when the condition references an attribute the package
    /// does not have.
    fn matches(&self, pkg: &dyn Package) -> Result<bool>;
}

/// Matcher wrapping an arbitrary `Fn(&dyn Package) -> bool`
pub struct Predicate<F>(F);

impl<F> Predicate<F>
where
    F: Fn(&dyn Package) -> bool,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Matcher for Predicate<F>
where
    F: Fn(&dyn Package) -> bool,
{
    fn matches(&self, pkg: &dyn Package) -> Result<bool> {
        Ok((self.0)(pkg))
    }
}

/// Matcher using an atom's membership test
#[derive(Debug, Clone)]
pub struct AtomMatcher<A>(A);

impl<A: Atom> AtomMatcher<A> {
    pub fn new(atom: A) -> Self {
        Self(atom)
    }

    pub fn atom(&self) -> &A {
        &self.0
    }
}

impl<A: Atom> Matcher for AtomMatcher<A> {
    fn matches(&self, pkg: &dyn Package) -> Result<bool> {
        Ok(self.0.contains(pkg))
    }
}

/// A flat keyword name resolved to a structured attribute path
///
/// `description_short` may mean the literal attribute `description_short` or
/// the nested `description.short`. The literal spelling is tried first, then
/// each split after a namespace the package declares through
/// `Package::attribute_namespaces`, deepest namespace first. The remainder
/// after the namespace stays literal, so `metadata_SRC_URI` reaches
/// `metadata.SRC_URI` however many underscores the variable name holds.
///
/// The first path that resolves on a real package is remembered; packages
/// lacking the remembered path fall back to a fresh search.
pub struct AttributePath {
    name: String,
    resolved: OnceCell<String>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resolved: OnceCell::new(),
        }
    }

    /// The keyword name as given
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The structured path this keyword resolved to, once known
    pub fn resolved_path(&self) -> Option<&str> {
        self.resolved.get().map(String::as_str)
    }

    /// Fetch the attribute value from `pkg`
    pub fn resolve(&self, pkg: &dyn Package) -> Result<AttrValue> {
        if let Some(path) = self.resolved_path() {
            if let Some(value) = pkg.attribute(path) {
                return Ok(value);
            }
        }

        for path in path_candidates(&self.name, pkg.attribute_namespaces()) {
            if let Some(value) = pkg.attribute(&path) {
                if self.resolved.get().is_none() {
                    debug!("Resolved keyword '{}' to attribute path '{}'", self.name, path);
                    let _ = self.resolved.set(path);
                }
                return Ok(value);
            }
        }

        Err(Error::AttributeNotFound(format!(
            "no attribute '{}' on package {}",
            self.name,
            pkg.key()
        )))
    }
}

impl fmt::Debug for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributePath")
            .field("name", &self.name)
            .field("resolved", &self.resolved_path())
            .finish()
    }
}

/// Structured spellings of `name`, literal first
fn path_candidates(name: &str, namespaces: &[&str]) -> Vec<String> {
    let mut matching: Vec<(&str, &str)> = namespaces
        .iter()
        .filter_map(|ns| {
            let flat = ns.replace('.', "_");
            let rest = name.strip_prefix(flat.as_str())?.strip_prefix('_')?;
            (!rest.is_empty()).then_some((*ns, rest))
        })
        .collect();
    // deepest namespace first
    matching.sort_by_key(|(ns, _)| std::cmp::Reverse(ns.len()));

    let mut candidates = vec![name.to_string()];
    candidates.extend(matching.into_iter().map(|(ns, rest)| format!("{}.{}", ns, rest)));
    candidates
}

/// Comparison applied to a single attribute value
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    /// Exact equality
    Equals(AttrValue),
    /// Full match against the stringified value
    Regex(regex::Regex),
    /// At least one candidate matches an element of a multi-valued attribute
    Contains(Vec<ValueMatcher>),
}

impl ValueMatcher {
    /// Build a regex matcher that must match the whole value
    pub fn regex(pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        regex::Regex::new(&anchored)
            .map(ValueMatcher::Regex)
            .map_err(|e| Error::InvalidExpression(format!("bad regex '{}': {}", pattern, e)))
    }

    /// Build a membership matcher from candidates
    pub fn contains<I, V>(candidates: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ValueMatcher>,
    {
        ValueMatcher::Contains(candidates.into_iter().map(Into::into).collect())
    }

    pub fn test(&self, value: &AttrValue) -> bool {
        match self {
            ValueMatcher::Equals(expected) => expected == value,
            ValueMatcher::Regex(re) => re.is_match(&value.to_string()),
            ValueMatcher::Contains(candidates) => match value {
                AttrValue::List(items) => candidates
                    .iter()
                    .any(|c| items.iter().any(|item| c.test(item))),
                AttrValue::Str(s) => candidates.iter().any(|c| match c {
                    ValueMatcher::Equals(AttrValue::Str(needle)) => s.contains(needle.as_str()),
                    other => other.test(value),
                }),
                _ => false,
            },
        }
    }
}

impl From<AttrValue> for ValueMatcher {
    fn from(v: AttrValue) -> Self {
        ValueMatcher::Equals(v)
    }
}

impl From<&str> for ValueMatcher {
    fn from(s: &str) -> Self {
        ValueMatcher::Equals(AttrValue::from(s))
    }
}

impl From<String> for ValueMatcher {
    fn from(s: String) -> Self {
        ValueMatcher::Equals(AttrValue::from(s))
    }
}

impl From<i64> for ValueMatcher {
    fn from(i: i64) -> Self {
        ValueMatcher::Equals(AttrValue::Int(i))
    }
}

impl From<regex::Regex> for ValueMatcher {
    fn from(re: regex::Regex) -> Self {
        ValueMatcher::Regex(re)
    }
}

/// Keyword attribute matcher: `name` resolved through `AttributePath`
#[derive(Debug)]
pub struct AttributeMatch {
    path: AttributePath,
    value: ValueMatcher,
}

impl AttributeMatch {
    pub fn new(name: &str, value: impl Into<ValueMatcher>) -> Self {
        Self {
            path: AttributePath::new(name),
            value: value.into(),
        }
    }

    pub fn path(&self) -> &AttributePath {
        &self.path
    }
}

impl Matcher for AttributeMatch {
    fn matches(&self, pkg: &dyn Package) -> Result<bool> {
        let value = self.path.resolve(pkg)?;
        Ok(self.value.test(&value))
    }
}

/// An AND-composed list of matchers
///
/// Matchers run in insertion order and stop at the first mismatch, so
/// `a.and(b)` and a filter built from `a` then `b` behave identically.
#[derive(Default)]
pub struct Filter {
    matchers: Vec<Box<dyn Matcher>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matcher<M: Matcher + 'static>(mut self, matcher: M) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    pub fn atom<A: Atom + 'static>(self, atom: A) -> Self {
        self.matcher(AtomMatcher::new(atom))
    }

    pub fn predicate<F>(self, f: F) -> Self
    where
        F: Fn(&dyn Package) -> bool + 'static,
    {
        self.matcher(Predicate::new(f))
    }

    /// Add a keyword attribute condition; unknown names fail lazily
    pub fn attr(self, name: &str, value: impl Into<ValueMatcher>) -> Self {
        self.matcher(AttributeMatch::new(name, value))
    }

    /// Append all of `other`'s matchers after this filter's
    pub fn and(mut self, other: Filter) -> Self {
        self.matchers.extend(other.matchers);
        self
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for Filter {
    fn matches(&self, pkg: &dyn Package) -> Result<bool> {
        for m in &self.matchers {
            if !m.matches(pkg)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("matchers", &self.matchers.len())
            .finish()
    }
}

impl From<DepAtom> for Filter {
    fn from(atom: DepAtom) -> Self {
        Filter::new().atom(atom)
    }
}

impl From<&DepAtom> for Filter {
    fn from(atom: &DepAtom) -> Self {
        Filter::new().atom(atom.clone())
    }
}

impl<A: Atom + 'static> From<AtomMatcher<A>> for Filter {
    fn from(m: AtomMatcher<A>) -> Self {
        Filter::new().matcher(m)
    }
}

impl<F> From<Predicate<F>> for Filter
where
    F: Fn(&dyn Package) -> bool + 'static,
{
    fn from(m: Predicate<F>) -> Self {
        Filter::new().matcher(m)
    }
}

impl From<AttributeMatch> for Filter {
    fn from(m: AttributeMatch) -> Self {
        Filter::new().matcher(m)
    }
}
