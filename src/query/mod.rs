// src/query/mod.rs

//! Package set query algebra
//!
//! A `PackageSet` is a lazy sequence of packages. Filtering decorates a set
//! without touching the backend; only `best`, `select`, `sorted` and
//! `group_by` force a full pass, and `contains`/`is_empty`/`get` stop as soon
//! as they know the answer.
//!
//! Whether a set can be iterated more than once, and whether repeated
//! iteration yields the same order, is up to the backend.

pub mod group;
pub mod matcher;

pub use group::{PackageGroups, PackageList};
pub use matcher::{
    AtomMatcher, AttributeMatch, AttributePath, Filter, Matcher, Predicate, ValueMatcher,
};

use crate::error::{Error, Result};
use crate::packages::traits::{Package, compare_packages};
use std::cmp::Ordering;

/// Boxed package iterator; items fail only when a filter references an
/// unknown attribute
pub type PackageIter<'a, P> = Box<dyn Iterator<Item = Result<&'a P>> + 'a>;

/// A lazily evaluated collection of packages
pub trait PackageSet {
    type Package: Package;

    /// Iterate over the packages in backend-defined order
    fn iter(&self) -> PackageIter<'_, Self::Package>;

    /// Narrow the set with an AND-composed filter
    ///
    /// Nothing is evaluated until the result is consumed; unknown keyword
    /// attributes surface as `AttributeNotFound` at that point.
    fn filter<F: Into<Filter>>(&self, filter: F) -> FilteredPackageSet<'_, Self>
    where
        Self: Sized,
    {
        FilteredPackageSet::new(self, filter.into())
    }

    /// The newest package in the set
    ///
    /// Fails with `EmptySet` on an empty set and with `AmbiguousSet` when the
    /// set holds packages with different keys.
    fn best(&self) -> Result<&Self::Package> {
        best_of(self.iter())
    }

    /// `filter(...).best()` with filter-oriented error messages
    fn select<F: Into<Filter>>(&self, filter: F) -> Result<&Self::Package>
    where
        Self: Sized,
    {
        let filter = filter.into();
        best_of(filtered(self.iter(), &filter)).map_err(|e| match e {
            Error::EmptySet(_) => Error::EmptySet("No packages match the filters.".to_string()),
            Error::AmbiguousSet(_) => Error::AmbiguousSet(
                "Ambiguous filter (matches more than a single package name).".to_string(),
            ),
            other => other,
        })
    }

    /// The single package matching `filter`
    ///
    /// Unlike `select`, two matches are an error even when they share a key.
    fn get<F: Into<Filter>>(&self, filter: F) -> Result<&Self::Package>
    where
        Self: Sized,
    {
        let filter = filter.into();
        let mut it = filtered(self.iter(), &filter);

        let found = it
            .next()
            .transpose()?
            .ok_or_else(|| Error::EmptySet("No packages match the filter.".to_string()))?;
        if it.next().transpose()?.is_some() {
            return Err(Error::AmbiguousSet(
                "Filter matches more than one package.".to_string(),
            ));
        }
        Ok(found)
    }

    /// Whether at least one package matches `filter`
    fn contains<F: Into<Filter>>(&self, filter: F) -> Result<bool>
    where
        Self: Sized,
    {
        let filter = filter.into();
        let first = filtered(self.iter(), &filter).next().transpose()?;
        Ok(first.is_some())
    }

    /// Whether the set yields no packages at all
    fn is_empty(&self) -> Result<bool> {
        Ok(self.iter().next().transpose()?.is_none())
    }

    /// Materialize the set in package order, better packages last
    fn sorted(&self) -> Result<PackageList<'_, Self::Package>> {
        let mut packages = self.iter().collect::<Result<Vec<_>>>()?;
        packages.sort_by(|a, b| compare_packages(*a, *b));
        Ok(PackageList::new(packages))
    }

    /// Partition the set by the values of the named attributes
    fn group_by(&self, criteria: &[&str]) -> Result<PackageGroups<'_, Self::Package>> {
        PackageGroups::collect(self.iter(), criteria)
    }
}

/// A package set narrowed by a filter
#[derive(Debug)]
pub struct FilteredPackageSet<'a, S> {
    src: &'a S,
    filter: Filter,
}

impl<'a, S: PackageSet> FilteredPackageSet<'a, S> {
    fn new(src: &'a S, filter: Filter) -> Self {
        Self { src, filter }
    }

    /// Narrow further; the extra conditions run after the existing ones
    ///
    /// Takes the set by value so `set.filter(a).filter(b)` stays one flat
    /// decorator over the original source.
    pub fn filter<F: Into<Filter>>(self, filter: F) -> Self {
        Self {
            src: self.src,
            filter: self.filter.and(filter.into()),
        }
    }

    pub fn conditions(&self) -> &Filter {
        &self.filter
    }
}

impl<S: PackageSet> PackageSet for FilteredPackageSet<'_, S> {
    type Package = S::Package;

    fn iter(&self) -> PackageIter<'_, Self::Package> {
        Box::new(filtered(self.src.iter(), &self.filter))
    }
}

/// Apply `filter` lazily; packages keep the source's lifetime
fn filtered<'a, 'f, P>(
    src: PackageIter<'a, P>,
    filter: &'f Filter,
) -> impl Iterator<Item = Result<&'a P>> + 'f
where
    P: Package,
    'a: 'f,
{
    src.filter_map(move |item| match item {
        Ok(pkg) => match filter.matches(pkg) {
            Ok(true) => Some(Ok(pkg)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        },
        Err(e) => Some(Err(e)),
    })
}

/// Version-maximal package of a single-key sequence
///
/// The whole sequence is consumed so that filter errors surface before the
/// ambiguity verdict. Equal packages resolve to the later one.
fn best_of<'a, P: Package>(iter: impl Iterator<Item = Result<&'a P>>) -> Result<&'a P> {
    let mut best: Option<&'a P> = None;
    let mut ambiguous = false;

    for pkg in iter {
        let pkg = pkg?;
        best = match best {
            None => Some(pkg),
            Some(current) => {
                if current.key() != pkg.key() {
                    ambiguous = true;
                }
                if compare_packages(pkg, current) == Ordering::Less {
                    Some(current)
                } else {
                    Some(pkg)
                }
            }
        };
    }

    if ambiguous {
        return Err(Error::AmbiguousSet(
            ".best called on a set of differently-named packages".to_string(),
        ));
    }
    best.ok_or_else(|| Error::EmptySet(".best called on an empty set".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::atom::DepAtom;
    use crate::packages::memory::MemoryPackage;
    use crate::packages::traits::Package;
    use crate::repository::Repository;

    fn repo(entries: &[(&str, &str, &str)]) -> Repository {
        let packages = entries
            .iter()
            .map(|(key, version, slot)| {
                let mut p = MemoryPackage::new(key, version).unwrap();
                p.slot = slot.to_string();
                p
            })
            .collect();
        Repository::new("test", 0, packages)
    }

    fn atom(s: &str) -> DepAtom {
        DepAtom::parse(s).unwrap()
    }

    fn versions<S: PackageSet>(set: &S) -> Vec<String> {
        set.iter()
            .map(|p| p.unwrap().version().to_string())
            .collect()
    }

    #[test]
    fn test_best_picks_newest() {
        let r = repo(&[
            ("app/foo", "1.0", "0"),
            ("app/foo", "2.0_rc1", "0"),
            ("app/foo", "1.9-r3", "0"),
        ]);
        assert_eq!(r.best().unwrap().version().to_string(), "2.0_rc1");
    }

    #[test]
    fn test_best_ambiguous_across_keys() {
        let r = repo(&[("app/foo", "1", "0"), ("app/bar", "1", "0")]);
        assert!(r.best().unwrap_err().is_ambiguous());
    }

    #[test]
    fn test_best_empty() {
        let r = repo(&[]);
        assert!(r.best().unwrap_err().is_empty_set());
    }

    #[test]
    fn test_best_tolerates_duplicates() {
        let r = repo(&[("app/foo", "1", "0"), ("app/foo", "1", "0")]);
        assert!(r.best().is_ok());
    }

    #[test]
    fn test_select_rephrases_errors() {
        let r = repo(&[("app/foo", "1", "0"), ("app/bar", "1", "0")]);

        let err = r.select(atom("app/baz")).unwrap_err();
        assert!(err.is_empty_set());
        assert!(err.to_string().contains("No packages match the filters."));

        let err = r.select(Filter::new().attr("slot", "0")).unwrap_err();
        assert!(err.is_ambiguous());
        assert!(err.to_string().contains("Ambiguous filter"));

        let best = r.select(atom("foo")).unwrap();
        assert_eq!(best.key().as_str(), "app/foo");
    }

    #[test]
    fn test_getitem_requires_exactly_one() {
        let r = repo(&[("app/foo", "1", "0"), ("app/foo", "2", "0"), ("app/bar", "1", "0")]);

        assert!(r.get(atom("app/foo")).unwrap_err().is_ambiguous());
        assert!(r.get(atom("app/baz")).unwrap_err().is_empty_set());
        assert_eq!(r.get(atom("=app/foo-2")).unwrap().version().to_string(), "2");
        // select tolerates the same-key pair get refuses
        assert_eq!(r.select(atom("app/foo")).unwrap().version().to_string(), "2");
    }

    #[test]
    fn test_chained_filter_equals_combined() {
        let r = repo(&[
            ("app/foo", "1", "0"),
            ("app/foo", "2", "1"),
            ("app/foo", "3", "1"),
            ("app/bar", "2", "1"),
        ]);

        let chained = r.filter(atom("app/foo")).filter(Filter::new().attr("slot", "1"));
        let combined = r.filter(Filter::new().atom(atom("app/foo")).attr("slot", "1"));
        assert_eq!(versions(&chained), versions(&combined));
        assert_eq!(versions(&chained), vec!["2", "3"]);
        assert_eq!(chained.conditions().len(), 2);

        let best = r
            .filter(atom("app/foo"))
            .filter(atom("<app/foo-3"))
            .filter(Filter::new().attr("slot", "1"))
            .best()
            .unwrap()
            .version()
            .to_string();
        assert_eq!(best, "2");
    }

    #[test]
    fn test_bool_and_contains() {
        let r = repo(&[("app/foo", "1", "0")]);
        assert!(!r.is_empty().unwrap());
        assert!(r.filter(atom("app/bar")).is_empty().unwrap());
        assert!(r.contains(atom("foo")).unwrap());
        assert!(!r.contains(atom(">app/foo-1")).unwrap());
        assert!(repo(&[]).is_empty().unwrap());
    }

    #[test]
    fn test_emptiness_matches_length() {
        let r = repo(&[("app/foo", "1", "0"), ("app/foo", "2", "0")]);
        for a in ["app/foo", "app/bar", "=app/foo-2"] {
            let set = r.filter(atom(a));
            let len = set.iter().count();
            assert_eq!(len == 0, set.is_empty().unwrap());
        }
    }

    #[test]
    fn test_unknown_attribute_is_lazy() {
        let r = repo(&[("app/foo", "1", "0")]);
        let set = r.filter(Filter::new().attr("nonexistent", "x"));
        let err = set.iter().next().unwrap().unwrap_err();
        assert!(matches!(err, Error::AttributeNotFound(_)));
        assert!(matches!(set.best(), Err(Error::AttributeNotFound(_))));
        assert!(matches!(
            r.contains(Filter::new().attr("nonexistent", "x")),
            Err(Error::AttributeNotFound(_))
        ));
    }

    #[test]
    fn test_contains_short_circuits() {
        use std::cell::Cell;
        use std::rc::Rc;

        let r = repo(&[("app/foo", "1", "0"), ("app/foo", "2", "0"), ("app/foo", "3", "0")]);
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let found = r
            .contains(Filter::new().predicate(move |_| {
                counter.set(counter.get() + 1);
                true
            }))
            .unwrap();
        assert!(found);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_is_empty_short_circuits() {
        use std::cell::Cell;
        use std::rc::Rc;

        let r = repo(&[("app/foo", "1", "0"), ("app/foo", "2", "0"), ("app/foo", "3", "0")]);
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let set = r.filter(Filter::new().predicate(move |_| {
            counter.set(counter.get() + 1);
            true
        }));
        assert_eq!(seen.get(), 0);
        assert!(!set.is_empty().unwrap());
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_sorted_puts_best_last() {
        let r = repo(&[("app/foo", "2", "0"), ("app/foo", "1", "0"), ("app/foo", "10", "0")]);
        let sorted = r.sorted().unwrap();
        assert_eq!(versions(&sorted), vec!["1", "2", "10"]);
    }
}
