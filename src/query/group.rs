// src/query/group.rs

//! Materialized package lists and grouping

use crate::error::{Error, Result};
use crate::packages::attr::AttrValue;
use crate::packages::traits::Package;
use crate::query::matcher::AttributePath;
use crate::query::{PackageIter, PackageSet};
use std::collections::HashMap;

/// A package set over an already collected list of packages
#[derive(Debug)]
pub struct PackageList<'a, P> {
    packages: Vec<&'a P>,
}

impl<'a, P: Package> PackageList<'a, P> {
    pub fn new(packages: Vec<&'a P>) -> Self {
        Self { packages }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn as_slice(&self) -> &[&'a P] {
        &self.packages
    }
}

impl<P: Package> PackageSet for PackageList<'_, P> {
    type Package = P;

    fn iter(&self) -> PackageIter<'_, P> {
        let packages: &[&P] = &self.packages;
        Box::new(packages.iter().map(|p| Ok::<_, Error>(*p)))
    }
}

/// Packages partitioned by a tuple of attribute values
///
/// Groups keep the order in which their first package was seen.
#[derive(Debug)]
pub struct PackageGroups<'a, P> {
    groups: Vec<(Vec<AttrValue>, PackageList<'a, P>)>,
}

impl<'a, P: Package> PackageGroups<'a, P> {
    /// Partition `iter` in a single pass
    pub(crate) fn collect(iter: PackageIter<'a, P>, criteria: &[&str]) -> Result<Self> {
        let paths: Vec<AttributePath> = criteria.iter().map(|c| AttributePath::new(c)).collect();
        let mut index: HashMap<Vec<AttrValue>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<AttrValue>, PackageList<'a, P>)> = Vec::new();

        for pkg in iter {
            let pkg = pkg?;
            let key = paths
                .iter()
                .map(|path| path.resolve(pkg))
                .collect::<Result<Vec<_>>>()?;

            match index.get(&key) {
                Some(&i) => groups[i].1.packages.push(pkg),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, PackageList::new(vec![pkg])));
                }
            }
        }

        Ok(Self { groups })
    }

    /// `(key tuple, group)` pairs
    pub fn items(&self) -> impl Iterator<Item = (&[AttrValue], &PackageList<'a, P>)> {
        self.groups.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// The groups alone
    pub fn iter(&self) -> impl Iterator<Item = &PackageList<'a, P>> {
        self.groups.iter().map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &[AttrValue]> {
        self.groups.iter().map(|(k, _)| k.as_slice())
    }

    pub fn get(&self, key: &[AttrValue]) -> Option<&PackageList<'a, P>> {
        self.groups
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'g, 'a, P: Package> IntoIterator for &'g PackageGroups<'a, P> {
    type Item = &'g PackageList<'a, P>;
    type IntoIter = Box<dyn Iterator<Item = &'g PackageList<'a, P>> + 'g>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.groups.iter().map(|(_, v)| v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::memory::MemoryPackage;
    use crate::repository::Repository;

    fn repo() -> Repository {
        let packages = [("1", "0"), ("2", "0"), ("3", "1"), ("4", "2"), ("5", "2")]
            .iter()
            .map(|(version, slot)| {
                let mut p = MemoryPackage::new("app/foo", version).unwrap();
                p.slot = slot.to_string();
                p
            })
            .collect();
        Repository::new("test", 0, packages)
    }

    #[test]
    fn test_group_by_slot() {
        let r = repo();
        let groups = r.group_by(&["slot"]).unwrap();
        assert_eq!(groups.len(), 3);

        let sizes: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(sizes, 5);

        let keys: Vec<String> = groups.keys().map(|k| k[0].to_string()).collect();
        assert_eq!(keys, vec!["0", "1", "2"]);

        let slot2 = groups.get(&[AttrValue::from("2")]).unwrap();
        assert_eq!(slot2.best().unwrap().version().to_string(), "5");
    }

    #[test]
    fn test_group_by_multiple_criteria() {
        let r = repo();
        let groups = r.group_by(&["key", "slot"]).unwrap();
        for (key, group) in groups.items() {
            assert_eq!(key.len(), 2);
            assert_eq!(key[0], AttrValue::from("app/foo"));
            assert!(!group.is_empty().unwrap());
        }
        assert_eq!((&groups).into_iter().count(), 3);
    }

    #[test]
    fn test_group_by_unknown_attribute() {
        let r = repo();
        assert!(matches!(
            r.group_by(&["frobnicate"]),
            Err(Error::AttributeNotFound(_))
        ));
    }
}
