// src/lib.rs

//! pmquery
//!
//! Backend-agnostic package queries for Gentoo-style package managers.
//!
//! # Architecture
//!
//! - Package sets: lazy `PackageSet` collections with filter, best, select,
//!   get, contains and group_by
//! - Matchers: atoms, predicates and keyword attribute tests, AND-composed
//!   into a `Filter`
//! - Dependency trees: `DepSet`/`DepNode` parsed from PMS depset syntax and
//!   resolved against applied USE flags
//! - Repositories: JSON indexes stacked by priority

pub mod config;
pub mod depend;
mod error;
pub mod packages;
pub mod query;
pub mod repository;
pub mod version;

pub use depend::{DepNode, DepSet};
pub use error::{Error, Result};
pub use packages::{Atom, DepAtom, MemoryPackage, Package};
pub use query::{Filter, PackageSet};
pub use repository::{Repository, RepositoryStack};
