// src/packages/mod.rs

//! Package and atom types
//!
//! `Package` and `Atom` are the object-safe interfaces every backend
//! implements; `MemoryPackage` and `DepAtom` are the concrete types used by
//! JSON repositories.

pub mod atom;
pub mod attr;
pub mod memory;
pub mod meta;
pub mod traits;

pub use atom::{Blocker, DepAtom, Operator, PackageKey, SlotOperator};
pub use attr::AttrValue;
pub use memory::{Description, DependencyClass, MemoryPackage};
pub use meta::{Maintainer, RemoteId, Upstream, UpstreamMaintainer, UseFlag};
pub use traits::{Atom, Package};
