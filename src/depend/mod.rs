// src/depend/mod.rs

//! Dependency expression trees
//!
//! A depset is an implicit all-of group over nodes: leaves (atoms, license
//! names, flags), nested all-of / any-of / exactly-one-of / at-most-one-of
//! groups, and USE-conditional blocks. Trees are immutable once built.
//!
//! Two read-only views exist:
//! - `iter()` walks one level of children, leaving conditionals and groups
//!   unexpanded.
//! - `without_conditionals()` evaluates every conditional against a set of
//!   applied USE flags, splicing enabled blocks into their parent and dropping
//!   disabled ones. Groups stay groups; choosing a member of an any-of group is
//!   left to the caller.

pub mod parser;

pub use parser::{DepLeaf, DepParser, PmsDepParser};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// The set of USE flags enabled for one package instance
pub trait AppliedUse {
    fn is_enabled(&self, flag: &str) -> bool;
}

impl AppliedUse for HashSet<String> {
    fn is_enabled(&self, flag: &str) -> bool {
        self.contains(flag)
    }
}

impl AppliedUse for HashSet<&str> {
    fn is_enabled(&self, flag: &str) -> bool {
        self.contains(flag)
    }
}

impl AppliedUse for BTreeSet<String> {
    fn is_enabled(&self, flag: &str) -> bool {
        self.contains(flag)
    }
}

impl AppliedUse for [String] {
    fn is_enabled(&self, flag: &str) -> bool {
        self.iter().any(|f| f == flag)
    }
}

impl AppliedUse for [&str] {
    fn is_enabled(&self, flag: &str) -> bool {
        self.contains(&flag)
    }
}

impl AppliedUse for Vec<String> {
    fn is_enabled(&self, flag: &str) -> bool {
        self.as_slice().is_enabled(flag)
    }
}

impl<T: AppliedUse + ?Sized> AppliedUse for &T {
    fn is_enabled(&self, flag: &str) -> bool {
        (**self).is_enabled(flag)
    }
}

/// Adapts a closure, e.g. one consulting a package's USE expansion
pub struct UseFn<F>(pub F);

impl<F: Fn(&str) -> bool> AppliedUse for UseFn<F> {
    fn is_enabled(&self, flag: &str) -> bool {
        (self.0)(flag)
    }
}

/// Discriminant of a `DepNode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    Atom,
    AllOf,
    AnyOf,
    ExactlyOneOf,
    AtMostOneOf,
    Conditional,
}

/// One node of a dependency expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepNode<A> {
    /// A leaf (atom, license name, flag name)
    Atom(A),
    /// `( ... )`
    AllOf(Vec<DepNode<A>>),
    /// `|| ( ... )`
    AnyOf(Vec<DepNode<A>>),
    /// `^^ ( ... )`
    ExactlyOneOf(Vec<DepNode<A>>),
    /// `?? ( ... )`
    AtMostOneOf(Vec<DepNode<A>>),
    /// `flag? ( ... )` or `!flag? ( ... )`
    Conditional {
        flag: String,
        negate: bool,
        children: Vec<DepNode<A>>,
    },
}

impl<A> DepNode<A> {
    pub fn kind(&self) -> DepKind {
        match self {
            DepNode::Atom(_) => DepKind::Atom,
            DepNode::AllOf(_) => DepKind::AllOf,
            DepNode::AnyOf(_) => DepKind::AnyOf,
            DepNode::ExactlyOneOf(_) => DepKind::ExactlyOneOf,
            DepNode::AtMostOneOf(_) => DepKind::AtMostOneOf,
            DepNode::Conditional { .. } => DepKind::Conditional,
        }
    }

    /// Direct children; empty for leaves
    pub fn children(&self) -> &[DepNode<A>] {
        match self {
            DepNode::Atom(_) => &[],
            DepNode::AllOf(children)
            | DepNode::AnyOf(children)
            | DepNode::ExactlyOneOf(children)
            | DepNode::AtMostOneOf(children)
            | DepNode::Conditional { children, .. } => children,
        }
    }

    /// One-level walk over the children, nothing expanded
    pub fn iter(&self) -> std::slice::Iter<'_, DepNode<A>> {
        self.children().iter()
    }

    pub fn as_atom(&self) -> Option<&A> {
        match self {
            DepNode::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// For conditionals, whether the condition holds under `applied`
    pub fn enabled<U: AppliedUse + ?Sized>(&self, applied: &U) -> Option<bool> {
        match self {
            DepNode::Conditional { flag, negate, .. } => {
                Some(*negate != applied.is_enabled(flag))
            }
            _ => None,
        }
    }

    /// Whether any conditional remains anywhere below (or at) this node
    pub fn has_conditionals(&self) -> bool {
        matches!(self, DepNode::Conditional { .. })
            || self.children().iter().any(DepNode::has_conditionals)
    }
}

impl<A: Clone> DepNode<A> {
    /// The nodes this one contributes to its parent once conditionals are
    /// resolved: itself (rebuilt), the spliced children of an enabled
    /// conditional, or nothing for a disabled one
    pub fn without_conditionals<U: AppliedUse + ?Sized>(&self, applied: &U) -> Vec<DepNode<A>> {
        let mut out = Vec::new();
        self.resolve_into(applied, &mut out);
        out
    }

    fn resolve_into<U: AppliedUse + ?Sized>(&self, applied: &U, out: &mut Vec<DepNode<A>>) {
        match self {
            DepNode::Atom(a) => out.push(DepNode::Atom(a.clone())),
            DepNode::AllOf(c) => out.push(DepNode::AllOf(resolve_all(c, applied))),
            DepNode::AnyOf(c) => out.push(DepNode::AnyOf(resolve_all(c, applied))),
            DepNode::ExactlyOneOf(c) => out.push(DepNode::ExactlyOneOf(resolve_all(c, applied))),
            DepNode::AtMostOneOf(c) => out.push(DepNode::AtMostOneOf(resolve_all(c, applied))),
            DepNode::Conditional {
                flag,
                negate,
                children,
            } => {
                if *negate != applied.is_enabled(flag) {
                    for child in children {
                        child.resolve_into(applied, out);
                    }
                }
            }
        }
    }
}

fn resolve_all<A: Clone, U: AppliedUse + ?Sized>(
    nodes: &[DepNode<A>],
    applied: &U,
) -> Vec<DepNode<A>> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        node.resolve_into(applied, &mut out);
    }
    out
}

fn write_nodes<A: fmt::Display>(f: &mut fmt::Formatter<'_>, nodes: &[DepNode<A>]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", node)?;
    }
    Ok(())
}

fn write_group<A: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    nodes: &[DepNode<A>],
) -> fmt::Result {
    f.write_str(prefix)?;
    f.write_str("( ")?;
    write_nodes(f, nodes)?;
    if !nodes.is_empty() {
        f.write_str(" ")?;
    }
    f.write_str(")")
}

impl<A: fmt::Display> fmt::Display for DepNode<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepNode::Atom(a) => write!(f, "{}", a),
            DepNode::AllOf(c) => write_group(f, "", c),
            DepNode::AnyOf(c) => write_group(f, "|| ", c),
            DepNode::ExactlyOneOf(c) => write_group(f, "^^ ", c),
            DepNode::AtMostOneOf(c) => write_group(f, "?? ", c),
            DepNode::Conditional {
                flag,
                negate,
                children,
            } => {
                let prefix = format!("{}{}? ", if *negate { "!" } else { "" }, flag);
                write_group(f, &prefix, children)
            }
        }
    }
}

/// The dependency specification of one variable of one package
///
/// Behaves as an all-of group over its top-level nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepSet<A> {
    children: Vec<DepNode<A>>,
}

impl<A> DepSet<A> {
    pub fn new(children: Vec<DepNode<A>>) -> Self {
        Self { children }
    }

    /// Parse `text` with a backend-supplied parser
    pub fn parse_with<P: DepParser<Leaf = A>>(parser: &P, text: &str) -> crate::Result<Self> {
        parser.parse(text)
    }

    /// One-level walk over the top-level nodes
    pub fn iter(&self) -> std::slice::Iter<'_, DepNode<A>> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_conditionals(&self) -> bool {
        self.children.iter().any(DepNode::has_conditionals)
    }

    /// The whole set as an explicit all-of node
    pub fn into_node(self) -> DepNode<A> {
        DepNode::AllOf(self.children)
    }
}

impl<A: Clone> DepSet<A> {
    /// Resolve every conditional against `applied`
    pub fn without_conditionals<U: AppliedUse + ?Sized>(&self, applied: &U) -> DepSet<A> {
        DepSet::new(resolve_all(&self.children, applied))
    }
}

impl<A> Default for DepSet<A> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<'a, A> IntoIterator for &'a DepSet<A> {
    type Item = &'a DepNode<A>;
    type IntoIter = std::slice::Iter<'a, DepNode<A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

impl<A: fmt::Display> fmt::Display for DepSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::atom::DepAtom;
    use crate::packages::traits::Atom;

    fn parse(text: &str) -> DepSet<DepAtom> {
        PmsDepParser::new().parse(text).unwrap()
    }

    fn no_use() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_flat_atoms_iterate_in_order() {
        let deps = parse("dev-libs/a >=dev-libs/b-2 dev-libs/c:3");
        let keys: Vec<&str> = deps
            .iter()
            .map(|n| n.as_atom().unwrap().key().as_str())
            .collect();
        assert_eq!(keys, vec!["dev-libs/a", "dev-libs/b", "dev-libs/c"]);
    }

    #[test]
    fn test_iter_is_one_level() {
        let deps = parse("ssl? ( dev-libs/openssl ) || ( a/b c/d ) e/f");
        let kinds: Vec<DepKind> = deps.iter().map(DepNode::kind).collect();
        assert_eq!(kinds, vec![DepKind::Conditional, DepKind::AnyOf, DepKind::Atom]);
        assert_eq!(deps.iter().next().unwrap().iter().count(), 1);
    }

    #[test]
    fn test_negated_conditional() {
        let deps = parse("flag? ( a/b ) !flag2? ( c/d )");
        let evaluated = deps.without_conditionals(&no_use());
        assert_eq!(evaluated.len(), 1);
        assert_eq!(evaluated.to_string(), "c/d");

        let both: HashSet<String> = ["flag", "flag2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(deps.without_conditionals(&both).to_string(), "a/b");
    }

    #[test]
    fn test_enabled_conditionals_splice() {
        let deps = parse("a? ( b? ( x/y ) z/w ) q/r");
        let applied = vec!["a".to_string(), "b".to_string()];
        let evaluated = deps.without_conditionals(&applied);
        let kinds: Vec<DepKind> = evaluated.iter().map(DepNode::kind).collect();
        assert_eq!(kinds, vec![DepKind::Atom, DepKind::Atom, DepKind::Atom]);
        assert_eq!(evaluated.to_string(), "x/y z/w q/r");
    }

    #[test]
    fn test_single_child_is_not_wrapped() {
        let deps = parse("a? ( || ( x/y z/w ) )");
        let evaluated = deps.without_conditionals(["a"].as_slice());
        assert_eq!(evaluated.len(), 1);
        assert_eq!(evaluated.iter().next().unwrap().kind(), DepKind::AnyOf);
    }

    #[test]
    fn test_groups_are_preserved() {
        let deps = parse("|| ( a? ( x/x ) y/y ) ^^ ( a? ( p/p ) ) ?? ( m/m n/n )");
        let evaluated = deps.without_conditionals(&no_use());
        assert_eq!(evaluated.to_string(), "|| ( y/y ) ^^ ( ) ?? ( m/m n/n )");
        let kinds: Vec<DepKind> = evaluated.iter().map(DepNode::kind).collect();
        assert_eq!(
            kinds,
            vec![DepKind::AnyOf, DepKind::ExactlyOneOf, DepKind::AtMostOneOf]
        );
    }

    #[test]
    fn test_without_conditionals_is_idempotent() {
        let deps = parse("a? ( x/y ) !b? ( || ( c? ( p/q ) r/s ) ) ( t/u v? ( w/x ) )");
        for applied in [vec![], vec!["a".to_string()], vec!["a".to_string(), "c".to_string()]] {
            let once = deps.without_conditionals(&applied);
            assert!(!once.has_conditionals());
            assert_eq!(once.without_conditionals(&applied), once);
            assert_eq!(once.without_conditionals(&no_use()), once);
        }
    }

    #[test]
    fn test_into_node_and_parse_with() {
        let deps = DepSet::parse_with(&PmsDepParser::<DepAtom>::new(), "a/b c/d").unwrap();
        let node = deps.into_node();
        assert_eq!(node.kind(), DepKind::AllOf);
        assert_eq!(node.to_string(), "( a/b c/d )");
    }

    #[test]
    fn test_closure_applied_use() {
        let deps = parse("python_targets_python3_12? ( dev-lang/python:3.12 ) doc? ( app-doc/d )");
        let applied = UseFn(|flag: &str| flag.starts_with("python_targets_"));
        assert_eq!(
            deps.without_conditionals(&applied).to_string(),
            "dev-lang/python:3.12"
        );
    }

    #[test]
    fn test_node_enabled() {
        let node: DepNode<String> = DepNode::Conditional {
            flag: "x".to_string(),
            negate: true,
            children: vec![],
        };
        assert_eq!(node.enabled(&no_use()), Some(true));
        assert_eq!(node.enabled(["x"].as_slice()), Some(false));
        assert_eq!(DepNode::Atom("a".to_string()).enabled(&no_use()), None);
    }

    #[test]
    fn test_structured_representation() {
        let json = r#"[
            {"atom": "dev-libs/a"},
            {"conditional": {"flag": "ssl", "negate": false, "children": [{"atom": ">=dev-libs/openssl-3"}]}},
            {"any_of": [{"atom": "x/y"}, {"atom": "z/w"}]}
        ]"#;
        let deps: DepSet<DepAtom> = serde_json::from_str(json).unwrap();
        assert_eq!(
            deps.to_string(),
            "dev-libs/a ssl? ( >=dev-libs/openssl-3 ) || ( x/y z/w )"
        );
        assert!(serde_json::from_str::<DepSet<DepAtom>>(r#"[{"atom": "<>bad"}]"#).is_err());
    }

    #[test]
    fn test_deep_structured_input_is_rejected() {
        let levels = 10_000;
        let json = format!(
            "[{}{{\"atom\": \"a/b\"}}{}]",
            "{\"all_of\": [".repeat(levels),
            "]}".repeat(levels)
        );
        let err = serde_json::from_str::<DepSet<DepAtom>>(&json).unwrap_err();
        assert!(err.to_string().contains("recursion limit"));
    }
}
