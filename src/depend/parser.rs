// src/depend/parser.rs

//! PMS dependency specification parser
//!
//! Grammar (whitespace separated tokens):
//!
//! ```text
//! depset  := item*
//! item    := leaf | "(" item* ")" | ("||" | "^^" | "??") "(" item* ")"
//!          | "!"? flag "?" "(" item* ")"
//! ```

use crate::depend::{DepNode, DepSet};
use crate::error::{Error, Result};
use crate::packages::atom::DepAtom;
use std::marker::PhantomData;
use tracing::debug;

/// Deepest group nesting accepted; trees are walked recursively
pub const MAX_DEPTH: usize = 256;

/// A leaf type a depset can hold
pub trait DepLeaf: Sized {
    fn parse_leaf(token: &str) -> Result<Self>;
}

impl DepLeaf for DepAtom {
    fn parse_leaf(token: &str) -> Result<Self> {
        DepAtom::parse(token)
    }
}

/// Plain-text leaves for LICENSE, REQUIRED_USE, RESTRICT and PROPERTIES
impl DepLeaf for String {
    fn parse_leaf(token: &str) -> Result<Self> {
        Ok(token.to_string())
    }
}

/// Turns raw dependency text into a `DepSet`
pub trait DepParser {
    type Leaf;

    fn parse(&self, text: &str) -> Result<DepSet<Self::Leaf>>;
}

/// Parser for the PMS textual depset syntax
#[derive(Debug)]
pub struct PmsDepParser<A> {
    _leaf: PhantomData<fn() -> A>,
}

impl<A> PmsDepParser<A> {
    pub fn new() -> Self {
        Self { _leaf: PhantomData }
    }
}

impl<A> Default for PmsDepParser<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: DepLeaf> DepParser for PmsDepParser<A> {
    type Leaf = A;

    fn parse(&self, text: &str) -> Result<DepSet<A>> {
        let mut tokens = text.split_whitespace();
        let children = parse_items(&mut tokens, 0)?;
        debug!("Parsed depset with {} top-level nodes", children.len());
        Ok(DepSet::new(children))
    }
}

fn parse_items<'t, A: DepLeaf>(
    tokens: &mut impl Iterator<Item = &'t str>,
    depth: usize,
) -> Result<Vec<DepNode<A>>> {
    if depth > MAX_DEPTH {
        return Err(Error::InvalidExpression(format!(
            "nesting too deep (more than {} levels)",
            MAX_DEPTH
        )));
    }
    let mut items = Vec::new();

    loop {
        let Some(token) = tokens.next() else {
            if depth > 0 {
                return Err(Error::InvalidExpression("unclosed '('".to_string()));
            }
            return Ok(items);
        };

        let node = match token {
            ")" => {
                if depth == 0 {
                    return Err(Error::InvalidExpression("unmatched ')'".to_string()));
                }
                return Ok(items);
            }
            "(" => DepNode::AllOf(parse_items(tokens, depth + 1)?),
            "||" => DepNode::AnyOf(parse_group(tokens, token, depth)?),
            "^^" => DepNode::ExactlyOneOf(parse_group(tokens, token, depth)?),
            "??" => DepNode::AtMostOneOf(parse_group(tokens, token, depth)?),
            t if t.ends_with('?') => {
                let cond = &t[..t.len() - 1];
                let (negate, flag) = match cond.strip_prefix('!') {
                    Some(flag) => (true, flag),
                    None => (false, cond),
                };
                if !is_valid_flag(flag) {
                    return Err(Error::InvalidExpression(format!(
                        "invalid USE conditional '{}'",
                        t
                    )));
                }
                DepNode::Conditional {
                    flag: flag.to_string(),
                    negate,
                    children: parse_group(tokens, t, depth)?,
                }
            }
            leaf => DepNode::Atom(
                A::parse_leaf(leaf)
                    .map_err(|e| Error::InvalidExpression(format!("bad item '{}': {}", leaf, e)))?,
            ),
        };
        items.push(node);
    }
}

/// Parse the parenthesized body that must follow a group operator
fn parse_group<'t, A: DepLeaf>(
    tokens: &mut impl Iterator<Item = &'t str>,
    operator: &str,
    depth: usize,
) -> Result<Vec<DepNode<A>>> {
    match tokens.next() {
        Some("(") => parse_items(tokens, depth + 1),
        _ => Err(Error::InvalidExpression(format!(
            "'{}' must be followed by '('",
            operator
        ))),
    }
}

fn is_valid_flag(flag: &str) -> bool {
    let mut chars = flag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '@' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depend::DepKind;

    #[test]
    fn test_parse_nested() {
        let deps: DepSet<DepAtom> = PmsDepParser::new()
            .parse("a/b ( c/d || ( e/f g/h ) ) x? ( !y? ( i/j ) )")
            .unwrap();
        let kinds: Vec<DepKind> = deps.iter().map(DepNode::kind).collect();
        assert_eq!(kinds, vec![DepKind::Atom, DepKind::AllOf, DepKind::Conditional]);
        assert_eq!(
            deps.to_string(),
            "a/b ( c/d || ( e/f g/h ) ) x? ( !y? ( i/j ) )"
        );
    }

    #[test]
    fn test_empty_input() {
        let deps: DepSet<DepAtom> = PmsDepParser::new().parse("  \n\t ").unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_malformed_input() {
        let parser = PmsDepParser::<DepAtom>::new();
        for text in [
            "( a/b",
            "a/b )",
            "|| a/b",
            "||",
            "flag? a/b",
            "? ( a/b )",
            "!? ( a/b )",
            "<>foo",
            "x/y (a/b)",
        ] {
            let err = parser.parse(text).unwrap_err();
            assert!(
                matches!(err, Error::InvalidExpression(_)),
                "{:?} should be an invalid expression, got {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let parser = PmsDepParser::<DepAtom>::new();

        let nested = |levels: usize| {
            format!("{}a/b{}", "( ".repeat(levels), " )".repeat(levels))
        };
        let deps = parser.parse(&nested(MAX_DEPTH)).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps.to_string(), nested(MAX_DEPTH));

        for text in [
            nested(MAX_DEPTH + 1),
            nested(200_000),
            "( ".repeat(200_000),
            "|| ( ".repeat(200_000),
            "x? ( ".repeat(200_000),
        ] {
            let err = parser.parse(&text).unwrap_err();
            assert!(matches!(err, Error::InvalidExpression(_)));
            assert!(err.to_string().contains("nesting too deep"));
        }
    }

    #[test]
    fn test_plain_text_leaves() {
        let license: DepSet<String> = PmsDepParser::new()
            .parse("|| ( MIT Apache-2.0 ) bindist? ( GPL-2 )")
            .unwrap();
        assert_eq!(license.len(), 2);
        let evaluated = license.without_conditionals(["bindist"].as_slice());
        assert_eq!(evaluated.to_string(), "|| ( MIT Apache-2.0 ) GPL-2");
    }
}
