// src/version.rs

//! Package versions
//!
//! Versions follow the PMS grammar: dot-separated numeric components, an
//! optional letter, a chain of `_alpha`/`_beta`/`_pre`/`_rc`/`_p` suffixes
//! and an optional `-rN` revision. Ordering implements the PMS comparison
//! algorithm, so `1.0_rc1 < 1.0 < 1.0_p1 < 1.0-r1`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^(\d+(?:\.\d+)*)([a-z]?)((?:_(?:alpha|beta|pre|rc|p)\d*)*)(?:-r(\d+))?$",
    )
    .expect("version regex is valid")
});

/// Version suffix kinds, declared in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl SuffixKind {
    fn parse(s: &str) -> Option<(Self, &str)> {
        // "pre" must be tried before "p"
        const KINDS: [(&str, SuffixKind); 5] = [
            ("alpha", SuffixKind::Alpha),
            ("beta", SuffixKind::Beta),
            ("pre", SuffixKind::Pre),
            ("rc", SuffixKind::Rc),
            ("p", SuffixKind::P),
        ];
        KINDS
            .iter()
            .find_map(|(name, kind)| s.strip_prefix(name).map(|rest| (*kind, rest)))
    }
}

/// A package version: base version string plus integer revision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    base: String,
    revision: u64,
    numbers: Vec<String>,
    letter: Option<char>,
    suffixes: Vec<(SuffixKind, String)>,
}

impl Version {
    /// Parse a version string such as `1.2.3b_rc1-r2`
    pub fn parse(s: &str) -> Result<Self> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;

        let numbers = caps[1].split('.').map(str::to_string).collect();
        let letter = caps.get(2).and_then(|m| m.as_str().chars().next());

        let mut suffixes = Vec::new();
        if let Some(m) = caps.get(3) {
            for raw in m.as_str().split('_').filter(|p| !p.is_empty()) {
                let (kind, num) = SuffixKind::parse(raw)
                    .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
                suffixes.push((kind, num.to_string()));
            }
        }

        let revision = match caps.get(4) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| Error::InvalidVersion(format!("{}: revision out of range", s)))?,
            None => 0,
        };

        // strip the trailing "-rN"
        let base = match caps.get(4) {
            Some(m) => &s[..m.start() - 2],
            None => s,
        };

        Ok(Self {
            base: base.to_string(),
            revision,
            numbers,
            letter,
            suffixes,
        })
    }

    /// The version without its revision part
    pub fn without_revision(&self) -> &str {
        &self.base
    }

    /// The revision number (0 when absent)
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether this version starts with `prefix` in the sense of `=cat/pkg-1.2*`
    pub fn matches_glob(&self, prefix: &str) -> bool {
        let full = self.to_string();
        if !full.starts_with(prefix) {
            return false;
        }
        // 1.2* must not match 1.20
        let rest = &full[prefix.len()..];
        let last_is_digit = prefix.chars().last().is_some_and(|c| c.is_ascii_digit());
        !(last_is_digit && rest.starts_with(|c: char| c.is_ascii_digit()))
    }

    /// Compare ignoring revisions, as the `~` atom operator does
    pub fn cmp_without_revision(&self, other: &Self) -> Ordering {
        self.cmp_numbers(other)
            .then_with(|| self.letter.cmp(&other.letter))
            .then_with(|| self.cmp_suffixes(other))
    }

    fn cmp_numbers(&self, other: &Self) -> Ordering {
        let mut ord = cmp_integers(&self.numbers[0], &other.numbers[0]);
        for (a, b) in self.numbers.iter().zip(&other.numbers).skip(1) {
            if ord != Ordering::Equal {
                return ord;
            }
            ord = if a.starts_with('0') || b.starts_with('0') {
                a.trim_end_matches('0').cmp(b.trim_end_matches('0'))
            } else {
                cmp_integers(a, b)
            };
        }
        ord.then(self.numbers.len().cmp(&other.numbers.len()))
    }

    fn cmp_suffixes(&self, other: &Self) -> Ordering {
        for ((ka, na), (kb, nb)) in self.suffixes.iter().zip(&other.suffixes) {
            let ord = ka.cmp(kb).then_with(|| cmp_integers(na, nb));
            if ord != Ordering::Equal {
                return ord;
            }
        }

        let common = self.suffixes.len().min(other.suffixes.len());
        match (self.suffixes.get(common), other.suffixes.get(common)) {
            (Some((kind, _)), None) => {
                if *kind == SuffixKind::P {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (None, Some((kind, _))) => {
                if *kind == SuffixKind::P {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            _ => Ordering::Equal,
        }
    }
}

/// Compare two unbounded decimal strings numerically
fn cmp_integers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_without_revision(other)
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision > 0 {
            write!(f, "{}-r{}", self.base, self.revision)
        } else {
            f.write_str(&self.base)
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}
