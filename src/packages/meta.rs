// src/packages/meta.rs

//! Maintainer, upstream and USE flag metadata carried by package records

use serde::{Deserialize, Serialize};
use std::fmt;

/// A package maintainer from metadata.xml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl fmt::Display for Maintainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Whether an upstream maintainer is still active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintainerStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

/// An upstream (not distribution) maintainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMaintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: MaintainerStatus,
}

impl fmt::Display for UpstreamMaintainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}>", self.name, email),
            None => f.write_str(&self.name),
        }
    }
}

fn default_doc_lang() -> String {
    "en".to_string()
}

/// Location of upstream documentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDoc {
    pub url: String,
    #[serde(default = "default_doc_lang")]
    pub lang: String,
}

/// A package's identifier on a third-party tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteId {
    /// Tracker type (`github`, `pypi`, ...)
    pub site: String,
    /// Identifier on that tracker
    pub name: String,
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.site, self.name)
    }
}

/// Upstream metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    /// Bug tracker URL, or an address prefixed with `mailto:`
    #[serde(default)]
    pub bugs_to: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub docs: Vec<UpstreamDoc>,
    #[serde(default)]
    pub maintainers: Vec<UpstreamMaintainer>,
    #[serde(default)]
    pub remote_ids: Vec<RemoteId>,
}

/// One IUSE entry with its state for a package instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseFlag<'a> {
    pub name: &'a str,
    /// `+flag` is `Some(true)`, `-flag` is `Some(false)`
    pub default: Option<bool>,
    /// Whether the flag is among the applied USE flags
    pub enabled: bool,
}

impl<'a> UseFlag<'a> {
    /// Split an IUSE entry into its name and default marker
    pub fn parse_iuse(entry: &'a str) -> (&'a str, Option<bool>) {
        if let Some(name) = entry.strip_prefix('+') {
            (name, Some(true))
        } else if let Some(name) = entry.strip_prefix('-') {
            (name, Some(false))
        } else {
            (entry, None)
        }
    }
}

impl fmt::Display for UseFlag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        let m = Maintainer {
            email: "base-system@gentoo.org".to_string(),
            name: Some("Base System".to_string()),
        };
        assert_eq!(m.to_string(), "Base System <base-system@gentoo.org>");

        let anonymous = Maintainer {
            email: "larry@gentoo.org".to_string(),
            name: None,
        };
        assert_eq!(anonymous.to_string(), "larry@gentoo.org");

        let id = RemoteId {
            site: "github".to_string(),
            name: "curl/curl".to_string(),
        };
        assert_eq!(id.to_string(), "github: curl/curl");
    }

    #[test]
    fn test_parse_iuse() {
        assert_eq!(UseFlag::parse_iuse("+ssl"), ("ssl", Some(true)));
        assert_eq!(UseFlag::parse_iuse("-http2"), ("http2", Some(false)));
        assert_eq!(UseFlag::parse_iuse("idn"), ("idn", None));
    }

    #[test]
    fn test_upstream_defaults() {
        let upstream: Upstream = serde_json::from_str(
            r#"{"docs": [{"url": "https://curl.se/docs/"}],
                "maintainers": [{"name": "Daniel Stenberg", "status": "active"}]}"#,
        )
        .unwrap();
        assert_eq!(upstream.docs[0].lang, "en");
        assert_eq!(upstream.maintainers[0].status, MaintainerStatus::Active);
        assert_eq!(upstream.maintainers[0].to_string(), "Daniel Stenberg");
        assert!(upstream.bugs_to.is_none());
        assert!(upstream.remote_ids.is_empty());
    }
}
