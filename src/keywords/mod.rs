//! Keyword rules and matching
//!
//! A keyword rule is a regular expression plus a case-sensitivity flag. Rules
//! are stored in the database, compiled into a [`KeywordMatcher`] and
//! evaluated against the extracted fields of an advertisement under a
//! [`MatchScope`].

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A keyword rule as written in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    /// Human label; defaults to the pattern text when absent
    #[serde(default)]
    pub title: Option<String>,

    /// Regular expression searched for in advertisement text
    pub search: String,

    #[serde(rename = "case-sensitive", default)]
    pub case_sensitive: bool,
}

impl KeywordRule {
    /// Returns the label stored alongside the pattern
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.search)
    }
}

/// A keyword rule as stored in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub id: i64,
    pub title: Option<String>,
    pub search: String,
    pub case_sensitive: bool,
}

/// Which extracted fields are searched for keyword occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchScope {
    /// Only the title; an advertisement without a title matches nothing
    TitleOnly,
    /// Title and description, falling back to the raw document
    Full,
}

impl fmt::Display for MatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchScope::TitleOnly => write!(f, "title-only"),
            MatchScope::Full => write!(f, "full"),
        }
    }
}

impl FromStr for MatchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title-only" | "title" => Ok(MatchScope::TitleOnly),
            "full" => Ok(MatchScope::Full),
            other => Err(format!(
                "unknown match scope '{}', expected 'title-only' or 'full'",
                other
            )),
        }
    }
}

/// The fields of an advertisement that keyword matching looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchTarget<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub raw_body: &'a str,
}

impl<'a> MatchTarget<'a> {
    /// Builds the text searched under `scope`, or `None` when there is nothing
    /// to search
    fn search_text(&self, scope: MatchScope) -> Option<String> {
        let title = self.title.filter(|t| !t.is_empty());
        let description = self.description.filter(|d| !d.is_empty());

        match scope {
            MatchScope::TitleOnly => title.map(str::to_string),
            MatchScope::Full => match (title, description) {
                (Some(t), Some(d)) => Some(format!("{} {}", t, d)),
                (Some(t), None) => Some(t.to_string()),
                (None, Some(d)) => Some(d.to_string()),
                (None, None) if !self.raw_body.is_empty() => Some(self.raw_body.to_string()),
                (None, None) => None,
            },
        }
    }
}

/// Compiled keyword patterns keyed by keyword id
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    patterns: Vec<(i64, Regex)>,
}

impl KeywordMatcher {
    /// Compiles every keyword; a pattern that does not compile is dropped with
    /// a warning and the remaining keywords are still usable
    pub fn compile(keywords: &[Keyword]) -> Self {
        let mut patterns = Vec::with_capacity(keywords.len());

        for keyword in keywords {
            match Self::compile_pattern(&keyword.search, keyword.case_sensitive) {
                Ok(regex) => patterns.push((keyword.id, regex)),
                Err(e) => {
                    tracing::warn!(
                        "Dropping keyword {} ('{}'): invalid pattern: {}",
                        keyword.id,
                        keyword.search,
                        e
                    );
                }
            }
        }

        Self { patterns }
    }

    /// Compiles a single pattern with the rule's case sensitivity
    pub fn compile_pattern(search: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
        RegexBuilder::new(search)
            .case_insensitive(!case_sensitive)
            .build()
    }

    /// Returns the ids of every keyword found in the target, sorted and
    /// without duplicates
    pub fn match_advertisement(&self, target: &MatchTarget<'_>, scope: MatchScope) -> Vec<i64> {
        let Some(text) = target.search_text(scope) else {
            return Vec::new();
        };

        let mut ids: Vec<i64> = self
            .patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(&text))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
