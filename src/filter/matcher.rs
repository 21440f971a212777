use super::error::FilterError;
use super::spec::PatternSpec;
use crate::compare::ComparisonValue;
use crate::parser::Token;
use globset::GlobBuilder;
use regex::Regex;
use std::fmt;

/// Shell-style glob matched against a whole string
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    matcher: globset::GlobMatcher,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        // `*` must cross `/` so network values like 10.0.0.0/24 match
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|source| FilterError::Glob {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A member pattern in either syntax
#[derive(Debug, Clone)]
pub enum MemberPattern {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl MemberPattern {
    pub fn compile(spec: &PatternSpec) -> Result<Self, FilterError> {
        match spec {
            PatternSpec::Glob(pattern) => GlobMatcher::new(pattern).map(MemberPattern::Glob),
            PatternSpec::Regex(pattern) => Regex::new(pattern)
                .map(MemberPattern::Regex)
                .map_err(|source| FilterError::Pattern {
                    pattern: pattern.clone(),
                    source,
                }),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            MemberPattern::Glob(glob) => glob.is_match(text),
            MemberPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

impl fmt::Display for MemberPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberPattern::Glob(glob) => write!(f, "glob '{}'", glob.pattern()),
            MemberPattern::Regex(regex) => write!(f, "regex '{}'", regex.as_str()),
        }
    }
}

/// Comparison against named tokens (header flags or member options)
#[derive(Debug, Clone)]
pub struct TokenPredicate {
    pub name: GlobMatcher,
    pub cmp: ComparisonValue,
}

impl TokenPredicate {
    /// True if any token whose name matches carries a value satisfying the
    /// comparison. Tokens without a numeric value are skipped.
    pub fn matches(&self, tokens: &[Token]) -> bool {
        tokens.iter().any(|token| {
            self.name.is_match(&token.name)
                && token
                    .value
                    .as_deref()
                    .and_then(|value| self.cmp.matches_str(value))
                    .unwrap_or(false)
        })
    }
}
