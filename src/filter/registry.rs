use super::error::FilterError;
use super::matcher::{GlobMatcher, MemberPattern, TokenPredicate};
use super::spec::{FilterArgs, FilterSpec, PatternSpec};
use crate::compare::{ComparisonValue, ObservedValue};
use crate::parser::{HeaderLine, MemberEntry};

/// A predicate every kept set must satisfy with at least one header line
#[derive(Debug, Clone)]
pub enum HeaderPredicate {
    Glob {
        key: GlobMatcher,
        value: GlobMatcher,
    },
    Compare {
        key: String,
        cmp: ComparisonValue,
    },
}

/// Key/value glob pair hiding matching header lines from display
#[derive(Debug, Clone)]
pub struct HeaderExclusion {
    pub key: GlobMatcher,
    pub value: GlobMatcher,
}

impl HeaderExclusion {
    pub fn matches(&self, line: &HeaderLine) -> bool {
        self.key.is_match(&line.key) && self.value.is_match(&line.value)
    }
}

/// All filters of a run, compiled once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    header: Vec<HeaderPredicate>,
    header_flags: Vec<TokenPredicate>,
    member_pattern: Option<MemberPattern>,
    member_options: Vec<TokenPredicate>,
    member_counts: Vec<ComparisonValue>,
    exclude_sets: Vec<GlobMatcher>,
    exclude_headers: Vec<HeaderExclusion>,
    exclude_members: Vec<MemberPattern>,
}

impl FilterRegistry {
    /// A registry with no filters: every set is kept
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and compile raw filter strings
    pub fn from_args(args: &FilterArgs) -> Result<Self, FilterError> {
        Self::build(args.to_specs()?)
    }

    /// Compile parsed specs. Duplicate specs count once.
    pub fn build(specs: impl IntoIterator<Item = FilterSpec>) -> Result<Self, FilterError> {
        let mut registry = Self::default();
        let mut seen: Vec<FilterSpec> = Vec::new();
        let mut member_pattern: Option<FilterSpec> = None;

        for spec in specs {
            if seen.contains(&spec) {
                continue;
            }

            match &spec {
                FilterSpec::HeaderGlob {
                    key_glob,
                    value_glob,
                } => registry.header.push(HeaderPredicate::Glob {
                    key: GlobMatcher::new(key_glob)?,
                    value: GlobMatcher::new(value_glob)?,
                }),
                FilterSpec::HeaderCompare { key, cmp } => {
                    require_scalar(&spec, cmp)?;
                    registry.header.push(HeaderPredicate::Compare {
                        key: key.clone(),
                        cmp: *cmp,
                    });
                }
                FilterSpec::HeaderFlagCompare { token_glob, cmp } => {
                    registry.header_flags.push(TokenPredicate {
                        name: GlobMatcher::new(token_glob)?,
                        cmp: *cmp,
                    })
                }
                FilterSpec::MemberGlob { pattern } | FilterSpec::MemberRegex { pattern } => {
                    if let Some(previous) = &member_pattern {
                        return Err(FilterError::Conflict(format!(
                            "{} '{}' cannot be combined with a {}",
                            spec.kind(),
                            pattern,
                            previous.kind()
                        )));
                    }
                    let pattern_spec = match &spec {
                        FilterSpec::MemberGlob { .. } => PatternSpec::Glob(pattern.clone()),
                        _ => PatternSpec::Regex(pattern.clone()),
                    };
                    registry.member_pattern = Some(MemberPattern::compile(&pattern_spec)?);
                    member_pattern = Some(spec.clone());
                }
                FilterSpec::MemberOptionCompare { option_glob, cmp } => {
                    registry.member_options.push(TokenPredicate {
                        name: GlobMatcher::new(option_glob)?,
                        cmp: *cmp,
                    })
                }
                FilterSpec::MemberCountRange { cmp } => {
                    require_scalar(&spec, cmp)?;
                    registry.member_counts.push(*cmp);
                }
                FilterSpec::ExcludeSet { glob } => {
                    registry.exclude_sets.push(GlobMatcher::new(glob)?)
                }
                FilterSpec::ExcludeHeader {
                    key_glob,
                    value_glob,
                } => registry.exclude_headers.push(HeaderExclusion {
                    key: GlobMatcher::new(key_glob)?,
                    value: GlobMatcher::new(value_glob)?,
                }),
                FilterSpec::ExcludeMember { pattern } => registry
                    .exclude_members
                    .push(MemberPattern::compile(pattern)?),
            }

            seen.push(spec);
        }

        Ok(registry)
    }

    pub fn header_predicates(&self) -> &[HeaderPredicate] {
        &self.header
    }

    pub fn header_flag_predicates(&self) -> &[TokenPredicate] {
        &self.header_flags
    }

    /// Number of distinct header-level predicates a kept set must satisfy
    pub fn header_gate_size(&self) -> usize {
        self.header.len() + self.header_flags.len()
    }

    pub fn member_pattern(&self) -> Option<&MemberPattern> {
        self.member_pattern.as_ref()
    }

    pub fn member_option_predicates(&self) -> &[TokenPredicate] {
        &self.member_options
    }

    /// Whether any glob, regex or option filter selects members
    pub fn has_member_filter(&self) -> bool {
        self.member_pattern.is_some() || !self.member_options.is_empty()
    }

    pub fn has_member_count_range(&self) -> bool {
        !self.member_counts.is_empty()
    }

    /// All count ranges hold for `count`
    pub fn member_count_in_range(&self, count: u64) -> bool {
        self.member_counts
            .iter()
            .all(|cmp| cmp.matches(&ObservedValue::Scalar(count)).unwrap_or(false))
    }

    /// All option predicates hold for this member
    pub fn member_options_match(&self, entry: &MemberEntry) -> bool {
        self.member_options
            .iter()
            .all(|predicate| predicate.matches(&entry.options))
    }

    pub fn is_set_excluded(&self, name: &str) -> bool {
        self.exclude_sets.iter().any(|glob| glob.is_match(name))
    }

    pub fn is_header_excluded(&self, line: &HeaderLine) -> bool {
        self.exclude_headers.iter().any(|ex| ex.matches(line))
    }

    pub fn has_member_exclusion(&self) -> bool {
        !self.exclude_members.is_empty()
    }

    pub fn is_member_excluded(&self, entry: &MemberEntry) -> bool {
        self.exclude_members
            .iter()
            .any(|pattern| pattern.is_match(&entry.primary))
    }
}

fn require_scalar(spec: &FilterSpec, cmp: &ComparisonValue) -> Result<(), FilterError> {
    if cmp.is_scalar() {
        return Ok(());
    }
    Err(FilterError::Validation {
        kind: spec.kind(),
        spec: cmp.to_string(),
        reason: "only integer comparisons are allowed here".to_string(),
    })
}
