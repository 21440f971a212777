use super::error::FilterError;
use crate::compare::ComparisonValue;

/// Pattern syntax of a member match or exclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSpec {
    Glob(String),
    Regex(String),
}

/// A single user-supplied filter, parsed but not yet compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// `keyGlob:valueGlob` against header lines
    HeaderGlob {
        key_glob: String,
        value_glob: String,
    },
    /// `key:[op]int` against the integer value of a header line
    HeaderCompare { key: String, cmp: ComparisonValue },
    /// `tokenGlob:cmp` against the tokens of the flag header line
    HeaderFlagCompare {
        token_glob: String,
        cmp: ComparisonValue,
    },
    MemberGlob { pattern: String },
    MemberRegex { pattern: String },
    /// `optionGlob:cmp` against the option tokens of a member
    MemberOptionCompare {
        option_glob: String,
        cmp: ComparisonValue,
    },
    /// `[op]int` against the number of members
    MemberCountRange { cmp: ComparisonValue },
    ExcludeSet { glob: String },
    ExcludeHeader {
        key_glob: String,
        value_glob: String,
    },
    ExcludeMember { pattern: PatternSpec },
}

impl FilterSpec {
    /// Human name of the filter kind, used in messages
    pub fn kind(&self) -> &'static str {
        match self {
            FilterSpec::HeaderGlob { .. } => "header",
            FilterSpec::HeaderCompare { .. } => "header comparison",
            FilterSpec::HeaderFlagCompare { .. } => "header flag",
            FilterSpec::MemberGlob { .. } => "member glob",
            FilterSpec::MemberRegex { .. } => "member regex",
            FilterSpec::MemberOptionCompare { .. } => "member option",
            FilterSpec::MemberCountRange { .. } => "member count",
            FilterSpec::ExcludeSet { .. } => "set exclusion",
            FilterSpec::ExcludeHeader { .. } => "header exclusion",
            FilterSpec::ExcludeMember { .. } => "member exclusion",
        }
    }

    pub fn header_glob(s: &str) -> Result<Self, FilterError> {
        let (key_glob, value_glob) = split_pair("header", s)?;
        Ok(FilterSpec::HeaderGlob {
            key_glob,
            value_glob,
        })
    }

    pub fn header_compare(s: &str) -> Result<Self, FilterError> {
        let (key, cmp) = split_pair("header comparison", s)?;
        let cmp = parse_scalar("header comparison", s, &cmp)?;
        Ok(FilterSpec::HeaderCompare { key, cmp })
    }

    pub fn header_flag_compare(s: &str) -> Result<Self, FilterError> {
        let (token_glob, cmp) = split_pair("header flag", s)?;
        let cmp = parse_cmp("header flag", s, &cmp)?;
        Ok(FilterSpec::HeaderFlagCompare { token_glob, cmp })
    }

    pub fn member_glob(s: &str) -> Result<Self, FilterError> {
        Ok(FilterSpec::MemberGlob {
            pattern: non_empty("member glob", s)?,
        })
    }

    pub fn member_regex(s: &str) -> Result<Self, FilterError> {
        Ok(FilterSpec::MemberRegex {
            pattern: non_empty("member regex", s)?,
        })
    }

    pub fn member_option_compare(s: &str) -> Result<Self, FilterError> {
        let (option_glob, cmp) = split_pair("member option", s)?;
        let cmp = parse_cmp("member option", s, &cmp)?;
        Ok(FilterSpec::MemberOptionCompare { option_glob, cmp })
    }

    pub fn member_count_range(s: &str) -> Result<Self, FilterError> {
        let cmp = parse_scalar("member count", s, s.trim())?;
        Ok(FilterSpec::MemberCountRange { cmp })
    }

    pub fn exclude_set(s: &str) -> Result<Self, FilterError> {
        Ok(FilterSpec::ExcludeSet {
            glob: non_empty("set exclusion", s)?,
        })
    }

    pub fn exclude_header(s: &str) -> Result<Self, FilterError> {
        let (key_glob, value_glob) = split_pair("header exclusion", s)?;
        Ok(FilterSpec::ExcludeHeader {
            key_glob,
            value_glob,
        })
    }

    pub fn exclude_member_glob(s: &str) -> Result<Self, FilterError> {
        Ok(FilterSpec::ExcludeMember {
            pattern: PatternSpec::Glob(non_empty("member exclusion", s)?),
        })
    }

    pub fn exclude_member_regex(s: &str) -> Result<Self, FilterError> {
        Ok(FilterSpec::ExcludeMember {
            pattern: PatternSpec::Regex(non_empty("member exclusion", s)?),
        })
    }
}

/// Raw filter strings as given on the command line, one list per kind
#[derive(Debug, Clone, Default)]
pub struct FilterArgs {
    pub header_globs: Vec<String>,
    pub header_compares: Vec<String>,
    pub header_flags: Vec<String>,
    pub member_glob: Option<String>,
    pub member_regex: Option<String>,
    pub member_options: Vec<String>,
    pub member_counts: Vec<String>,
    pub exclude_sets: Vec<String>,
    pub exclude_headers: Vec<String>,
    pub exclude_member_globs: Vec<String>,
    pub exclude_member_regexes: Vec<String>,
}

impl FilterArgs {
    /// Parse every raw string, failing on the first malformed one
    pub fn to_specs(&self) -> Result<Vec<FilterSpec>, FilterError> {
        let mut specs = Vec::new();

        let lists: [(&[String], fn(&str) -> Result<FilterSpec, FilterError>); 9] = [
            (self.header_globs.as_slice(), FilterSpec::header_glob),
            (self.header_compares.as_slice(), FilterSpec::header_compare),
            (self.header_flags.as_slice(), FilterSpec::header_flag_compare),
            (self.member_options.as_slice(), FilterSpec::member_option_compare),
            (self.member_counts.as_slice(), FilterSpec::member_count_range),
            (self.exclude_sets.as_slice(), FilterSpec::exclude_set),
            (self.exclude_headers.as_slice(), FilterSpec::exclude_header),
            (self.exclude_member_globs.as_slice(), FilterSpec::exclude_member_glob),
            (self.exclude_member_regexes.as_slice(), FilterSpec::exclude_member_regex),
        ];
        for (raw_list, parse) in lists {
            for raw in raw_list {
                specs.push(parse(raw)?);
            }
        }

        if let Some(raw) = &self.member_glob {
            specs.push(FilterSpec::member_glob(raw)?);
        }
        if let Some(raw) = &self.member_regex {
            specs.push(FilterSpec::member_regex(raw)?);
        }

        Ok(specs)
    }
}

fn invalid(kind: &'static str, spec: &str, reason: impl Into<String>) -> FilterError {
    FilterError::Validation {
        kind,
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(kind: &'static str, s: &str) -> Result<String, FilterError> {
    if s.is_empty() {
        return Err(invalid(kind, s, "empty pattern"));
    }
    Ok(s.to_string())
}

/// Split `name:rest` on the first colon; both sides must be non-empty
fn split_pair(kind: &'static str, s: &str) -> Result<(String, String), FilterError> {
    let (name, rest) = s
        .split_once(':')
        .ok_or_else(|| invalid(kind, s, "expected 'name:value' format"))?;

    let name = name.trim();
    let rest = rest.trim();
    if name.is_empty() {
        return Err(invalid(kind, s, "empty name"));
    }
    if rest.is_empty() {
        return Err(invalid(kind, s, "empty value"));
    }

    Ok((name.to_string(), rest.to_string()))
}

fn parse_cmp(kind: &'static str, spec: &str, raw: &str) -> Result<ComparisonValue, FilterError> {
    ComparisonValue::parse(raw).map_err(|e| invalid(kind, spec, e.to_string()))
}

fn parse_scalar(kind: &'static str, spec: &str, raw: &str) -> Result<ComparisonValue, FilterError> {
    let cmp = parse_cmp(kind, spec, raw)?;
    if !cmp.is_scalar() {
        return Err(invalid(
            kind,
            spec,
            "expected an integer comparison like '>=10' or '0x1f'",
        ));
    }
    Ok(cmp)
}
