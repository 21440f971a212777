//! Per-set evaluation against the filter registry
//!
//! Evaluation runs in two gated phases. The header phase checks every
//! header line against the header-level predicates; when the header region
//! closes, a set that left any predicate unsatisfied is discarded and its
//! members are never looked at. The member phase counts, excludes and
//! matches member entries, and a final gate applies the member match and
//! member count requirements.

use crate::compare::ObservedValue;
use crate::config::ParserRules;
use crate::filter::{FilterRegistry, HeaderPredicate};
use crate::parser::{Block, HeaderLine, MemberEntry, parse_flag_tokens};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("set '{set}': header '{key}' value '{value}' is not an integer (comparison '{cmp}')")]
    NotNumeric {
        set: String,
        key: String,
        value: String,
        cmp: String,
    },
}

/// Counters of a single set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCounters {
    pub member_count: u64,
    pub match_count: u64,
    pub exclude_count: u64,
    pub mem_size: u64,
}

/// Outcome of evaluating one set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    pub name: String,
    pub kept: bool,
    pub header_cache: Vec<String>,
    pub member_cache: Vec<String>,
    pub counters: BlockCounters,
}

/// What the caller will do with the result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// Members are displayed, so unfiltered members are cached too
    pub cache_members: bool,
    /// Member counters are displayed or aggregated
    pub count_members: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Members,
    Discarded,
}

/// Incremental evaluation of one set, fed as its lines are parsed
pub struct BlockEvaluation<'a> {
    registry: &'a FilterRegistry,
    rules: &'a ParserRules,
    options: EvalOptions,
    name: String,
    phase: Phase,
    satisfied: Vec<bool>,
    header_cache: Vec<String>,
    member_cache: Vec<String>,
    counters: BlockCounters,
}

impl<'a> BlockEvaluation<'a> {
    pub fn new(
        name: impl Into<String>,
        registry: &'a FilterRegistry,
        rules: &'a ParserRules,
        options: EvalOptions,
    ) -> Self {
        Self {
            registry,
            rules,
            options,
            name: name.into(),
            phase: Phase::Header,
            satisfied: vec![false; registry.header_gate_size()],
            header_cache: Vec::new(),
            member_cache: Vec::new(),
            counters: BlockCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate one header line
    pub fn header(&mut self, line: &HeaderLine) -> Result<(), EvalError> {
        if self.phase != Phase::Header {
            return Ok(());
        }

        for (idx, predicate) in self.registry.header_predicates().iter().enumerate() {
            if self.header_predicate_matches(predicate, line)? {
                self.satisfied[idx] = true;
            }
        }

        if line.key == self.rules.flag_header_key {
            let offset = self.registry.header_predicates().len();
            let tokens = parse_flag_tokens(&line.value, &self.rules.header_valueless_flags);
            for (idx, predicate) in self.registry.header_flag_predicates().iter().enumerate() {
                if predicate.matches(&tokens) {
                    self.satisfied[offset + idx] = true;
                }
            }
        }

        if line.key == self.rules.memory_key {
            match ObservedValue::parse(&line.value).and_then(|v| v.as_scalar()) {
                Some(size) => self.counters.mem_size = size,
                None => {
                    warn!(set = %self.name, value = %line.value, "memory size is not an integer")
                }
            }
        }

        if !self.registry.is_header_excluded(line) {
            self.header_cache.push(line.to_string());
        }

        Ok(())
    }

    fn header_predicate_matches(
        &self,
        predicate: &HeaderPredicate,
        line: &HeaderLine,
    ) -> Result<bool, EvalError> {
        match predicate {
            HeaderPredicate::Glob { key, value } => {
                Ok(key.is_match(&line.key) && value.is_match(&line.value))
            }
            HeaderPredicate::Compare { key, cmp } => {
                if *key != line.key {
                    return Ok(false);
                }
                let observed = ObservedValue::parse(&line.value)
                    .and_then(|v| v.as_scalar())
                    .ok_or_else(|| EvalError::NotNumeric {
                        set: self.name.clone(),
                        key: line.key.clone(),
                        value: line.value.clone(),
                        cmp: cmp.to_string(),
                    })?;
                Ok(cmp
                    .matches(&ObservedValue::Scalar(observed))
                    .unwrap_or(false))
            }
        }
    }

    /// Close the header region. Returns whether the set is still kept.
    pub fn close_header(&mut self) -> bool {
        if self.phase != Phase::Header {
            return self.phase == Phase::Members;
        }

        let satisfied = self.satisfied.iter().filter(|s| **s).count();
        if satisfied == self.satisfied.len() {
            self.phase = Phase::Members;
            true
        } else {
            debug!(
                set = %self.name,
                satisfied,
                required = self.satisfied.len(),
                "header filters not satisfied"
            );
            self.phase = Phase::Discarded;
            false
        }
    }

    /// Whether member lines still need to be fed
    pub fn wants_members(&self) -> bool {
        self.phase == Phase::Members
            && (self.options.cache_members
                || self.options.count_members
                || self.registry.has_member_filter()
                || self.registry.has_member_count_range())
    }

    /// Evaluate one member entry
    pub fn member(&mut self, entry: &MemberEntry) {
        if !self.wants_members() {
            return;
        }

        self.counters.member_count += 1;

        if self.registry.is_member_excluded(entry) {
            self.counters.exclude_count += 1;
            return;
        }

        let matched = if let Some(pattern) = self.registry.member_pattern() {
            pattern.is_match(&entry.primary) && self.registry.member_options_match(entry)
        } else if !self.registry.member_option_predicates().is_empty() {
            self.registry.member_options_match(entry)
        } else {
            if self.options.cache_members {
                self.member_cache.push(entry.to_string());
            }
            return;
        };

        if matched {
            self.counters.match_count += 1;
            self.member_cache.push(entry.to_string());
        }
    }

    /// Apply the final gate and produce the result
    pub fn finish(mut self) -> EvaluationResult {
        let mut kept = self.close_header();

        if kept && self.registry.has_member_filter() && self.counters.match_count == 0 {
            debug!(set = %self.name, "no member matched");
            kept = false;
        }
        if kept && !self.registry.member_count_in_range(self.counters.member_count) {
            debug!(
                set = %self.name,
                member_count = self.counters.member_count,
                "member count out of range"
            );
            kept = false;
        }

        EvaluationResult {
            name: self.name,
            kept,
            header_cache: self.header_cache,
            member_cache: self.member_cache,
            counters: self.counters,
        }
    }
}

/// Evaluate a fully parsed set
pub fn evaluate_block(
    block: &Block,
    registry: &FilterRegistry,
    rules: &ParserRules,
    options: EvalOptions,
) -> Result<EvaluationResult, EvalError> {
    let mut evaluation = BlockEvaluation::new(block.name.clone(), registry, rules, options);

    for line in &block.header_lines {
        evaluation.header(line)?;
    }

    if evaluation.close_header() {
        for entry in &block.member_lines {
            if !evaluation.wants_members() {
                break;
            }
            evaluation.member(entry);
        }
    }

    Ok(evaluation.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::filter::FilterArgs;
    use crate::parser::parse_listing;

    fn rules() -> &'static ParserRules {
        &default_config().parser
    }

    fn block(text: &str) -> Block {
        parse_listing(text, rules()).unwrap().remove(0)
    }

    fn counting() -> EvalOptions {
        EvalOptions {
            cache_members: true,
            count_members: true,
        }
    }

    const LISTING: &str = "\
Name: myset
Type: hash:ip
Header: family inet hashsize 1024 maxelem 65536 counters
Size in memory: 1024
References: 0
Members:
10.0.0.1 packets 0 bytes 0
10.0.0.2 packets 150 bytes 2048
";

    #[test]
    fn test_no_filters_keeps_everything() {
        let registry = FilterRegistry::new();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(result.kept);
        assert_eq!(result.header_cache.len(), 4);
        assert_eq!(result.member_cache.len(), 2);
        assert_eq!(result.counters.member_count, 2);
        assert_eq!(result.counters.match_count, 0);
        assert_eq!(result.counters.mem_size, 1024);
    }

    #[test]
    fn test_header_filters_are_and_combined() {
        let args = FilterArgs {
            header_globs: vec!["Type:hash:*".into()],
            header_compares: vec!["References:0".into()],
            header_flags: vec!["hashsize:>=1024".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(result.kept);

        let args = FilterArgs {
            header_globs: vec!["Type:hash:*".into()],
            header_flags: vec!["maxelem:<100".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(!result.kept);
        // discarded at the header gate, members never read
        assert_eq!(result.counters.member_count, 0);
    }

    #[test]
    fn test_non_numeric_header_compare_is_fatal() {
        let args = FilterArgs {
            header_compares: vec!["Type:>1".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let err = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap_err();
        assert!(matches!(err, EvalError::NotNumeric { ref key, .. } if key == "Type"));
    }

    #[test]
    fn test_non_numeric_flag_token_is_skipped() {
        let args = FilterArgs {
            header_flags: vec!["family:>1".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(!result.kept);
    }

    #[test]
    fn test_header_exclusion_only_hides_lines() {
        let args = FilterArgs {
            header_compares: vec!["Size in memory:>0".into()],
            exclude_headers: vec!["Size in memory:*".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(result.kept);
        assert!(
            !result
                .header_cache
                .iter()
                .any(|line| line.starts_with("Size in memory"))
        );
    }

    #[test]
    fn test_option_compare_selects_members() {
        let args = FilterArgs {
            member_options: vec!["packets:>100".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(result.kept);
        assert_eq!(result.counters.match_count, 1);
        assert_eq!(result.counters.member_count, 2);
        assert_eq!(result.member_cache, vec!["10.0.0.2 packets 150 bytes 2048"]);
    }

    #[test]
    fn test_pattern_and_options_must_both_match() {
        let args = FilterArgs {
            member_glob: Some("10.0.0.1".into()),
            member_options: vec!["packets:>100".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert_eq!(result.counters.match_count, 0);
        assert!(!result.kept);
    }

    #[test]
    fn test_exclude_without_positive_filter() {
        let args = FilterArgs {
            exclude_member_globs: vec!["10.0.0.*".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert!(result.kept);
        assert_eq!(result.counters.exclude_count, 2);
        assert_eq!(result.counters.member_count, 2);
        assert!(result.member_cache.is_empty());
    }

    #[test]
    fn test_excluded_member_is_not_matched() {
        let args = FilterArgs {
            member_regex: Some("^10\\.".into()),
            exclude_member_globs: vec!["10.0.0.1".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let result = evaluate_block(&block(LISTING), &registry, rules(), counting()).unwrap();
        assert_eq!(result.counters.exclude_count, 1);
        assert_eq!(result.counters.match_count, 1);
        assert_eq!(result.member_cache, vec!["10.0.0.2 packets 150 bytes 2048"]);
    }

    #[test]
    fn test_member_count_range() {
        let args = FilterArgs {
            member_counts: vec![">2".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let options = EvalOptions::default();
        let result = evaluate_block(&block(LISTING), &registry, rules(), options).unwrap();
        assert_eq!(result.counters.member_count, 2);
        assert!(!result.kept);
    }

    #[test]
    fn test_members_skipped_when_nothing_needs_them() {
        let registry = FilterRegistry::new();
        let result =
            evaluate_block(&block(LISTING), &registry, rules(), EvalOptions::default()).unwrap();
        assert!(result.kept);
        assert_eq!(result.counters.member_count, 0);
        assert!(result.member_cache.is_empty());
        assert_eq!(result.counters.mem_size, 1024);
    }

    #[test]
    fn test_incremental_evaluation_matches_block_evaluation() {
        let args = FilterArgs {
            member_options: vec!["bytes:>=2048".into()],
            ..Default::default()
        };
        let registry = FilterRegistry::from_args(&args).unwrap();
        let parsed = block(LISTING);

        let mut evaluation = BlockEvaluation::new("myset", &registry, rules(), counting());
        for line in &parsed.header_lines {
            evaluation.header(line).unwrap();
        }
        assert!(evaluation.close_header());
        for entry in &parsed.member_lines {
            evaluation.member(entry);
        }

        let incremental = evaluation.finish();
        let whole = evaluate_block(&parsed, &registry, rules(), counting()).unwrap();
        assert_eq!(incremental, whole);
    }
}
