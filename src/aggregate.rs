use crate::evaluator::EvaluationResult;
use serde::Serialize;

/// Run-wide tallies, accumulated across every listing read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalCounters {
    /// Sets whose name marker was read, including excluded and truncated ones
    pub sets_traversed: u64,
    /// Sets that passed every gate
    pub sets_matched: u64,
    pub sets_excluded_by_name: u64,
    /// Sets abandoned because their listing ended abnormally
    pub sets_truncated: u64,
    pub total_memory: u64,
    pub total_members: u64,
    pub total_matches: u64,
    pub total_excluded: u64,
}

impl GlobalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_traversed(&mut self) {
        self.sets_traversed += 1;
    }

    pub fn record_excluded_by_name(&mut self) {
        self.sets_excluded_by_name += 1;
    }

    pub fn record_truncated(&mut self) {
        self.sets_truncated += 1;
    }

    /// Fold one evaluation in. Discarded sets leave the counters untouched.
    pub fn fold(&mut self, result: &EvaluationResult) {
        if !result.kept {
            return;
        }

        let counters = &result.counters;
        self.sets_matched += 1;
        self.total_memory += counters.mem_size;
        self.total_members += counters.member_count;
        self.total_matches += counters.match_count;
        self.total_excluded += counters.exclude_count;
    }

    /// Combine counters gathered independently, e.g. by parallel workers
    pub fn merge(&mut self, other: &GlobalCounters) {
        self.sets_traversed += other.sets_traversed;
        self.sets_matched += other.sets_matched;
        self.sets_excluded_by_name += other.sets_excluded_by_name;
        self.sets_truncated += other.sets_truncated;
        self.total_memory += other.total_memory;
        self.total_members += other.total_members;
        self.total_matches += other.total_matches;
        self.total_excluded += other.total_excluded;
    }
}
