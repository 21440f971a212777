use crate::aggregate::GlobalCounters;
use crate::config::ParserRules;
use crate::evaluator::{BlockEvaluation, EvalError, EvalOptions, EvaluationResult};
use crate::filter::FilterRegistry;
use crate::parser::{BlockParser, ParseEvent, StructureError};
use crate::source::{Listing, ListingSource};
use serde::Serialize;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fatal errors: any of these aborts the run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("malformed listing '{label}'")]
    Structure {
        label: String,
        #[source]
        source: StructureError,
    },

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("failed to write output")]
    Output(#[from] io::Error),
}

/// What is shown for each kept set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Set names only
    Names,
    /// Name and header lines
    Headers,
    /// Name and member lines
    Members,
    /// Name, header and member lines
    #[default]
    Full,
}

impl DisplayMode {
    pub fn shows_headers(self) -> bool {
        matches!(self, DisplayMode::Headers | DisplayMode::Full)
    }

    pub fn shows_members(self) -> bool {
        matches!(self, DisplayMode::Members | DisplayMode::Full)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub display: DisplayMode,
    /// Per-set counters are shown
    pub counts: bool,
    /// Global counters are shown at the end of the run
    pub totals: bool,
}

impl RunOptions {
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            cache_members: self.display.shows_members(),
            count_members: self.counts || self.totals,
        }
    }
}

/// State of the set currently being read
enum OpenSet<'a> {
    Evaluating(BlockEvaluation<'a>),
    /// Excluded by name; lines are consumed and dropped
    Excluded,
}

/// Drives listings through parser, evaluator and aggregator, one set at a
/// time
pub struct Runner<'a> {
    registry: &'a FilterRegistry,
    rules: &'a ParserRules,
    options: RunOptions,
    counters: GlobalCounters,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a FilterRegistry, rules: &'a ParserRules, options: RunOptions) -> Self {
        Self {
            registry,
            rules,
            options,
            counters: GlobalCounters::new(),
        }
    }

    pub fn counters(&self) -> &GlobalCounters {
        &self.counters
    }

    /// Process every listing of `source`, handing kept sets to `on_kept`
    pub fn run<F>(
        &mut self,
        source: &mut dyn ListingSource,
        mut on_kept: F,
    ) -> Result<GlobalCounters, RunError>
    where
        F: FnMut(&EvaluationResult) -> io::Result<()>,
    {
        while let Some(listing) = source.next_listing() {
            self.process_listing(listing, &mut on_kept)?;
        }

        info!(
            traversed = self.counters.sets_traversed,
            matched = self.counters.sets_matched,
            excluded = self.counters.sets_excluded_by_name,
            truncated = self.counters.sets_truncated,
            "run finished"
        );
        Ok(self.counters)
    }

    /// Process one line stream. A stream that fails abandons the set being
    /// read and returns normally.
    pub fn process_listing<F>(&mut self, listing: Listing, on_kept: &mut F) -> Result<(), RunError>
    where
        F: FnMut(&EvaluationResult) -> io::Result<()>,
    {
        let Listing { label, lines } = listing;
        let mut parser = BlockParser::new(self.rules);
        let mut open: Option<OpenSet<'a>> = None;

        for line in lines {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    let set = parser.abandon().unwrap_or_else(|| label.clone());
                    warn!(set = %set, error = %e, "listing ended abnormally, skipping set");
                    self.counters.record_truncated();
                    return Ok(());
                }
            };

            let event = parser
                .push_line(&line)
                .map_err(|source| RunError::Structure {
                    label: label.clone(),
                    source,
                })?;

            match event {
                Some(ParseEvent::Opened(name)) => {
                    if let Some(done) = open.take() {
                        self.complete(done, on_kept)?;
                    }
                    open = Some(self.open(name));
                }
                Some(ParseEvent::Header(header)) => {
                    if let Some(OpenSet::Evaluating(evaluation)) = open.as_mut() {
                        evaluation.header(&header)?;
                    }
                }
                Some(ParseEvent::MembersOpened) => {
                    if let Some(OpenSet::Evaluating(evaluation)) = open.as_mut() {
                        evaluation.close_header();
                    }
                }
                Some(ParseEvent::Member(entry)) => {
                    if let Some(OpenSet::Evaluating(evaluation)) = open.as_mut() {
                        evaluation.member(&entry);
                    }
                }
                None => {}
            }
        }

        match parser.finish() {
            Some(set) => {
                warn!(set = %set, "listing ended inside the set header, skipping set");
                self.counters.record_truncated();
            }
            None => {
                if let Some(done) = open.take() {
                    self.complete(done, on_kept)?;
                }
            }
        }

        Ok(())
    }

    fn open(&mut self, name: String) -> OpenSet<'a> {
        self.counters.record_traversed();

        if self.registry.is_set_excluded(&name) {
            debug!(set = %name, "set excluded by name");
            self.counters.record_excluded_by_name();
            return OpenSet::Excluded;
        }

        OpenSet::Evaluating(BlockEvaluation::new(
            name,
            self.registry,
            self.rules,
            self.options.eval_options(),
        ))
    }

    fn complete<F>(&mut self, open: OpenSet<'a>, on_kept: &mut F) -> Result<(), RunError>
    where
        F: FnMut(&EvaluationResult) -> io::Result<()>,
    {
        let OpenSet::Evaluating(evaluation) = open else {
            return Ok(());
        };

        let result = evaluation.finish();
        debug!(set = %result.name, kept = result.kept, "set evaluated");
        self.counters.fold(&result);
        if result.kept {
            on_kept(&result)?;
        }
        Ok(())
    }
}
