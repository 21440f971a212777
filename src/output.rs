use crate::aggregate::GlobalCounters;
use crate::cli::OutputFormat;
use crate::evaluator::EvaluationResult;
use crate::runner::DisplayMode;
use colored::Colorize;
use comfy_table::{Cell, Table};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub display: DisplayMode,
    pub counts: bool,
    /// Joins the member lines of one set
    pub delimiter: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            display: DisplayMode::Full,
            counts: false,
            delimiter: "\n".to_string(),
        }
    }
}

/// Turn `\n`, `\t` and `\\` escapes typed on the command line into the
/// characters they stand for
pub fn unescape_delimiter(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn format_block_text(result: &EvaluationResult, options: &OutputOptions) -> String {
    let mut out = String::new();

    if options.display == DisplayMode::Names {
        let _ = writeln!(out, "{}", result.name);
    } else {
        let _ = writeln!(out, "{}", format!("Name: {}", result.name).bold());
    }

    if options.display.shows_headers() {
        for line in &result.header_cache {
            let _ = writeln!(out, "{line}");
        }
    }

    if options.display.shows_members() {
        let _ = writeln!(out, "Members:");
        if !result.member_cache.is_empty() {
            let _ = writeln!(out, "{}", result.member_cache.join(&options.delimiter));
        }
    }

    if options.counts {
        let counters = &result.counters;
        let _ = writeln!(out, "Member count: {}", counters.member_count);
        let _ = writeln!(out, "Match count: {}", counters.match_count);
        let _ = writeln!(out, "Exclude count: {}", counters.exclude_count);
    }

    out
}

pub fn format_block_json(result: &EvaluationResult, options: &OutputOptions) -> Value {
    let mut block = json!({ "name": result.name });

    if options.display.shows_headers() {
        block["headers"] = json!(result.header_cache);
    }
    if options.display.shows_members() {
        block["members"] = json!(result.member_cache);
    }
    if options.counts {
        block["counters"] = json!({
            "member_count": result.counters.member_count,
            "match_count": result.counters.match_count,
            "exclude_count": result.counters.exclude_count,
        });
    }

    block
}

pub fn totals_table(counters: &GlobalCounters) -> Table {
    let mut table = Table::new();
    table.set_header(vec![Cell::new("Total"), Cell::new("Value")]);

    let rows = [
        ("Sets matched", counters.sets_matched),
        ("Sets excluded by name", counters.sets_excluded_by_name),
        ("Sets traversed", counters.sets_traversed),
        ("Sets truncated", counters.sets_truncated),
        ("Members", counters.total_members),
        ("Member matches", counters.total_matches),
        ("Members excluded", counters.total_excluded),
        ("Memory (bytes)", counters.total_memory),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }

    table
}

pub fn format_totals_json(counters: &GlobalCounters) -> Value {
    json!({ "totals": counters })
}

/// Writes kept sets and totals in the selected format
pub struct Emitter<W: Write> {
    options: OutputOptions,
    out: W,
}

impl<W: Write> Emitter<W> {
    pub fn new(options: OutputOptions, out: W) -> Self {
        Self { options, out }
    }

    pub fn emit_block(&mut self, result: &EvaluationResult) -> io::Result<()> {
        match self.options.format {
            OutputFormat::Text => {
                let text = format_block_text(result, &self.options);
                // blank line between sets, except in names-only mode
                if self.options.display == DisplayMode::Names {
                    write!(self.out, "{text}")
                } else {
                    writeln!(self.out, "{text}")
                }
            }
            OutputFormat::Json => {
                writeln!(self.out, "{}", format_block_json(result, &self.options))
            }
        }
    }

    pub fn emit_totals(&mut self, counters: &GlobalCounters) -> io::Result<()> {
        match self.options.format {
            OutputFormat::Text => writeln!(self.out, "{}", totals_table(counters)),
            OutputFormat::Json => writeln!(self.out, "{}", format_totals_json(counters)),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
