pub mod aggregate;
pub mod cli;
pub mod compare;
pub mod config;
pub mod evaluator;
pub mod filter;
pub mod output;
pub mod parser;
pub mod runner;
pub mod source;

use anyhow::Context;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub use aggregate::GlobalCounters;
pub use cli::{Cli, ColorMode, OutputFormat, cli_parse};
pub use compare::{CompareError, ComparisonValue, ObservedValue, Op};
pub use config::{ConfigError, ParserRules, SourceRules, ToolConfig, load_config};
pub use evaluator::{
    BlockCounters, BlockEvaluation, EvalError, EvalOptions, EvaluationResult, evaluate_block,
};
pub use filter::{FilterArgs, FilterError, FilterRegistry, FilterSpec};
pub use output::{Emitter, OutputOptions};
pub use parser::{Block, BlockParser, HeaderLine, MemberEntry, ParseEvent, StructureError};
pub use runner::{DisplayMode, RunError, RunOptions, Runner};
pub use source::{CommandSource, DumpSource, Listing, ListingSource, MemorySource, ReadError};

fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init();
}

fn apply_color_mode(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

fn open_source(cli: &Cli, config: &ToolConfig) -> anyhow::Result<Box<dyn ListingSource>> {
    if let Some(path) = &cli.file {
        if path.as_os_str() == "-" {
            return Ok(Box::new(DumpSource::new("stdin", io::stdin())));
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open listing '{}'", path.display()))?;
        return Ok(Box::new(DumpSource::new(path.display().to_string(), file)));
    }

    let command = cli
        .ipset_command
        .clone()
        .unwrap_or_else(|| config.source.command.clone());
    let timeout = cli
        .timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.source.timeout());

    let source = CommandSource::new(&command, timeout, cli.sets.clone())
        .with_context(|| format!("Failed to enumerate sets with '{command}'"))?;
    Ok(Box::new(source))
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    init_logging(cli.log_level());
    apply_color_mode(cli.color);

    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;

    // every filter is validated before any listing is read
    let registry = FilterRegistry::from_args(&cli.filter_args()).context("Invalid filter")?;

    let run_options = RunOptions {
        display: cli.display_mode(),
        counts: cli.counts,
        totals: cli.totals,
    };
    let output_options = OutputOptions {
        format: cli.format,
        display: run_options.display,
        counts: cli.counts,
        delimiter: output::unescape_delimiter(&cli.delimiter),
    };

    let mut source = open_source(&cli, &config)?;
    let mut emitter = Emitter::new(output_options, open_output(cli.output.as_deref())?);
    let mut runner = Runner::new(&registry, &config.parser, run_options);

    let counters = runner.run(source.as_mut(), |result| emitter.emit_block(result))?;

    if cli.totals {
        emitter.emit_totals(&counters).context("Failed to write totals")?;
    }
    emitter.flush().context("Failed to write output")
}
