use crate::filter::FilterArgs;
use crate::runner::DisplayMode;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Filter, match and aggregate ipset set listings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Sets to list; every set when omitted
    #[arg(value_name = "SET")]
    pub sets: Vec<String>,

    /// Read a saved listing instead of running the tool ("-" for stdin)
    #[arg(short, long, value_name = "PATH", conflicts_with = "sets")]
    pub file: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH", env = "IPSET_FILTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listing tool to invoke
    #[arg(long, value_name = "COMMAND")]
    pub ipset_command: Option<String>,

    /// Seconds to wait for each listing
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Show set names only
    #[arg(short = 'n', long, conflicts_with_all = ["headers", "members", "all"])]
    pub names: bool,

    /// Show set names and header lines
    #[arg(short = 't', long, conflicts_with_all = ["members", "all"])]
    pub headers: bool,

    /// Show set names and member lines
    #[arg(short = 'm', long, conflicts_with = "all")]
    pub members: bool,

    /// Show names, headers and members (default)
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Show member, match and exclude counts per set
    #[arg(short = 'c', long)]
    pub counts: bool,

    /// Show totals across every set at the end
    #[arg(short = 'T', long)]
    pub totals: bool,

    /// Delimiter placed between members (\n and \t escapes understood)
    #[arg(short = 'd', long, default_value = "\\n")]
    pub delimiter: String,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// When to color output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// More diagnostics on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Errors only on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Keep sets with a header whose key and value match (KEYGLOB:VALUEGLOB)
    #[arg(long = "header", value_name = "KEYGLOB:VALUEGLOB")]
    pub header_globs: Vec<String>,

    /// Keep sets whose numeric header value satisfies a comparison (KEY:CMP)
    #[arg(long = "header-cmp", value_name = "KEY:CMP")]
    pub header_compares: Vec<String>,

    /// Keep sets with a header flag satisfying a comparison (TOKENGLOB:CMP)
    #[arg(long = "flag", value_name = "TOKENGLOB:CMP")]
    pub header_flags: Vec<String>,

    /// Count members whose entry matches a glob
    #[arg(short = 'g', long = "glob", value_name = "PATTERN", conflicts_with = "member_regex")]
    pub member_glob: Option<String>,

    /// Count members whose entry matches a regular expression
    #[arg(short = 'r', long = "regex", value_name = "PATTERN")]
    pub member_regex: Option<String>,

    /// Count members with an option satisfying a comparison (NAMEGLOB:CMP)
    #[arg(long = "option", value_name = "NAMEGLOB:CMP")]
    pub member_options: Vec<String>,

    /// Keep sets whose total member count satisfies a comparison
    #[arg(long = "count", value_name = "CMP")]
    pub member_counts: Vec<String>,

    /// Skip sets whose name matches
    #[arg(long = "exclude-set", value_name = "GLOB")]
    pub exclude_sets: Vec<String>,

    /// Hide matching header lines from the output (KEYGLOB:VALUEGLOB)
    #[arg(long = "exclude-header", value_name = "KEYGLOB:VALUEGLOB")]
    pub exclude_headers: Vec<String>,

    /// Drop members whose value matches a glob
    #[arg(long = "exclude-glob", value_name = "GLOB")]
    pub exclude_member_globs: Vec<String>,

    /// Drop members whose value matches a regular expression
    #[arg(long = "exclude-regex", value_name = "REGEX")]
    pub exclude_member_regexes: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl Cli {
    pub fn display_mode(&self) -> DisplayMode {
        if self.names {
            DisplayMode::Names
        } else if self.headers {
            DisplayMode::Headers
        } else if self.members {
            DisplayMode::Members
        } else {
            DisplayMode::Full
        }
    }

    pub fn filter_args(&self) -> FilterArgs {
        FilterArgs {
            header_globs: self.header_globs.clone(),
            header_compares: self.header_compares.clone(),
            header_flags: self.header_flags.clone(),
            member_glob: self.member_glob.clone(),
            member_regex: self.member_regex.clone(),
            member_options: self.member_options.clone(),
            member_counts: self.member_counts.clone(),
            exclude_sets: self.exclude_sets.clone(),
            exclude_headers: self.exclude_headers.clone(),
            exclude_member_globs: self.exclude_member_globs.clone(),
            exclude_member_regexes: self.exclude_member_regexes.clone(),
        }
    }

    /// Log level picked by -v/-q; `RUST_LOG` still takes precedence
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
