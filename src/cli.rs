use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    ingest::ReadOptions,
    io_utils,
    plan::PipelineConfig,
    render::{RenderMode, RenderOptions},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Project, filter, group, and join tabular text", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Concatenate inputs and run a pipeline of operation tokens over them
    Process(ProcessArgs),
    /// Full-outer join inputs on a key column, then run a pipeline
    Join(JoinArgs),
    /// List the columns of an input with a sample value
    Columns(ColumnsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum InputFormat {
    /// Sniff the format from the first non-empty line
    #[default]
    Auto,
    Csv,
    Tsv,
    /// Fields separated by runs of whitespace
    Space,
    /// Whitespace-separated name=value tokens
    Kv,
    /// One JSON object per line
    Jsonl,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input format
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,
    /// Treat the first row as data and synthesize col0, col1, ... names
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Comma-separated column names (the first row is then data)
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,
    /// Maximum number of rows read from each input
    #[arg(long)]
    pub limit: Option<usize>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl InputArgs {
    pub fn read_options(&self) -> Result<ReadOptions> {
        Ok(ReadOptions {
            format: self.format,
            has_header: !self.no_header,
            fields: self.fields.clone(),
            limit: self.limit,
            encoding: io_utils::resolve_encoding(self.input_encoding.as_deref())?,
        })
    }
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Comma-separated names replacing the final header
    #[arg(long = "header", value_delimiter = ',')]
    pub header: Option<Vec<String>>,
}

impl PipelineArgs {
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            header_override: self.header.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Render output as an aligned table
    #[arg(long = "table", conflicts_with = "blowup")]
    pub table: bool,
    /// Print each row as `name: value` lines
    #[arg(long = "blowup")]
    pub blowup: bool,
    /// Do not print the header line
    #[arg(long = "omit-header")]
    pub omit_header: bool,
    /// Emit 1-based row numbers as the first column
    #[arg(long = "row-numbers")]
    pub row_numbers: bool,
    /// Delimiter for flat output (defaults to tab)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Text printed for absent cells
    #[arg(long = "absent", default_value = "")]
    pub absent: String,
}

impl RenderArgs {
    pub fn render_options(&self) -> RenderOptions {
        let mode = if self.table {
            RenderMode::Aligned
        } else if self.blowup {
            RenderMode::Blowup
        } else {
            RenderMode::Flat
        };
        RenderOptions {
            mode,
            delimiter: self
                .output_delimiter
                .unwrap_or(io_utils::DEFAULT_OUTPUT_DELIMITER),
            include_header: !self.omit_header,
            row_numbers: self.row_numbers,
            absent: self.absent.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// One or more inputs sharing a header (`-` reads stdin)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Prepend a column naming each row's input file
    #[arg(
        long = "tag-source",
        value_name = "NAME",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "source"
    )]
    pub tag_source: Option<String>,
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    #[command(flatten)]
    pub render: RenderArgs,
    /// Operation tokens such as `name`, `1-3`, `?_>1`, `.sort-`, `.hist`
    #[arg(value_name = "OPS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub ops: Vec<String>,
}

#[derive(Debug, Args)]
pub struct JoinArgs {
    /// Two or more inputs, joined left to right
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Column specification of the join key
    #[arg(short = 'k', long = "key")]
    pub key: String,
    /// Key column of the right-hand inputs (defaults to --key)
    #[arg(long = "right-key")]
    pub right_key: Option<String>,
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    #[command(flatten)]
    pub render: RenderArgs,
    /// Operation tokens applied to the joined table
    #[arg(value_name = "OPS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub ops: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Input to inspect (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub input_options: InputArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        "space" | " " => Ok(b' '),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
