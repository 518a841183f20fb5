/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Command-line front end for quarto-xml-tasks: rewrites an XML document
 * using a YAML rule file and/or rules given as flags.
 */

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use quarto_xml_tasks::{CallbackPolicy, IoSink, Rule, RuleSet, TaskRunner, load_rules};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "xml-tasks")]
#[command(about = "Streaming XML tag rewriter")]
struct Args {
    /// Input XML file ("-" or omitted reads stdin)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file ("-" or omitted writes stdout)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// YAML rule file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Indent output, dropping line-break whitespace from the input
    #[arg(long)]
    indent: bool,

    /// Spaces per indentation level
    #[arg(long, value_name = "N")]
    indent_size: Option<usize>,

    /// Write an XML declaration first
    #[arg(long)]
    header: bool,

    /// Drop line-break whitespace even without indentation
    #[arg(long)]
    clear_indentation: bool,

    /// Abort on the first failing rule instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Delete every TAG and its content
    #[arg(long = "delete", value_name = "TAG")]
    delete: Vec<String>,

    /// Rename every OLD tag to NEW
    #[arg(long = "rename", value_name = "OLD=NEW", value_parser = parse_rename)]
    rename: Vec<(String, String)>,

    /// Verbose logging to stderr (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_rename(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((old, new)) if !old.is_empty() && !new.is_empty() => {
            Ok((old.to_string(), new.to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got '{}'", value)),
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "xml_tasks=info,quarto_xml_tasks=warn",
        1 => "xml_tasks=debug,quarto_xml_tasks=debug",
        _ => "xml_tasks=trace,quarto_xml_tasks=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Rule file contents with command-line flags applied on top.
fn build_rules(args: &Args) -> Result<RuleSet> {
    let mut rules = match &args.config {
        Some(path) => {
            let yaml = fs::read_to_string(path)
                .with_context(|| format!("Failed to read rule file: {:?}", path))?;
            load_rules(&yaml).with_context(|| format!("Invalid rule file: {:?}", path))?
        }
        None => RuleSet::default(),
    };

    let options = &mut rules.options;
    if args.indent {
        options.indentation = true;
    }
    if let Some(size) = args.indent_size {
        options.indentation_size = size;
    }
    if args.header {
        options.header.print = true;
    }
    if args.clear_indentation {
        options.clear_indentation = true;
    }
    if args.strict {
        options.callback_faults = CallbackPolicy::Strict;
    }

    rules.rules.extend(args.delete.iter().map(Rule::delete));
    rules
        .rules
        .extend(args.rename.iter().map(|(old, new)| Rule::rename(old, new)));
    rules.validate()?;
    Ok(rules)
}

fn is_stdio(path: Option<&Path>) -> bool {
    path.is_none_or(|p| p.as_os_str() == "-")
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) if !is_stdio(Some(path)) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {:?}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) if !is_stdio(Some(path)) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let rules = build_rules(&args)?;

    let mut runner = TaskRunner::with_options(rules.options.clone());
    rules.register(runner.registry_mut());
    tracing::debug!(
        tasks = ?runner.registry().names().collect::<Vec<_>>(),
        "Registered rules"
    );
    runner.set_input(open_input(args.input.as_deref())?);

    let sink = IoSink::new(open_output(args.output.as_deref())?);
    let mut output = runner.execute(sink).context("Failed to transform XML")?.into_inner();
    output.flush().context("Failed to write output")?;

    if !is_stdio(args.output.as_deref()) {
        tracing::info!(output = ?args.output, "Wrote output");
    }
    Ok(())
}
