use anyhow::Context;
use chrono::Local;
use clap::{ArgAction, Parser};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tocsv::config::{expand_tilde, DEFAULT_CONFIG_FILE};
use tocsv::explain::{config_summary, should_use_colors, terminal_width};
use tocsv::output::{write_tables, write_tables_to_dir};
use tocsv::source::open_sources;
use tocsv::{
    validate, ColorScheme, ErrorStrategy, Explainer, MergedLines, Pipeline, PipelineConfig,
    ProcessingStats, ToolConfig,
};

#[derive(Parser)]
#[command(name = "tocsv")]
#[command(about = "Merge sorted log files and extract configured fields into CSV tables")]
#[command(version = "0.1.0")]
struct Args {
    /// Log files to process, each sorted by line
    #[arg(value_name = "FILES")]
    files: Vec<String>,

    /// Additional log files
    #[arg(short = 'f', long = "files", action = ArgAction::Append)]
    extra_files: Vec<String>,

    /// Config file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// YAML file defining anchors used by the config (overrides AnchorFiles)
    #[arg(short = 'a', long = "anchor", action = ArgAction::Append)]
    anchor_files: Vec<String>,

    /// Print the CSV tables on stdout instead of writing files
    #[arg(short = 'p', long = "print")]
    print: bool,

    /// Show every matched line with its extracted fields highlighted
    #[arg(long)]
    explain: bool,

    /// Debug mode - show processing details
    #[arg(long)]
    debug: bool,

    /// Fail on first error instead of skipping lines
    #[arg(long)]
    fail_fast: bool,

    /// Maximum line length
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,
}

impl Args {
    fn input_files(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .chain(&self.extra_files)
            .map(|f| expand_tilde(f))
            .collect()
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(should_use_colors(&io::stderr())),
        )
        .init();

    if let Err(e) = run(args) {
        eprintln!("tocsv: error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config_path = expand_tilde(&args.config);
    let anchors: Vec<PathBuf> = args.anchor_files.iter().map(|a| expand_tilde(a)).collect();

    let config = ToolConfig::load(&config_path, &anchors)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;
    let rules = validate(&config).context("Config validation failed")?;

    let inputs = args.input_files();
    if inputs.is_empty() {
        let colors = ColorScheme::new(should_use_colors(&io::stdout()));
        print!("{}", config_summary(&rules, &colors, terminal_width()));
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        print_tag_in_output: config.print_tag_in_output,
        error_strategy: if args.fail_fast {
            ErrorStrategy::FailFast
        } else {
            ErrorStrategy::Skip
        },
        buffer_size: args.buffer_size,
        max_line_length: args.max_line_length,
    };

    let sources = open_sources(&inputs, pipeline_config.buffer_size);
    let lines = MergedLines::new(sources);
    let mut pipeline = Pipeline::new(&rules, pipeline_config);

    let output = if args.explain {
        let colors = ColorScheme::new(should_use_colors(&io::stderr()));
        let explainer = Explainer::new(Box::new(io::stderr()), colors, terminal_width());
        pipeline.run_explained(lines, explainer)
    } else {
        pipeline.run(lines)
    }
    .context("Failed to process log files")?;

    if args.print {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write_tables(&mut handle, &output.tables).context("Failed to write CSV to stdout")?;
        handle.flush()?;
    } else {
        let dir = expand_tilde(config.log_directory.as_deref().unwrap_or("."));
        let paths = write_tables_to_dir(&dir, &output.tables, Local::now().date_naive())
            .with_context(|| format!("Failed to write CSV files to '{}'", dir.display()))?;
        for path in paths {
            println!("Data fetched in {}", path.display());
        }
    }

    if args.debug {
        print_stats(&output.stats);
    }

    Ok(())
}

fn print_stats(stats: &ProcessingStats) {
    eprintln!("tocsv: lines read:           {}", stats.lines_read);
    eprintln!("tocsv: lines matched:        {}", stats.lines_matched);
    eprintln!("tocsv: lines unmatched:      {}", stats.lines_unmatched);
    eprintln!("tocsv: lines without fields: {}", stats.lines_without_fields);
    eprintln!("tocsv: lines too long:       {}", stats.lines_too_long);
    eprintln!("tocsv: records emitted:      {}", stats.records_emitted);
    eprintln!("tocsv: blocks discarded:     {}", stats.blocks_discarded);
    eprintln!("tocsv: unterminated blocks:  {}", stats.unterminated_blocks);
    eprintln!(
        "tocsv: processing time:      {}",
        humantime::format_duration(stats.processing_time)
    );
}
