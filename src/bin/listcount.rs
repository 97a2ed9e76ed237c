//! Command-line front end: collects the run parameters, runs the
//! simulation and prints the summary.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use bounded_buffer::retry::DEFAULT_MICROS;
use bounded_buffer::{logging, RetryPolicy, RunStatus, SimConfig, Simulation};
use clap::Parser;

/// Producers and consumers sharing one bounded buffer.
#[derive(Debug, Parser)]
#[command(name = "listcount", version)]
struct Cli {
    /// TOML file with run parameters; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of items held by the buffer at once.
    #[arg(long)]
    capacity: Option<usize>,

    /// Number of producer ("user") threads.
    #[arg(long)]
    producers: Option<usize>,

    /// Number of consumer ("server") threads.
    #[arg(long)]
    consumers: Option<usize>,

    /// Total number of items to produce.
    #[arg(long, conflicts_with = "per_producer")]
    items: Option<usize>,

    /// Items each producer adds; total becomes this times --producers.
    #[arg(long)]
    per_producer: Option<usize>,

    /// What workers do after a failed attempt: immediate, yield, snooze, sleep or jitter.
    #[arg(long)]
    retry: Option<String>,

    /// Pause in microseconds for the sleep and jitter policies.
    #[arg(long, default_value_t = DEFAULT_MICROS)]
    retry_micros: u64,

    /// Abort the run after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Keep every received item and include it in the JSON report.
    #[arg(long)]
    record_items: bool,

    /// Ask for the four run parameters on stdin.
    #[arg(short, long)]
    interactive: bool,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// -v shows full/empty transitions, -vv every item moved.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Re-asks until the answer is a positive integer.
fn prompt_positive(input: &mut impl BufRead, label: &str) -> Result<usize> {
    let mut line = String::new();
    loop {
        println!("Enter {label}: ");
        io::stdout().flush().ok();

        line.clear();
        if input.read_line(&mut line).context("failed to read from stdin")? == 0 {
            bail!("stdin closed while asking for {label}");
        }
        match line.trim().parse::<usize>() {
            Ok(value) if value >= 1 => return Ok(value),
            _ => eprintln!("Please enter a whole number of at least 1"),
        }
    }
}

/// Merges the config file, flags and, with `--interactive`, answers read
/// from `input`. Only parameters not given as flags are asked for.
fn build_config(cli: &Cli, input: &mut impl BufRead) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };

    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(producers) = cli.producers {
        config.producers = producers;
    }
    if let Some(consumers) = cli.consumers {
        config.consumers = consumers;
    }
    if let Some(items) = cli.items {
        config.items = items;
    }

    if cli.interactive {
        if cli.capacity.is_none() {
            config.capacity = prompt_positive(input, "buffer capacity")?;
        }
        if cli.producers.is_none() {
            config.producers = prompt_positive(input, "number of users")?;
        }
        if cli.consumers.is_none() {
            config.consumers = prompt_positive(input, "number of servers")?;
        }
        if cli.items.is_none() && cli.per_producer.is_none() {
            let per_producer = prompt_positive(input, "number of elements per user")?;
            config = config.with_items_per_producer(per_producer);
        }
    }

    if let Some(per_producer) = cli.per_producer {
        config = config.with_items_per_producer(per_producer);
    }
    if let Some(name) = &cli.retry {
        config.retry = RetryPolicy::from_name(name, cli.retry_micros)?;
    }
    if cli.deadline_secs.is_some() {
        config.deadline_secs = cli.deadline_secs;
    }
    if cli.record_items {
        config.record_items = true;
    }

    Ok(config)
}

fn run(cli: Cli) -> Result<RunStatus> {
    logging::init(cli.verbose);

    let config = build_config(&cli, &mut io::stdin().lock())?;
    let simulation = Simulation::new(config).context("invalid run parameters")?;
    let report = simulation.run().context("run failed")?;

    if cli.json {
        println!("{}", report.to_json().context("serializing report")?);
    } else {
        print!("{}", report.render_colored());
    }

    if !report.is_conserved() {
        bail!(
            "item count mismatch: {} enqueued, {} dequeued, {} remaining",
            report.total_enqueued(),
            report.total_dequeued(),
            report.remaining
        );
    }
    Ok(report.status)
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(RunStatus::Interrupted) => ExitCode::from(2),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_skips_invalid_answers() {
        let mut input = Cursor::new("abc\n0\n-3\n7\n");
        assert_eq!(prompt_positive(&mut input, "capacity").unwrap(), 7);
    }

    #[test]
    fn test_prompt_fails_on_eof() {
        let mut input = Cursor::new("0\n");
        assert!(prompt_positive(&mut input, "capacity").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "listcount",
            "--capacity",
            "5",
            "--producers",
            "3",
            "--per-producer",
            "4",
            "--retry",
            "sleep",
            "--retry-micros",
            "10",
        ]);
        let config = build_config(&cli, &mut io::empty()).unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.producers, 3);
        assert_eq!(config.consumers, 10);
        assert_eq!(config.items, 12);
        assert_eq!(config.retry, RetryPolicy::Sleep { micros: 10 });
    }

    #[test]
    fn test_unknown_retry_is_error() {
        let cli = Cli::parse_from(["listcount", "--retry", "never"]);
        assert!(build_config(&cli, &mut io::empty()).is_err());
    }

    #[test]
    fn test_interactive_keeps_flag_values() {
        let cli = Cli::parse_from([
            "listcount",
            "--interactive",
            "--capacity",
            "5",
            "--consumers",
            "2",
        ]);
        let mut input = Cursor::new("3\n4\n");
        let config = build_config(&cli, &mut input).unwrap();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.producers, 3);
        assert_eq!(config.consumers, 2);
        assert_eq!(config.items, 12);
    }

    #[test]
    fn test_interactive_asks_for_everything_by_default() {
        let cli = Cli::parse_from(["listcount", "--interactive"]);
        let mut input = Cursor::new("8\n2\n3\n10\n");
        let config = build_config(&cli, &mut input).unwrap();
        assert_eq!(config, SimConfig::new(8, 2, 3, 20));
    }

    #[test]
    fn test_items_conflicts_with_per_producer() {
        assert!(Cli::try_parse_from(["listcount", "--items", "5", "--per-producer", "2"]).is_err());
    }
}
