use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::info;

use memwatch::config::{load_config_with_precedence, MemwatchConfig, OutputMode, StopMode};
use memwatch::logging::init_tracing;
use memwatch::pressure::BufferPressure;
use memwatch::report::emit;
use memwatch::{compute_available_budget, Report, SysinfoProvider};

#[derive(Parser, Debug)]
#[command(
    name = "memwatch",
    version,
    about = "Sample memory growth under allocation pressure against an available-memory budget"
)]
struct Cli {
    /// TOML config file; falls back to `MEMWATCH_CONFIG`
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// iterations | threshold
    #[arg(long)]
    stop: Option<StopMode>,
    /// Sample count for `--stop iterations`
    #[arg(long)]
    iterations: Option<usize>,
    /// Upper bound on samples for `--stop threshold`
    #[arg(long)]
    iteration_cap: Option<usize>,
    /// Percent of free memory held back from the budget, 0..100
    #[arg(long, allow_negative_numbers = true)]
    safety_margin: Option<i32>,
    /// Integers allocated per iteration
    #[arg(long)]
    buffer_elements: Option<usize>,
    /// Keep every iteration's buffer until the run ends
    #[arg(long, action = ArgAction::SetTrue)]
    retain: bool,
    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample until the stop condition holds and emit the report
    Run,
    /// Print the available-memory budget and exit
    Budget,
}

fn apply_cli(cfg: &mut MemwatchConfig, cli: &Cli) {
    if let Some(s) = cli.stop {
        cfg.sampling.stop = s;
    }
    if let Some(n) = cli.iterations {
        cfg.sampling.max_iterations = n;
    }
    if let Some(n) = cli.iteration_cap {
        cfg.sampling.iteration_cap = Some(n);
    }
    if let Some(m) = cli.safety_margin {
        cfg.sampling.safety_margin_percent = m;
    }
    if let Some(n) = cli.buffer_elements {
        cfg.pressure.buffer_elements = n;
    }
    if cli.retain {
        cfg.pressure.retain = true;
    }
    if let Some(p) = &cli.output {
        cfg.output.mode = OutputMode::File;
        cfg.output.file_path = Some(p.clone());
    }
    if cli.pretty {
        cfg.output.pretty = true;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config_with_precedence(cli.config.as_ref())?;
    apply_cli(&mut cfg, &cli);
    cfg.validate()?;
    let _log_guard = init_tracing(&cfg.logging)?;
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let provider = SysinfoProvider::new()?;
            let mut workload =
                BufferPressure::new(cfg.pressure.buffer_elements, cfg.pressure.retain);
            let started_at = OffsetDateTime::now_utc();
            let outcome = memwatch::run(
                provider,
                &mut workload,
                cfg.stop_policy(),
                cfg.sampling.safety_margin_percent,
            )
            .context("sampling run failed")?;
            info!(
                retained_bytes = workload.retained_bytes(),
                "releasing workload buffers"
            );
            drop(workload);
            let report = Report::new(outcome, started_at)?;
            emit(&report, &cfg.output).context("emitting report")?;
        }
        Commands::Budget => {
            let mut provider = SysinfoProvider::new()?;
            let budget =
                compute_available_budget(&mut provider, cfg.sampling.safety_margin_percent)?;
            emit(&budget, &cfg.output).context("emitting budget")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("memwatch").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn flags_override_file_and_env_values() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("memwatch.toml");
        fs::write(
            &cfg_path,
            "[sampling]\nmax_iterations = 8\nsafety_margin_percent = 20\n\n[pressure]\nretain = false\n",
        )
        .unwrap();
        let mut cfg = memwatch::config::load_config_file(&cfg_path).unwrap();
        memwatch::config::apply_env_overrides(&mut cfg, |k: &str| {
            (k == "MEMWATCH_MAX_ITERATIONS").then(|| "16".to_string())
        })
        .unwrap();
        assert_eq!(cfg.sampling.max_iterations, 16);

        let report = dir.path().join("out").join("report.json");
        let report_arg = report.to_str().unwrap();
        let cli = parse(&[
            "--iterations",
            "32",
            "--safety-margin",
            "5",
            "--retain",
            "--output",
            report_arg,
            "run",
        ]);
        apply_cli(&mut cfg, &cli);
        assert_eq!(cfg.sampling.max_iterations, 32);
        assert_eq!(cfg.sampling.safety_margin_percent, 5);
        assert!(cfg.pressure.retain);
        assert_eq!(cfg.output.mode, OutputMode::File);
        assert_eq!(cfg.output.file_path.as_deref(), Some(report.as_path()));
        assert!(matches!(cli.command, Some(Commands::Run)));
    }

    #[test]
    fn absent_flags_leave_config_untouched() {
        let mut cfg = MemwatchConfig::default();
        cfg.sampling.max_iterations = 8;
        cfg.sampling.safety_margin_percent = 20;
        cfg.pressure.retain = true;
        let before = cfg.clone();
        apply_cli(&mut cfg, &parse(&[]));
        assert_eq!(cfg, before);
    }

    #[test]
    fn stop_mode_and_cap_flags() {
        let mut cfg = MemwatchConfig::default();
        let cli = parse(&["--stop", "threshold", "--iteration-cap", "200", "budget"]);
        apply_cli(&mut cfg, &cli);
        assert_eq!(
            cfg.stop_policy(),
            memwatch::StopPolicy::Threshold { cap: Some(200) }
        );
        assert!(matches!(cli.command, Some(Commands::Budget)));
    }

    #[test]
    fn negative_margin_parses_then_fails_validation() {
        let mut cfg = MemwatchConfig::default();
        apply_cli(&mut cfg, &parse(&["--safety-margin", "-5"]));
        assert_eq!(cfg.sampling.safety_margin_percent, -5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_stop_mode_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["memwatch", "--stop", "forever"]).is_err());
    }
}
