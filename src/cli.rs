//! CLI definition and dispatch.

use chrono::Duration;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::adapters::csv_adapter::{CsvAdapter, CsvReportAdapter, write_bars};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult, PreparedSeries, run_backtest};
use crate::domain::confidence::ConfidenceScorer;
use crate::domain::config_validation::build_backtest_config;
use crate::domain::error::PhaseTraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::phase::classify_at;
use crate::domain::sweep::{SweepGrid, run_sweep};
use crate::domain::synthetic::generate_bars;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "phasetrader", about = "Market phase classifier and backtester")]
pub struct Cli {
    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write trades, equity and metrics
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Bar CSV; overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify the most recent bar
    Phase {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Run a grid of risk/stop/target settings
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        risk: Vec<f64>,
        #[arg(long = "stop-mult", value_delimiter = ',')]
        stop_mult: Vec<f64>,
        #[arg(long = "target-r", value_delimiter = ',')]
        target_r: Vec<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build and validate a configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write a deterministic synthetic bar series
    Synth {
        #[arg(short = 'n', long = "bars", value_parser = clap::value_parser!(u64).range(1..))]
        bars: u64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 100.0)]
        start_price: f64,
        #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(i64).range(1..))]
        interval_minutes: i64,
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialised");
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest_command(&config, data.as_deref(), output.as_deref()),
        Command::Phase { config, data } => run_phase(&config, data.as_deref()),
        Command::Sweep {
            config,
            data,
            risk,
            stop_mult,
            target_r,
            output,
        } => {
            let grid = build_grid(risk, stop_mult, target_r);
            run_sweep_command(&config, data.as_deref(), &grid, output.as_deref())
        }
        Command::Validate { config } => run_validate(&config),
        Command::Synth {
            bars,
            seed,
            start_price,
            interval_minutes,
            output,
        } => run_synth(bars as usize, seed, start_price, interval_minutes, &output),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Empty axes fall back to the default grid's values.
pub fn build_grid(risk: Vec<f64>, stop_mult: Vec<f64>, target_r: Vec<f64>) -> SweepGrid {
    let default = SweepGrid::default();
    let or_default = |given: Vec<f64>, fallback: Vec<f64>| {
        if given.is_empty() { fallback } else { given }
    };
    SweepGrid {
        risk_pcts: or_default(risk, default.risk_pcts),
        stop_atr_mults: or_default(stop_mult, default.stop_atr_mults),
        target_rs: or_default(target_r, default.target_rs),
    }
}

fn load_config(path: &Path) -> Result<(FileConfigAdapter, BacktestConfig), PhaseTraderError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    let config = build_backtest_config(&adapter)?;
    Ok((adapter, config))
}

/// Bar file from `-d`, else `[data] path`. The file stem is the symbol.
pub fn resolve_data_path(
    data: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, PhaseTraderError> {
    match data {
        Some(path) => Ok(path.to_path_buf()),
        None => config
            .get_string("data", "path")
            .map(PathBuf::from)
            .ok_or_else(|| PhaseTraderError::ConfigMissing {
                section: "data".to_string(),
                key: "path".to_string(),
            }),
    }
}

fn load_bars(data: Option<&Path>, config: &dyn ConfigPort) -> Result<Vec<Bar>, PhaseTraderError> {
    let path = resolve_data_path(data, config)?;
    let symbol = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| PhaseTraderError::Data {
            reason: format!("no file name in {}", path.display()),
        })?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    eprintln!("Loading bars for {} from {}", symbol, path.display());
    CsvAdapter::new(base.to_path_buf()).load_bars(&symbol)
}

fn run_backtest_command(
    config_path: &Path,
    data: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), PhaseTraderError> {
    let (adapter, config) = load_config(config_path)?;
    let bars = load_bars(data, &adapter)?;

    let result = run_backtest(&bars, &config);
    print_summary(bars.len(), &result);

    if let Some(dir) = output {
        CsvReportAdapter.write(&result, dir)?;
        eprintln!("\nReport written to: {}", dir.display());
    }
    Ok(())
}

fn print_summary(bar_count: usize, result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results ===");
    if m.insufficient_data {
        eprintln!("Insufficient data: {} bars", bar_count);
        return;
    }
    eprintln!("Bars:             {}", bar_count);
    eprintln!("Final Equity:     {:.2}", m.final_equity);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", m.cagr * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Max Drawdown:     {:.2}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Open Trades:      {}", m.open_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("Avg Exposure:     {:.2}", m.avg_exposure);
}

fn run_phase(config_path: &Path, data: Option<&Path>) -> Result<(), PhaseTraderError> {
    let (adapter, config) = load_config(config_path)?;
    let bars = load_bars(data, &adapter)?;

    let prepared = PreparedSeries::new(&bars, &config.indicators);
    let last = bars.len() - 1;
    let reading = classify_at(
        &bars,
        &prepared.rows,
        &prepared.pivots,
        last,
        &config.indicators,
        &config.phase,
    );

    let mut scorer = ConfidenceScorer::new(config.confidence.clone());
    for row in &prepared.rows {
        scorer.update(row);
    }
    let confidence = scorer.score(&prepared.rows[last]);

    eprintln!("\n=== Phase at {} ===", bars[last].timestamp);
    eprintln!("Close:       {:.4}", bars[last].close);
    eprintln!("Phase:       {}", reading.phase);
    eprintln!("Trend:       {}", reading.trend);
    eprintln!("Momentum:    {}", reading.momentum);
    eprintln!("Volatility:  {}", reading.volatility);
    eprintln!("Proximity:   {}", reading.proximity);
    eprintln!("Score:       {}", reading.score);
    eprintln!("Confidence:  {:.3}", confidence);
    if let Some(d) = &reading.bearish_divergence {
        eprintln!("Divergence:  bearish ({} -> {})", d.pivot_pair.0, d.pivot_pair.1);
    }
    if let Some(d) = &reading.bullish_divergence {
        eprintln!("Divergence:  bullish ({} -> {})", d.pivot_pair.0, d.pivot_pair.1);
    }
    match &reading.suggestion {
        Some(s) => eprintln!("Suggestion:  {} {}", s.side, s),
        None => eprintln!("Suggestion:  none"),
    }
    Ok(())
}

fn run_sweep_command(
    config_path: &Path,
    data: Option<&Path>,
    grid: &SweepGrid,
    output: Option<&Path>,
) -> Result<(), PhaseTraderError> {
    let (adapter, config) = load_config(config_path)?;
    let bars = load_bars(data, &adapter)?;

    eprintln!("Sweeping {} configurations over {} bars", grid.size(), bars.len());
    let rows = run_sweep(&bars, &config, grid);

    match output {
        Some(path) => {
            CsvReportAdapter.write_sweep(&rows, path)?;
            eprintln!("\nSweep written to: {}", path.display());
        }
        None => {
            println!("risk_pct,stop_atr_mult,target_r,final_equity,max_drawdown,total_trades,win_rate");
            for r in &rows {
                println!(
                    "{},{},{},{:.2},{:.4},{},{:.4}",
                    r.risk_pct,
                    r.stop_atr_mult,
                    r.target_r,
                    r.final_equity,
                    r.max_drawdown,
                    r.total_trades,
                    r.win_rate
                );
            }
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), PhaseTraderError> {
    let (_, config) = load_config(config_path)?;
    eprintln!("Config validated successfully");
    eprintln!("  initial_capital: {}", config.initial_capital);
    eprintln!("  risk_pct:        {}", config.risk_pct);
    eprintln!("  stop_atr_mult:   {}", config.stop_atr_mult);
    eprintln!("  target_r:        {}", config.target_r);
    eprintln!("  shorts:          {}", config.shorts_enabled());
    eprintln!("  warmup_bars:     {}", config.warmup_bars);
    eprintln!("  min bars:        {}", config.min_bars());
    Ok(())
}

fn run_synth(
    n: usize,
    seed: u64,
    start_price: f64,
    interval_minutes: i64,
    output: &Path,
) -> Result<(), PhaseTraderError> {
    let bars = generate_bars(n, seed, start_price, Duration::minutes(interval_minutes));
    write_bars(output, &bars)?;
    eprintln!("Wrote {} bars to {}", bars.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backtest() {
        let cli = Cli::try_parse_from([
            "phasetrader",
            "backtest",
            "-c",
            "cfg.ini",
            "-d",
            "bars.csv",
            "-o",
            "out",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Backtest {
                config,
                data,
                output,
            } => {
                assert_eq!(config, PathBuf::from("cfg.ini"));
                assert_eq!(data, Some(PathBuf::from("bars.csv")));
                assert_eq!(output, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_sweep_lists() {
        let cli = Cli::try_parse_from([
            "phasetrader",
            "sweep",
            "-c",
            "cfg.ini",
            "--risk",
            "0.001,0.002",
            "--stop-mult",
            "1.5",
        ])
        .unwrap();
        match cli.command {
            Command::Sweep {
                risk,
                stop_mult,
                target_r,
                ..
            } => {
                let grid = build_grid(risk, stop_mult, target_r);
                assert_eq!(grid.risk_pcts, vec![0.001, 0.002]);
                assert_eq!(grid.stop_atr_mults, vec![1.5]);
                assert_eq!(grid.target_rs, vec![3.0]);
                assert_eq!(grid.size(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn synth_rejects_zero_interval() {
        let parsed = Cli::try_parse_from([
            "phasetrader",
            "synth",
            "-n",
            "10",
            "--interval-minutes",
            "0",
            "-o",
            "bars.csv",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn synth_defaults() {
        let cli =
            Cli::try_parse_from(["phasetrader", "synth", "-n", "10", "-o", "bars.csv"]).unwrap();
        match cli.command {
            Command::Synth {
                bars,
                seed,
                start_price,
                interval_minutes,
                ..
            } => {
                assert_eq!(bars, 10);
                assert_eq!(seed, 42);
                assert_eq!(start_price, 100.0);
                assert_eq!(interval_minutes, 15);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn data_path_from_config() {
        let adapter = FileConfigAdapter::from_string("[data]\npath = data/BTC.csv\n").unwrap();
        assert_eq!(
            resolve_data_path(None, &adapter).unwrap(),
            PathBuf::from("data/BTC.csv")
        );
        assert_eq!(
            resolve_data_path(Some(Path::new("x.csv")), &adapter).unwrap(),
            PathBuf::from("x.csv")
        );
    }

    #[test]
    fn missing_data_path_is_config_error() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        let err = resolve_data_path(None, &adapter).unwrap_err();
        assert!(matches!(err, PhaseTraderError::ConfigMissing { .. }));
    }
}
