//! CSV bar loading and CSV result export.
//!
//! Bar files carry a header `timestamp,open,high,low,close,volume`. Timestamps
//! are RFC 3339 strings or integer epoch milliseconds. Rows are sorted and
//! deduplicated on timestamp (first row wins) before the series is validated.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PhaseTraderError;
use crate::domain::ohlcv::{Bar, validate_series};
use crate::domain::sweep::SweepRow;
use crate::domain::trade::Trade;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

/// Loads `<base_path>/<symbol>.csv`.
pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

impl DataPort for CsvAdapter {
    fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, PhaseTraderError> {
        let path = self.csv_path(symbol);
        let bars = read_bars(&path)?;
        if bars.is_empty() {
            return Err(PhaseTraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        info!(symbol, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
struct RawBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PhaseTraderError> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            PhaseTraderError::Data {
                reason: format!("epoch milliseconds out of range: {}", raw),
            }
        });
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| PhaseTraderError::Data {
            reason: format!("invalid timestamp '{}': {}", raw, e),
        })
}

/// Read, sort, dedup and validate one bar file.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, PhaseTraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut bars = Vec::new();
    for (line, result) in rdr.deserialize::<RawBar>().enumerate() {
        let raw = result?;
        let timestamp = parse_timestamp(&raw.timestamp).map_err(|e| PhaseTraderError::Data {
            reason: format!("{} row {}: {}", path.display(), line + 1, e),
        })?;
        bars.push(Bar {
            timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        });
    }

    let read = bars.len();
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < read {
        debug!(dropped = read - bars.len(), "dropped duplicate timestamps");
    }

    validate_series(&bars)?;
    Ok(bars)
}

pub fn write_bars(path: &Path, bars: &[Bar]) -> Result<(), PhaseTraderError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `trades.csv`, `equity.csv` and `metrics.csv` into a directory.
pub struct CsvReportAdapter;

#[derive(Debug, Serialize)]
struct TradeRecord {
    status: &'static str,
    side: String,
    entry_time: DateTime<Utc>,
    entry_price: f64,
    stop_price: f64,
    target_price: f64,
    units: f64,
    confidence: f64,
    stop_source: String,
    exit_time: Option<DateTime<Utc>>,
    exit_price: Option<f64>,
    pnl: Option<f64>,
    reason: Option<String>,
}

impl From<&Trade> for TradeRecord {
    fn from(trade: &Trade) -> Self {
        let entry = trade.entry();
        let exit = trade.exit();
        TradeRecord {
            status: if trade.is_pending() { "pending" } else { "closed" },
            side: entry.side.to_string(),
            entry_time: entry.entry_time,
            entry_price: entry.entry_price,
            stop_price: entry.stop_price,
            target_price: entry.target_price,
            units: entry.units,
            confidence: entry.confidence,
            stop_source: entry.stop_source.to_string(),
            exit_time: exit.map(|x| x.exit_time),
            exit_price: exit.map(|x| x.exit_price),
            pnl: exit.map(|x| x.pnl),
            reason: exit.map(|x| x.reason.to_string()),
        }
    }
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), PhaseTraderError> {
    let mut wtr = csv::Writer::from_writer(File::create(path)?);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), PhaseTraderError> {
        fs::create_dir_all(output_dir)?;

        write_rows(
            &output_dir.join("trades.csv"),
            result.trades.iter().map(TradeRecord::from),
        )?;
        write_rows(&output_dir.join("equity.csv"), &result.equity_curve)?;
        write_rows(&output_dir.join("metrics.csv"), [&result.metrics])?;

        info!(dir = %output_dir.display(), trades = result.trades.len(), "wrote report");
        Ok(())
    }

    fn write_sweep(&self, rows: &[SweepRow], output_path: &Path) -> Result<(), PhaseTraderError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_rows(output_path, rows)?;
        info!(path = %output_path.display(), rows = rows.len(), "wrote sweep");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestConfig, run_backtest};
    use crate::domain::synthetic::generate_bars;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    const HEADER: &str = "timestamp,open,high,low,close,volume\n";

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn load_bars_rfc3339() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "BTC.csv",
            &format!(
                "{HEADER}2024-01-15T00:00:00Z,100.0,110.0,90.0,105.0,50000\n\
                 2024-01-15T00:15:00Z,105.0,115.0,100.0,110.0,60000\n"
            ),
        );
        let bars = CsvAdapter::new(dir.path().to_path_buf())
            .load_bars("BTC")
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[1].volume, 60000.0);
    }

    #[test]
    fn epoch_millis_sorted_and_deduplicated() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "ETH.csv",
            &format!(
                "{HEADER}1704068100000,2,3,1,2.5,10\n\
                 1704067200000,1,2,0.5,1.5,10\n\
                 1704068100000,9,9,9,9,9\n"
            ),
        );
        let bars = CsvAdapter::new(dir.path().to_path_buf())
            .load_bars("ETH")
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.timestamp(), 1_704_067_200);
        assert_eq!(bars[1].close, 2.5);
    }

    #[test]
    fn empty_file_is_no_data() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "EMPTY.csv", HEADER);
        let err = CsvAdapter::new(dir.path().to_path_buf())
            .load_bars("EMPTY")
            .unwrap_err();
        assert!(matches!(err, PhaseTraderError::NoData { symbol } if symbol == "EMPTY"));
    }

    #[test]
    fn missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(
            CsvAdapter::new(dir.path().to_path_buf())
                .load_bars("NOPE")
                .is_err()
        );
    }

    #[test]
    fn bad_price_is_csv_error() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "BAD.csv",
            &format!("{HEADER}2024-01-15T00:00:00Z,abc,1,1,1,1\n"),
        );
        let err = CsvAdapter::new(dir.path().to_path_buf())
            .load_bars("BAD")
            .unwrap_err();
        assert!(matches!(err, PhaseTraderError::Csv(_)));
    }

    #[test]
    fn bad_timestamp_is_data_error() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "TS.csv", &format!("{HEADER}yesterday,1,1,1,1,1\n"));
        let err = CsvAdapter::new(dir.path().to_path_buf())
            .load_bars("TS")
            .unwrap_err();
        assert!(matches!(err, PhaseTraderError::Data { .. }));
    }

    #[test]
    fn written_bars_read_back() {
        let dir = TempDir::new().unwrap();
        let bars = generate_bars(30, 9, 100.0, Duration::minutes(15));
        let path = dir.path().join("SYN.csv");
        write_bars(&path, &bars).unwrap();

        let loaded = read_bars(&path).unwrap();
        assert_eq!(loaded.len(), bars.len());
        for (a, b) in loaded.iter().zip(&bars) {
            assert_eq!(a.timestamp, b.timestamp);
            assert!((a.close - b.close).abs() < 1e-9);
        }
    }

    #[test]
    fn report_writes_three_files() {
        let dir = TempDir::new().unwrap();
        let bars = generate_bars(300, 4, 100.0, Duration::minutes(15));
        let result = run_backtest(&bars, &BacktestConfig::default());

        let out = dir.path().join("report");
        CsvReportAdapter.write(&result, &out).unwrap();

        let equity = fs::read_to_string(out.join("equity.csv")).unwrap();
        assert_eq!(equity.lines().count(), result.equity_curve.len() + 1);
        assert!(equity.starts_with("timestamp,equity,exposure"));

        let trades = fs::read_to_string(out.join("trades.csv")).unwrap();
        let trade_rows = trades.lines().filter(|l| !l.starts_with("status")).count();
        assert_eq!(trade_rows, result.trades.len());

        let metrics = fs::read_to_string(out.join("metrics.csv")).unwrap();
        assert_eq!(metrics.lines().count(), 2);
        assert!(metrics.contains("final_equity"));
    }

    #[test]
    fn sweep_rows_written() {
        let dir = TempDir::new().unwrap();
        let rows = vec![SweepRow {
            risk_pct: 0.001,
            stop_atr_mult: 1.5,
            target_r: 3.0,
            final_equity: 10_010.0,
            max_drawdown: -0.01,
            total_trades: 2,
            win_rate: 0.5,
        }];
        let path = dir.path().join("sweep.csv");
        CsvReportAdapter.write_sweep(&rows, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("risk_pct,stop_atr_mult,target_r,final_equity,max_drawdown,total_trades,win_rate")
        );
        assert_eq!(lines.next(), Some("0.001,1.5,3.0,10010.0,-0.01,2,0.5"));
    }
}
