//! Report output port.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PhaseTraderError;
use crate::domain::sweep::SweepRow;

/// Port for writing backtest and sweep results.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), PhaseTraderError>;

    fn write_sweep(&self, rows: &[SweepRow], output_path: &Path) -> Result<(), PhaseTraderError>;
}
