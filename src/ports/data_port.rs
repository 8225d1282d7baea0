//! Bar data access port.

use crate::domain::error::PhaseTraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Bars for `symbol`, ascending and strictly increasing in time.
    fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, PhaseTraderError>;
}
