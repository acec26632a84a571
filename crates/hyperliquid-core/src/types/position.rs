//! Point-in-time position snapshot for a wallet.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Open positions and margin usage at fetch time.
///
/// Independent of the historical series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub num_positions: u32,
    pub unrealized_pnl: Decimal,
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
    /// Sum of absolute position values.
    pub total_notional: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl PositionSnapshot {
    /// Margin used as a percentage of account value.
    ///
    /// `None` for empty accounts and when the ratio does not fit a `Decimal`.
    pub fn exposure_pct(&self) -> Option<f64> {
        if self.account_value.is_zero() {
            return None;
        }
        self.total_margin_used
            .checked_div(self.account_value)?
            .checked_mul(Decimal::ONE_HUNDRED)?
            .to_f64()
    }

    /// Account value minus margin in use.
    pub fn available_margin(&self) -> Decimal {
        self.account_value - self.total_margin_used
    }
}
