//! Runtime settings, read from flags or the process environment
use std::ffi::OsString;

use clap::Parser;

use crate::error::ShopError;
use crate::refund_window::RefundWindow;

pub const DEFAULT_REFUND_PERIOD_MINUTES: u32 = 10;
pub const DEFAULT_CONFLICT_RETRIES: u32 = 2;

/// Settlement settings.
///
/// Also usable as `#[command(flatten)]` in a host binary's own CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Parser)]
#[command(name = "shop-settlement")]
pub struct Settings {
    /// Minutes after a purchase during which a refund can still be filed
    #[arg(
        long,
        env = "REFUND_PERIOD_MINUTES",
        default_value_t = DEFAULT_REFUND_PERIOD_MINUTES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub refund_period_minutes: u32,

    /// Re-runs allowed after a transaction conflict before giving up
    #[arg(
        long,
        env = "SETTLEMENT_CONFLICT_RETRIES",
        default_value_t = DEFAULT_CONFLICT_RETRIES
    )]
    pub conflict_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refund_period_minutes: DEFAULT_REFUND_PERIOD_MINUTES,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl Settings {
    /// Settings from the environment, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ShopError> {
        let _env = dotenvy::dotenv();
        Self::from_args(["shop-settlement"])
    }

    /// Settings from command-line style arguments; unset flags fall back to
    /// the environment and then to the defaults.
    pub fn from_args<I, T>(args: I) -> Result<Self, ShopError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| ShopError::Config(e.to_string()))
    }

    pub fn refund_window(&self) -> RefundWindow {
        RefundWindow::minutes(self.refund_period_minutes)
    }
}
