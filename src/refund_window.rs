//! Refund eligibility policy
use chrono::Duration;

use crate::models::Purchase;
use crate::types::TimeStamp;

/// A purchase can be refunded strictly before `created_at + period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundWindow {
    period: Duration,
}

impl RefundWindow {
    pub fn minutes(minutes: u32) -> Self {
        Self {
            period: Duration::minutes(i64::from(minutes)),
        }
    }

    /// First instant at which the purchase is no longer refundable.
    /// `None` if the deadline falls outside the representable range.
    pub fn deadline(&self, purchase: &Purchase) -> Option<TimeStamp> {
        purchase.created_at.checked_add(self.period)
    }

    pub fn is_eligible(&self, purchase: &Purchase, now: TimeStamp) -> bool {
        match self.deadline(purchase) {
            Some(deadline) => now < deadline,
            // deadline beyond the end of time: still open
            None => true,
        }
    }
}
