use anyhow::Result;
use async_trait::async_trait;

/// Result of one claim attempt as reported by a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimOutcome {
    pub success: bool,
    pub amount: f64,
    pub message: String,
}

impl ClaimOutcome {
    pub fn success(amount: f64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            amount,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            amount: 0.0,
            message: message.into(),
        }
    }

    /// Drivers must report a finite, non-negative amount.
    pub fn is_well_formed(&self) -> bool {
        self.amount.is_finite() && self.amount >= 0.0
    }
}

#[async_trait]
pub trait ClaimDriver<Ctx>: Send + Sync {
    /// Registry key of the driver
    fn name(&self) -> &str;

    /// Performs one claim attempt.
    ///
    /// `Ok` carries the outcome, successful or not. `Err` is reserved for
    /// faults the driver could not classify; the scheduler records those
    /// with status `error`.
    async fn claim(&self, ctx: &Ctx) -> Result<ClaimOutcome>;
}
