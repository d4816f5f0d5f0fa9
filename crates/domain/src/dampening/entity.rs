use serde::{Deserialize, Serialize};

use super::error::DampeningError;
use crate::common::entity::{Mode, TenantId, TriggerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DampeningStrategy {
    /// N consecutive satisfied eval-sets.
    Strict,
    /// Continuously satisfied for a duration.
    StrictTime,
    /// `StrictTime` restricted to the AUTORESOLVE condition set.
    StrictTimeAutoresolve,
    /// N satisfied out of the last M observations.
    RelaxedCount,
    /// N satisfied within a trailing duration.
    RelaxedTime,
}

impl DampeningStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "STRICT",
            Self::StrictTime => "STRICT_TIME",
            Self::StrictTimeAutoresolve => "STRICT_TIME_AUTORESOLVE",
            Self::RelaxedCount => "RELAXED_COUNT",
            Self::RelaxedTime => "RELAXED_TIME",
        }
    }
}

impl std::fmt::Display for DampeningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debounce policy for one (trigger, mode).
///
/// Settings unused by a strategy are zero. Durations are milliseconds of
/// fact time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dampening {
    pub tenant_id: TenantId,
    pub trigger_id: TriggerId,
    pub trigger_mode: Mode,
    #[serde(rename = "type")]
    pub strategy: DampeningStrategy,
    pub eval_true_setting: u32,
    pub eval_total_setting: u32,
    pub eval_time_setting: i64,
}

impl Dampening {
    fn base(
        tenant_id: TenantId,
        trigger_id: TriggerId,
        trigger_mode: Mode,
        strategy: DampeningStrategy,
    ) -> Self {
        Self {
            tenant_id,
            trigger_id,
            trigger_mode,
            strategy,
            eval_true_setting: 0,
            eval_total_setting: 0,
            eval_time_setting: 0,
        }
    }

    pub fn for_strict(
        tenant_id: TenantId,
        trigger_id: TriggerId,
        trigger_mode: Mode,
        num_consecutive_true: u32,
    ) -> Result<Self, DampeningError> {
        let mut d = Self::base(tenant_id, trigger_id, trigger_mode, DampeningStrategy::Strict);
        d.eval_true_setting = num_consecutive_true;
        d.validate()?;
        Ok(d)
    }

    pub fn for_strict_time(
        tenant_id: TenantId,
        trigger_id: TriggerId,
        trigger_mode: Mode,
        eval_period_ms: i64,
    ) -> Result<Self, DampeningError> {
        let mut d = Self::base(
            tenant_id,
            trigger_id,
            trigger_mode,
            DampeningStrategy::StrictTime,
        );
        d.eval_time_setting = eval_period_ms;
        d.validate()?;
        Ok(d)
    }

    pub fn for_strict_time_autoresolve(
        tenant_id: TenantId,
        trigger_id: TriggerId,
        eval_period_ms: i64,
    ) -> Result<Self, DampeningError> {
        let mut d = Self::base(
            tenant_id,
            trigger_id,
            Mode::Autoresolve,
            DampeningStrategy::StrictTimeAutoresolve,
        );
        d.eval_time_setting = eval_period_ms;
        d.validate()?;
        Ok(d)
    }

    pub fn for_relaxed_count(
        tenant_id: TenantId,
        trigger_id: TriggerId,
        trigger_mode: Mode,
        num_true: u32,
        num_total: u32,
    ) -> Result<Self, DampeningError> {
        let mut d = Self::base(
            tenant_id,
            trigger_id,
            trigger_mode,
            DampeningStrategy::RelaxedCount,
        );
        d.eval_true_setting = num_true;
        d.eval_total_setting = num_total;
        d.validate()?;
        Ok(d)
    }

    pub fn for_relaxed_time(
        tenant_id: TenantId,
        trigger_id: TriggerId,
        trigger_mode: Mode,
        num_true: u32,
        eval_period_ms: i64,
    ) -> Result<Self, DampeningError> {
        let mut d = Self::base(
            tenant_id,
            trigger_id,
            trigger_mode,
            DampeningStrategy::RelaxedTime,
        );
        d.eval_true_setting = num_true;
        d.eval_time_setting = eval_period_ms;
        d.validate()?;
        Ok(d)
    }

    /// STRICT with a count of one: every satisfied eval-set transitions.
    pub fn default_for(tenant_id: TenantId, trigger_id: TriggerId, trigger_mode: Mode) -> Self {
        let mut d = Self::base(tenant_id, trigger_id, trigger_mode, DampeningStrategy::Strict);
        d.eval_true_setting = 1;
        d
    }

    pub fn dampening_id(&self) -> String {
        format!("{}-{}", self.trigger_id, self.trigger_mode)
    }

    pub fn validate(&self) -> Result<(), DampeningError> {
        let invalid = |field, reason: &str| {
            Err(DampeningError::InvalidSetting {
                field,
                reason: reason.to_string(),
            })
        };
        match self.strategy {
            DampeningStrategy::Strict | DampeningStrategy::RelaxedCount
                if self.eval_true_setting == 0 =>
            {
                invalid("evalTrueSetting", "must be at least 1")
            }
            DampeningStrategy::RelaxedCount if self.eval_true_setting > self.eval_total_setting => {
                invalid("evalTotalSetting", "must be >= evalTrueSetting")
            }
            DampeningStrategy::RelaxedTime if self.eval_true_setting == 0 => {
                invalid("evalTrueSetting", "must be at least 1")
            }
            DampeningStrategy::StrictTime
            | DampeningStrategy::StrictTimeAutoresolve
            | DampeningStrategy::RelaxedTime
                if self.eval_time_setting <= 0 =>
            {
                invalid("evalTimeSetting", "must be a positive duration")
            }
            DampeningStrategy::StrictTimeAutoresolve if self.trigger_mode != Mode::Autoresolve => {
                Err(DampeningError::ModeNotAllowed {
                    strategy: self.strategy,
                    mode: self.trigger_mode,
                })
            }
            _ => Ok(()),
        }
    }
}
