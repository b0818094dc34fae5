pub mod validate;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::forecast::validate::{
    check_aht, check_answer_secs, check_interval, check_shrinkage, check_target_sla,
    check_volume,
};

/// Demand for one planning interval. Only constructible through
/// [`ForecastInputs::new`], so every instance is already validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawForecast", into = "RawForecast")]
pub struct ForecastInputs {
    volume: f64,
    aht_secs: f64,
    shrinkage: f64,
    interval_minutes: f64,
}

/// Wire shape of [`ForecastInputs`] before validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawForecast {
    pub volume: f64,
    pub aht_secs: f64,
    #[serde(default)]
    pub shrinkage: f64,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: f64,
}

impl ForecastInputs {
    pub fn new(
        volume: f64,
        aht_secs: f64,
        shrinkage: f64,
        interval_minutes: f64,
    ) -> Result<Self, InputError> {
        Ok(Self {
            volume: check_volume(volume)?,
            aht_secs: check_aht(aht_secs)?,
            shrinkage: check_shrinkage(shrinkage)?,
            interval_minutes: check_interval(interval_minutes)?,
        })
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn aht_secs(&self) -> f64 {
        self.aht_secs
    }

    pub fn shrinkage(&self) -> f64 {
        self.shrinkage
    }

    pub fn interval_minutes(&self) -> f64 {
        self.interval_minutes
    }

    /// Expected concurrent work in Erlangs.
    pub fn offered_load(&self) -> f64 {
        self.volume * self.aht_secs / (self.interval_minutes * 60.0)
    }
}

impl TryFrom<RawForecast> for ForecastInputs {
    type Error = InputError;

    fn try_from(raw: RawForecast) -> Result<Self, Self::Error> {
        Self::new(raw.volume, raw.aht_secs, raw.shrinkage, raw.interval_minutes)
    }
}

impl From<ForecastInputs> for RawForecast {
    fn from(value: ForecastInputs) -> Self {
        Self {
            volume: value.volume,
            aht_secs: value.aht_secs,
            shrinkage: value.shrinkage,
            interval_minutes: value.interval_minutes,
        }
    }
}

/// Service-level goal: `target_sla` of contacts answered within `answer_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawServiceTarget", into = "RawServiceTarget")]
pub struct ServiceTarget {
    target_sla: f64,
    answer_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServiceTarget {
    pub target_sla: f64,
    pub answer_secs: f64,
}

impl ServiceTarget {
    pub fn new(target_sla: f64, answer_secs: f64) -> Result<Self, InputError> {
        Ok(Self {
            target_sla: check_target_sla(target_sla)?,
            answer_secs: check_answer_secs(answer_secs)?,
        })
    }

    pub fn target_sla(&self) -> f64 {
        self.target_sla
    }

    pub fn answer_secs(&self) -> f64 {
        self.answer_secs
    }

    /// Same answer time, different SLA goal.
    pub fn with_sla(&self, target_sla: f64) -> Result<Self, InputError> {
        Self::new(target_sla, self.answer_secs)
    }
}

/// 80% of contacts answered within 60 seconds.
impl Default for ServiceTarget {
    fn default() -> Self {
        Self {
            target_sla: 0.8,
            answer_secs: 60.0,
        }
    }
}

impl TryFrom<RawServiceTarget> for ServiceTarget {
    type Error = InputError;

    fn try_from(raw: RawServiceTarget) -> Result<Self, Self::Error> {
        Self::new(raw.target_sla, raw.answer_secs)
    }
}

impl From<ServiceTarget> for RawServiceTarget {
    fn from(value: ServiceTarget) -> Self {
        Self {
            target_sla: value.target_sla,
            answer_secs: value.answer_secs,
        }
    }
}

fn default_interval_minutes() -> f64 {
    30.0
}
