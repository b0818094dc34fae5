use thiserror::Error;

/// Malformed or out-of-range forecast, target, pricing or context input.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct InputError {
    pub field: &'static str,
    pub reason: String,
}

impl InputError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check that `value` is finite and inside `[min, max]`.
pub(crate) fn ensure_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, InputError> {
    if !value.is_finite() {
        return Err(InputError::new(field, format!("must be finite, got {value}")));
    }
    if value < min || value > max {
        return Err(InputError::new(
            field,
            format!("must be within [{min}, {max}], got {value}"),
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapacityError {
    #[error("queue is unstable: offered load {offered_load} Erlangs cannot be served")]
    UnstableQueue { offered_load: f64 },
    #[error(
        "target service level {target_sla} unreachable within {ceiling} agents \
         (offered load {offered_load:.3} Erlangs)"
    )]
    TargetUnreachable {
        target_sla: f64,
        offered_load: f64,
        ceiling: u32,
    },
    #[error("{agents} agents at shrinkage {shrinkage} need more headcount than can be represented")]
    HeadcountOverflow { agents: u32, shrinkage: f64 },
}

/// Errors that end a decision run. Provider and validation failures never
/// surface here; they are absorbed by the fallback path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// The worker sizing the scenarios panicked or was cancelled.
    #[error("staffing task aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Input(_) => 2,
            Self::Capacity(_) => 3,
            Self::Aborted(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_range, CapacityError, InputError, PipelineError};

    #[test]
    fn range_check_names_the_field() {
        let err = ensure_range("shrinkage", 1.5, 0.0, 0.99).unwrap_err();
        assert_eq!(err.field, "shrinkage");
        assert!(err.to_string().starts_with("invalid shrinkage"));
        assert!(ensure_range("volume", f64::NAN, 0.0, f64::MAX).is_err());
        assert_eq!(ensure_range("volume", 4.0, 0.0, 10.0), Ok(4.0));
    }

    #[test]
    fn pipeline_errors_map_to_distinct_exit_codes() {
        let input: PipelineError = InputError::new("aht_secs", "must be positive").into();
        let capacity: PipelineError = CapacityError::UnstableQueue {
            offered_load: f64::INFINITY,
        }
        .into();
        assert_eq!(input.exit_code(), 2);
        assert_eq!(capacity.exit_code(), 3);
        assert_eq!(PipelineError::Aborted("panicked".to_string()).exit_code(), 1);
    }
}
