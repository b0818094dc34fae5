use crate::error::{ensure_range, InputError};

pub fn check_volume(value: f64) -> Result<f64, InputError> {
    ensure_range("volume", value, 0.0, f64::MAX)
}

pub fn check_aht(value: f64) -> Result<f64, InputError> {
    let value = ensure_range("aht_secs", value, 0.0, f64::MAX)?;
    if value == 0.0 {
        return Err(InputError::new("aht_secs", "must be greater than zero"));
    }
    Ok(value)
}

pub fn check_shrinkage(value: f64) -> Result<f64, InputError> {
    let value = ensure_range("shrinkage", value, 0.0, 1.0)?;
    if value >= 1.0 {
        return Err(InputError::new(
            "shrinkage",
            "must be below 1.0 (agents would never be available)",
        ));
    }
    Ok(value)
}

pub fn check_interval(value: f64) -> Result<f64, InputError> {
    let value = ensure_range("interval_minutes", value, 0.0, f64::MAX)?;
    if value == 0.0 {
        return Err(InputError::new("interval_minutes", "must be greater than zero"));
    }
    Ok(value)
}

/// SLA targets live strictly inside (0, 1): 0 is meaningless and 1 can never
/// be met by a finite agent count.
pub fn check_target_sla(value: f64) -> Result<f64, InputError> {
    let value = ensure_range("target_sla", value, 0.0, 1.0)?;
    if value == 0.0 || value == 1.0 {
        return Err(InputError::new("target_sla", "must be strictly between 0 and 1"));
    }
    Ok(value)
}

pub fn check_answer_secs(value: f64) -> Result<f64, InputError> {
    ensure_range("answer_secs", value, 0.0, f64::MAX)
}

pub fn check_fraction(field: &'static str, value: f64) -> Result<f64, InputError> {
    ensure_range(field, value, 0.0, 1.0)
}

pub fn check_non_negative(field: &'static str, value: f64) -> Result<f64, InputError> {
    ensure_range(field, value, 0.0, f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{check_aht, check_interval, check_shrinkage, check_target_sla, check_volume};

    #[test]
    fn rejects_out_of_range_forecast_fields() {
        assert!(check_volume(-1.0).is_err());
        assert!(check_volume(f64::INFINITY).is_err());
        assert!(check_volume(0.0).is_ok());
        assert!(check_aht(0.0).is_err());
        assert!(check_shrinkage(1.0).is_err());
        assert!(check_shrinkage(0.999).is_ok());
        assert!(check_interval(-30.0).is_err());
    }

    #[test]
    fn target_sla_bounds_are_open() {
        assert!(check_target_sla(0.0).is_err());
        assert!(check_target_sla(1.0).is_err());
        assert!(check_target_sla(1.2).is_err());
        assert_eq!(check_target_sla(0.8).ok(), Some(0.8));
    }
}
