use serde_json::{json, Value};

use crate::CliError;

/// Global response-delay settings accepted by the admin `/settings`
/// endpoint. Constructed only through the validating constructors, so an
/// instance is always transmittable.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalDelay {
    Fixed { milliseconds: i64 },
    Uniform { lower: i64, upper: i64 },
    LogNormal { median: i64, sigma: f64 },
}

impl GlobalDelay {
    pub fn fixed(milliseconds: i64) -> Result<Self, CliError> {
        if milliseconds < 0 {
            return Err(CliError::Delay(
                "fixed delay must be zero or greater".to_owned(),
            ));
        }
        Ok(Self::Fixed { milliseconds })
    }

    pub fn uniform(lower: i64, upper: i64) -> Result<Self, CliError> {
        if lower < 0 || upper < 0 {
            return Err(CliError::Delay(
                "lower and upper bounds must be zero or greater".to_owned(),
            ));
        }
        if lower > upper {
            return Err(CliError::Delay(
                "lower bound must not exceed the upper bound".to_owned(),
            ));
        }
        Ok(Self::Uniform { lower, upper })
    }

    pub fn log_normal(median: i64, sigma: f64) -> Result<Self, CliError> {
        if median < 0 || sigma < 0.0 {
            return Err(CliError::Delay(
                "median and sigma must be zero or greater".to_owned(),
            ));
        }
        Ok(Self::LogNormal { median, sigma })
    }

    /// Wire shape expected by the mock server: a bare `fixedDelay` field
    /// for fixed delays, a `type`-tagged distribution otherwise.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Fixed { milliseconds } => json!({ "fixedDelay": milliseconds }),
            Self::Uniform { lower, upper } => json!({
                "type": "uniform",
                "lower": lower,
                "upper": upper,
            }),
            Self::LogNormal { median, sigma } => json!({
                "type": "lognormal",
                "median": median,
                "sigma": sigma,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::GlobalDelay;
    use crate::CliError;

    #[test]
    fn fixed_rejects_negative_delay() {
        let result = GlobalDelay::fixed(-1);
        assert!(matches!(result, Err(CliError::Delay(_))));
    }

    #[test]
    fn uniform_rejects_inverted_bounds() {
        let result = GlobalDelay::uniform(10, 5);
        assert!(matches!(result, Err(CliError::Delay(_))));
    }

    #[test]
    fn uniform_rejects_negative_bounds() {
        let result = GlobalDelay::uniform(-3, 5);
        assert!(matches!(result, Err(CliError::Delay(_))));
    }

    #[test]
    fn log_normal_rejects_negative_sigma() {
        let result = GlobalDelay::log_normal(5, -1.0);
        assert!(matches!(result, Err(CliError::Delay(_))));
    }

    #[test]
    fn fixed_serializes_bare_field() {
        let delay = GlobalDelay::fixed(500).expect("valid delay");
        assert_eq!(delay.to_json(), json!({ "fixedDelay": 500 }));
    }

    #[test]
    fn uniform_serializes_with_type_tag() {
        let delay = GlobalDelay::uniform(50, 100).expect("valid delay");
        assert_eq!(
            delay.to_json(),
            json!({ "type": "uniform", "lower": 50, "upper": 100 })
        );
    }

    #[test]
    fn log_normal_serializes_with_type_tag() {
        let delay = GlobalDelay::log_normal(90, 0.1).expect("valid delay");
        assert_eq!(
            delay.to_json(),
            json!({ "type": "lognormal", "median": 90, "sigma": 0.1 })
        );
    }
}
