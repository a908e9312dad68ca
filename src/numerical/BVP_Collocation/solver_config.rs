use crate::numerical::BVP_Collocation::BVP_errors::BvpError;
use simplelog::LevelFilter;
use std::collections::HashMap;

/// Parameters of the damped Newton loop and of the IVP integrator used to produce a starting trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub tolerance: f64,              // every entry of the Newton step must be below it
    pub max_iterations: usize,       // outer Newton iterations
    pub ivp_newton_iterations: usize, // Newton corrections per step of the IVP integrator
    pub loglevel: Option<String>,    // "debug", "info", "warn", "error" or "off"; None leaves logging alone
    pub log_to_file: bool,           // also write log_<date>.txt
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: 1e-6,
            max_iterations: 500,
            ivp_newton_iterations: 10,
            loglevel: None,
            log_to_file: false,
        }
    }
}

/// iteration counts come in as f64; only finite non-negative whole numbers are accepted
fn count_param(key: &str, value: f64) -> Result<usize, BvpError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(BvpError::InvalidConfig(format!(
            "{} must be a non-negative whole number, got {}",
            key, value
        )));
    }
    Ok(value as usize)
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from a map of strategy parameters, like {"tolerance": Some(vec![1e-8])}.
    /// Missing keys or None values keep the default.
    pub fn from_params(params: &HashMap<String, Option<Vec<f64>>>) -> Result<Self, BvpError> {
        let mut config = SolverConfig::default();
        for (key, value) in params {
            let Some(value) = value.as_ref().and_then(|v| v.first().copied()) else {
                continue;
            };
            match key.as_str() {
                "tolerance" => config.tolerance = value,
                "max_iterations" => config.max_iterations = count_param(key, value)?,
                "ivp_newton_iterations" => config.ivp_newton_iterations = count_param(key, value)?,
                _ => {
                    return Err(BvpError::InvalidConfig(format!(
                        "unknown solver parameter '{}'",
                        key
                    )));
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_ivp_newton_iterations(mut self, ivp_newton_iterations: usize) -> Self {
        self.ivp_newton_iterations = ivp_newton_iterations;
        self
    }

    pub fn with_loglevel(mut self, loglevel: &str) -> Self {
        self.loglevel = Some(loglevel.to_string());
        self
    }

    pub fn with_log_to_file(mut self, log_to_file: bool) -> Self {
        self.log_to_file = log_to_file;
        self
    }

    pub fn validate(&self) -> Result<(), BvpError> {
        if !(self.tolerance > 0.0) {
            return Err(BvpError::InvalidConfig(format!(
                "tolerance must be greater than 0.0, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations < 1 {
            return Err(BvpError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        self.level_filter()?;
        Ok(())
    }

    /// LevelFilter corresponding to `loglevel`, None if logging is not configured
    pub fn level_filter(&self) -> Result<Option<LevelFilter>, BvpError> {
        let Some(level) = self.loglevel.as_deref() else {
            return Ok(None);
        };
        let filter = match level {
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => {
                return Err(BvpError::InvalidConfig(format!(
                    "loglevel must be debug, info, warn, error or off, got '{}'",
                    level
                )));
            }
        };
        Ok(Some(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.max_iterations, 500);
        assert_eq!(config.ivp_newton_iterations, 10);
        assert!(config.validate().is_ok());
        assert_eq!(config.level_filter().unwrap(), None);
    }

    #[test]
    fn test_from_params() {
        let params = HashMap::from([
            ("tolerance".to_string(), Some(vec![1e-8])),
            ("max_iterations".to_string(), Some(vec![50.0])),
            ("ivp_newton_iterations".to_string(), None),
        ]);
        let config = SolverConfig::from_params(&params).unwrap();
        assert_eq!(config.tolerance, 1e-8);
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.ivp_newton_iterations, 10);

        let params = HashMap::from([("DampFactor".to_string(), Some(vec![0.5]))]);
        assert!(matches!(
            SolverConfig::from_params(&params),
            Err(BvpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_params_rejects_bad_counts() {
        for value in [-1.0, f64::NAN, f64::INFINITY, 2.5] {
            let params = HashMap::from([("ivp_newton_iterations".to_string(), Some(vec![value]))]);
            assert!(matches!(
                SolverConfig::from_params(&params),
                Err(BvpError::InvalidConfig(_))
            ));
        }
        let params = HashMap::from([("max_iterations".to_string(), Some(vec![-3.0]))]);
        assert!(SolverConfig::from_params(&params).is_err());
        // zero corrections is a valid (explicit Euler) choice when asked for explicitly
        let params = HashMap::from([("ivp_newton_iterations".to_string(), Some(vec![0.0]))]);
        assert_eq!(SolverConfig::from_params(&params).unwrap().ivp_newton_iterations, 0);
    }

    #[test]
    fn test_validation() {
        assert!(SolverConfig::new().with_tolerance(0.0).validate().is_err());
        assert!(SolverConfig::new().with_max_iterations(0).validate().is_err());
        assert!(SolverConfig::new().with_loglevel("verbose").validate().is_err());
        let config = SolverConfig::new().with_loglevel("warn");
        assert_eq!(config.level_filter().unwrap(), Some(LevelFilter::Warn));
    }
}
