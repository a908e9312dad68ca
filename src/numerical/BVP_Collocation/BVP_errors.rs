use std::fmt;
use thiserror::Error;

/// Shape mismatch of a matrix/vector argument: name of the variable, expected and received (rows, cols)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionError {
    pub variable_name: String,
    pub expected: (usize, usize),
    pub received: (usize, usize),
}

impl DimensionError {
    pub fn new(variable_name: &str, expected: (usize, usize), received: (usize, usize)) -> Self {
        DimensionError {
            variable_name: variable_name.to_string(),
            expected,
            received,
        }
    }
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Variable {}, received dimensions ({}, {}), expected dimensions ({}, {})",
            self.variable_name, self.received.0, self.received.1, self.expected.0, self.expected.1
        )
    }
}

impl std::error::Error for DimensionError {}

/// Error types of the collocation BVP solver
#[derive(Debug, Error)]
pub enum BvpError {
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error("BVP solver did not terminate after {iterations} iterations (cost = {cost:e})")]
    Converge { iterations: usize, cost: f64 },

    #[error("zero pivot in block elimination: block {block}, column {column}")]
    SingularPivot { block: usize, column: usize },

    #[error("singular matrix in {context}")]
    SingularMatrix { context: String },

    #[error("time mesh must be strictly monotonic, violated at index {index}")]
    InvalidMesh { index: usize },

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BvpError {
    pub fn dimension(variable_name: &str, expected: (usize, usize), received: (usize, usize)) -> Self {
        BvpError::Dimension(DimensionError::new(variable_name, expected, received))
    }
}

/// Returns a DimensionError unless `received == expected`
pub fn check_shape(
    variable_name: &str,
    expected: (usize, usize),
    received: (usize, usize),
) -> Result<(), BvpError> {
    if expected != received {
        return Err(BvpError::dimension(variable_name, expected, received));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_error_message() {
        let err = DimensionError::new("B0", (3, 3), (2, 3));
        assert_eq!(
            err.to_string(),
            "Variable B0, received dimensions (2, 3), expected dimensions (3, 3)"
        );
        let bvp_err: BvpError = err.clone().into();
        assert_eq!(bvp_err.to_string(), err.to_string());
    }

    #[test]
    fn test_check_shape() {
        assert!(check_shape("x", (3, 1), (3, 1)).is_ok());
        match check_shape("x", (3, 1), (4, 1)) {
            Err(BvpError::Dimension(e)) => {
                assert_eq!(e.variable_name, "x");
                assert_eq!(e.expected, (3, 1));
                assert_eq!(e.received, (4, 1));
            }
            other => panic!("expected DimensionError, got {:?}", other),
        }
    }
}
