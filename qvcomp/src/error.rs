use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::alphabet::Symbol;

/// Error occurring while generating or using a codebook.
#[derive(Debug)]
pub enum CodebookError {
    /// The supplied configuration is not usable.
    ConfigurationInvalid(String),
    /// The training corpus has no lines or no columns.
    TrainingCorpusEmpty,
    /// A probability distribution that was expected to carry mass has none.
    EmptyDistribution,
    /// A context symbol was requested that is absent from the input alphabet
    /// of the given column.
    AlphabetLookupMiss {
        /// Column the lookup was made in.
        column: usize,
        /// The missing context symbol.
        symbol: Symbol,
    },
    /// An internal consistency check failed. This indicates a bug in the
    /// driving code, not a problem with the input data.
    InternalInvariantViolated {
        /// Column the violation was detected in.
        column: usize,
        /// Human-readable description of the violation.
        detail: String,
    },
}

impl CodebookError {
    pub(crate) fn invariant<T: Into<String>>(column: usize, detail: T) -> Self {
        Self::InternalInvariantViolated {
            column,
            detail: detail.into(),
        }
    }
}

impl Display for CodebookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CodebookError::ConfigurationInvalid(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            CodebookError::TrainingCorpusEmpty => {
                write!(f, "Training corpus has no lines or no columns")
            }
            CodebookError::EmptyDistribution => {
                write!(f, "Probability distribution has no mass")
            }
            CodebookError::AlphabetLookupMiss { column, symbol } => {
                write!(
                    f,
                    "Symbol {} is not in the input alphabet of column {}",
                    symbol, column
                )
            }
            CodebookError::InternalInvariantViolated { column, detail } => {
                write!(f, "Internal invariant violated at column {}: {}", column, detail)
            }
        }
    }
}

impl Error for CodebookError {}

/// The result of a codebook operation.
pub type CodebookResult<T> = Result<T, CodebookError>;
