//! Score module - improvability score computation
//!
//! `Scorer::score` turns a table plus a feature selection into a new table
//! with an `ImprovabilityScore` column appended.

mod minmax;
mod pca;

use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::data::{DataProcessor, StudentTable};

/// Name of the appended score column.
pub const SCORE_COLUMN: &str = "ImprovabilityScore";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Select at least one improvability feature")]
    EmptySelection,
    #[error("Column '{0}' does not exist")]
    UnknownColumn(String),
    #[error("'{0}' is the score itself and cannot be used as a feature")]
    ReservedColumn(String),
    #[error("None of the selected features is correlated with {0}")]
    NoInformativeFeatures(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// How feature values are combined into a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMethod {
    /// Mean of per-column min-max normalized values, in [0, 1].
    #[default]
    #[value(name = "minmax")]
    MinMax,
    /// First principal component of the grade-oriented, standardized features.
    Pca,
}

/// Computes the improvability score for a feature selection.
#[derive(Debug, Clone)]
pub struct Scorer {
    pub method: ScoreMethod,
    pub grade_column: String,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            method: ScoreMethod::MinMax,
            grade_column: "FinalGrade".to_string(),
        }
    }
}

impl Scorer {
    pub fn new(method: ScoreMethod, grade_column: &str) -> Self {
        Self {
            method,
            grade_column: grade_column.to_string(),
        }
    }

    /// Check a selection against the table, collapsing duplicate names.
    pub fn validate_selection(
        table: &StudentTable,
        features: &[String],
    ) -> Result<Vec<String>, ValidationError> {
        if features.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        let mut selection: Vec<String> = Vec::with_capacity(features.len());
        for name in features {
            if name == SCORE_COLUMN {
                return Err(ValidationError::ReservedColumn(name.clone()));
            }
            if !table.has_column(name) {
                return Err(ValidationError::UnknownColumn(name.clone()));
            }
            if !selection.contains(name) {
                selection.push(name.clone());
            }
        }
        Ok(selection)
    }

    /// Score every complete row and return a new table with the score column.
    ///
    /// Rows missing a value in any selected column (or, for PCA, the grade)
    /// are dropped. An existing score column is replaced.
    pub fn score(
        &self,
        table: &StudentTable,
        features: &[String],
    ) -> Result<StudentTable, ValidationError> {
        let selection = Self::validate_selection(table, features)?;

        let base = if table.has_column(SCORE_COLUMN) {
            table.derive(table.frame().drop(SCORE_COLUMN)?)
        } else {
            table.clone()
        };

        let (rows, values) = match self.method {
            ScoreMethod::MinMax => {
                let matrix = DataProcessor::feature_matrix(&base, &selection)?;
                let values = minmax::score(&matrix);
                (matrix.rows, values)
            }
            ScoreMethod::Pca => {
                if !base.has_column(&self.grade_column) {
                    return Err(ValidationError::UnknownColumn(self.grade_column.clone()));
                }
                let mut columns = selection.clone();
                if !columns.contains(&self.grade_column) {
                    columns.push(self.grade_column.clone());
                }
                let matrix = DataProcessor::feature_matrix(&base, &columns)?;
                let values = pca::score(&matrix, &selection, &self.grade_column)?;
                (matrix.rows, values)
            }
        };

        let dropped = base.height() - rows.len();
        if dropped > 0 {
            debug!("{} rows with missing feature values were not scored", dropped);
        }

        let kept = base.take_rows(&rows)?;
        let column = Column::new(SCORE_COLUMN.into(), values);
        Ok(kept.derive(kept.frame().hstack(&[column])?))
    }
}
