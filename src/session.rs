//! Session State
//! One user's loaded table, feature selection and scored table.

use polars::prelude::DataFrame;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::charts::ChartData;
use crate::data::filter::{apply_filters, group_labels};
use crate::data::{DataError, DataLoader, FilterState, StudentTable};
use crate::score::{ScoreMethod, Scorer, ValidationError, SCORE_COLUMN};
use crate::stats::{MetricStats, StatsCalculator};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// What the charts and summary show for the current selection and filters.
#[derive(Debug, Clone)]
pub struct DashboardView {
    /// Scored rows passing the filters.
    pub table: StudentTable,
    pub group_column: Option<String>,
    pub chart_data: ChartData,
    pub stats: Vec<MetricStats>,
}

/// State of one session. Failed operations leave the previous state intact.
pub struct Session {
    loader: DataLoader,
    scorer: Scorer,
    table: StudentTable,
    features: Vec<String>,
    scored: Option<StudentTable>,
}

impl Session {
    /// Start a session on the table loaded from `dir`.
    pub fn open(loader: DataLoader, scorer: Scorer, dir: &Path) -> Result<Self, SessionError> {
        let mut session = Self {
            loader,
            scorer,
            table: StudentTable::new(DataFrame::empty()),
            features: Vec::new(),
            scored: None,
        };
        session.reload(dir)?;
        Ok(session)
    }

    pub fn table(&self) -> &StudentTable {
        &self.table
    }

    pub fn scored(&self) -> Option<&StudentTable> {
        self.scored.as_ref()
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn method(&self) -> ScoreMethod {
        self.scorer.method
    }

    pub fn grade_column(&self) -> &str {
        &self.scorer.grade_column
    }

    /// Reload from `dir`, re-scoring with the current selection if there is one.
    pub fn reload(&mut self, dir: &Path) -> Result<(), SessionError> {
        let table = self.loader.load(dir)?;
        let scored = if self.features.is_empty() {
            None
        } else {
            Some(self.scorer.score(&table, &self.features)?)
        };
        self.table = table;
        self.scored = scored;
        Ok(())
    }

    /// Change the feature selection and re-score.
    pub fn select_features(&mut self, features: Vec<String>) -> Result<&StudentTable, ValidationError> {
        let scored = self.scorer.score(&self.table, &features)?;
        info!(
            "Scored {} of {} rows on {} feature(s)",
            scored.height(),
            self.table.height(),
            features.len()
        );
        self.features = features;
        Ok(self.scored.insert(scored))
    }

    /// Filter the scored table and compute chart data and per-group statistics.
    pub fn view(
        &self,
        filters: &FilterState,
        group_by: Option<&str>,
    ) -> Result<DashboardView, ValidationError> {
        let scored = self.scored.as_ref().ok_or(ValidationError::EmptySelection)?;
        let table = apply_filters(scored, filters)?;

        let group_column = match group_by {
            Some(col) if table.has_column(col) => Some(col.to_string()),
            Some(col) => {
                warn!("Group column '{}' not found; charts are not grouped", col);
                None
            }
            None => None,
        };
        let labels = group_labels(&table, group_column.as_deref())?;

        let grade_column = self.grade_column();
        let grades = nan_filled(table.f64_values(grade_column)?);
        let scores = nan_filled(table.f64_values(SCORE_COLUMN)?);

        let chart_data = ChartData::new(&grades, &scores, &labels, group_column.clone());
        let stats = StatsCalculator::compute_all_stats_parallel(
            &[
                (grade_column.to_string(), grades),
                (SCORE_COLUMN.to_string(), scores),
            ],
            &labels,
        );

        Ok(DashboardView {
            table,
            group_column,
            chart_data,
            stats,
        })
    }
}

fn nan_filled(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LoaderConfig, SchemaKind};
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    const CSV: &str = "StudentID,sex,FinalGrade,absences,studytime\n\
                       1,F,15,0,4\n\
                       2,M,9,10,1\n\
                       3,F,11,6,2\n\
                       4,M,13,2,3\n";

    fn session(dir: &Path) -> Session {
        let loader = DataLoader::new(LoaderConfig {
            default_dir: dir.to_path_buf(),
            schema: SchemaKind::Minimal,
            ..LoaderConfig::default()
        });
        Session::open(loader, Scorer::default(), dir).unwrap()
    }

    fn features(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_select_features_scores_table() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let mut session = session(dir.path());
        assert!(session.scored().is_none());

        let scored = session.select_features(features(&["absences"])).unwrap();
        assert_eq!(scored.height(), 4);
        assert_eq!(session.features(), &["absences".to_string()]);
        assert!(session.scored().unwrap().has_column(SCORE_COLUMN));
    }

    #[test]
    fn test_failed_selection_keeps_previous_state() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let mut session = session(dir.path());
        session.select_features(features(&["absences"])).unwrap();

        assert!(session.select_features(Vec::new()).is_err());
        assert_eq!(session.features(), &["absences".to_string()]);
        assert!(session.scored().is_some());
    }

    #[test]
    fn test_reload_rescores() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let mut session = session(dir.path());
        session.select_features(features(&["absences"])).unwrap();

        let other = tempdir().unwrap();
        fs::write(
            other.path().join("b.csv"),
            "StudentID,sex,FinalGrade,absences,studytime\n7,F,10,3,2\n8,M,12,5,2\n",
        )
        .unwrap();
        session.reload(other.path()).unwrap();
        assert_eq!(session.table().height(), 2);
        assert_eq!(session.scored().unwrap().height(), 2);
    }

    #[test]
    fn test_pca_session_scores_from_zero() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let loader = DataLoader::new(LoaderConfig {
            default_dir: dir.path().to_path_buf(),
            schema: SchemaKind::Minimal,
            ..LoaderConfig::default()
        });
        let scorer = Scorer::new(ScoreMethod::Pca, "FinalGrade");
        let mut session = Session::open(loader, scorer, dir.path()).unwrap();
        session.select_features(features(&["absences", "studytime"])).unwrap();
        assert_eq!(session.method(), ScoreMethod::Pca);

        let scores = session.scored().unwrap().f64_values(SCORE_COLUMN).unwrap();
        let min = scores.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        assert!(min.abs() < 1e-12);
    }

    #[test]
    fn test_failed_reload_keeps_previous_state() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let mut session = session(dir.path());
        session.select_features(features(&["absences"])).unwrap();

        let other = tempdir().unwrap();
        fs::write(
            other.path().join("b.csv"),
            "StudentID,sex,FinalGrade,studytime\n7,F,10,2\n",
        )
        .unwrap();
        assert!(matches!(
            session.reload(other.path()),
            Err(SessionError::Validation(ValidationError::UnknownColumn(c))) if c == "absences"
        ));
        assert_eq!(session.table().height(), 4);
        assert_eq!(session.scored().unwrap().height(), 4);
    }

    #[test]
    fn test_view_filters_and_groups() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let mut session = session(dir.path());
        session.select_features(features(&["absences"])).unwrap();

        let view = session.view(&FilterState::new(), Some("sex")).unwrap();
        assert_eq!(view.table.height(), 4);
        assert_eq!(view.group_column.as_deref(), Some("sex"));
        assert_eq!(view.stats.len(), 2);
        assert_eq!(view.stats[0].group_stats["F"].count, 2);

        let filters: FilterState = [("sex".to_string(), BTreeSet::from(["M".to_string()]))]
            .into_iter()
            .collect();
        let view = session.view(&filters, Some("missing")).unwrap();
        assert_eq!(view.table.height(), 2);
        assert!(view.group_column.is_none());
        assert_eq!(
            view.chart_data.points_by_group.keys().collect::<Vec<_>>(),
            vec!["all"]
        );
    }

    #[test]
    fn test_view_requires_selection() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), CSV).unwrap();
        let session = session(dir.path());
        assert!(matches!(
            session.view(&FilterState::new(), None),
            Err(ValidationError::EmptySelection)
        ));
    }
}
