use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::PolarsResult;

use super::table::StudentTable;
use crate::score::ValidationError;

/// Label given to every row when no grouping column is active.
pub const ALL_GROUP: &str = "all";

// ---------------------------------------------------------------------------
// Filter predicate: which values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values.
/// A column absent from the map is not filtered.
pub type FilterState = BTreeMap<String, BTreeSet<String>>;

/// Parse a `column=value1,value2` selection.
pub fn parse_selection(arg: &str) -> Option<(String, BTreeSet<String>)> {
    let (column, values) = arg.split_once('=')?;
    let column = column.trim();
    if column.is_empty() {
        return None;
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Some((column.to_string(), values))
}

/// Return indices of rows that pass all active filters.
///
/// A row passes a column filter when its value for that column is in the
/// selected set. An empty set selects nothing, so every row fails.
pub fn filtered_indices(
    table: &StudentTable,
    filters: &FilterState,
) -> Result<Vec<usize>, ValidationError> {
    if let Some(col) = filters.keys().find(|col| !table.has_column(col)) {
        return Err(ValidationError::UnknownColumn(col.clone()));
    }
    if filters.values().any(BTreeSet::is_empty) {
        return Ok(Vec::new());
    }

    let mut keep = vec![true; table.height()];
    for (col, selected) in filters {
        let values = table.string_values(col)?;
        for (slot, value) in keep.iter_mut().zip(values) {
            let passes = value.is_some_and(|v| selected.contains(&v));
            if !passes {
                *slot = false;
            }
        }
    }
    Ok(keep
        .into_iter()
        .enumerate()
        .filter(|(_, k)| *k)
        .map(|(i, _)| i)
        .collect())
}

/// Apply `filters` and return the narrowed table.
pub fn apply_filters(
    table: &StudentTable,
    filters: &FilterState,
) -> Result<StudentTable, ValidationError> {
    if filters.is_empty() {
        return Ok(table.clone());
    }
    let indices = filtered_indices(table, filters)?;
    Ok(table.take_rows(&indices)?)
}

/// Per-row group label for colouring charts and splitting statistics.
/// Without a grouping column every row belongs to [`ALL_GROUP`].
pub fn group_labels(table: &StudentTable, column: Option<&str>) -> PolarsResult<Vec<String>> {
    match column {
        Some(col) if table.has_column(col) => Ok(table
            .string_values(col)?
            .into_iter()
            .map(|v| v.unwrap_or_else(|| "<null>".to_string()))
            .collect()),
        _ => Ok(vec![ALL_GROUP.to_string(); table.height()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample() -> StudentTable {
        StudentTable::new(
            df!(
                "StudentID" => [1i64, 2, 3, 4],
                "sex" => ["F", "M", "F", "M"],
                "address" => ["U", "U", "R", "R"],
            )
            .unwrap(),
        )
    }

    fn select(col: &str, values: &[&str]) -> (String, BTreeSet<String>) {
        (
            col.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        )
    }

    #[test]
    fn test_all_selected_keeps_everything() {
        let table = sample();
        let filters: FilterState = [select("sex", &["F", "M"])].into_iter().collect();
        assert_eq!(filtered_indices(&table, &filters).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_filters_combine() {
        let table = sample();
        let filters: FilterState = [select("sex", &["F"]), select("address", &["R"])]
            .into_iter()
            .collect();
        assert_eq!(filtered_indices(&table, &filters).unwrap(), vec![2]);

        let narrowed = apply_filters(&table, &filters).unwrap();
        assert_eq!(narrowed.height(), 1);
        assert_eq!(narrowed.unique_values("StudentID"), vec!["3"]);
    }

    #[test]
    fn test_empty_selection_hides_all() {
        let table = sample();
        let filters: FilterState = [select("sex", &[])].into_iter().collect();
        assert!(filtered_indices(&table, &filters).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_filter_column() {
        let table = sample();
        let filters: FilterState = [select("school", &["GP"])].into_iter().collect();
        assert!(matches!(
            filtered_indices(&table, &filters),
            Err(ValidationError::UnknownColumn(c)) if c == "school"
        ));
    }

    #[test]
    fn test_unknown_column_after_empty_selection() {
        let table = sample();
        let filters: FilterState = [select("sex", &[]), select("zzz", &["1"])]
            .into_iter()
            .collect();
        assert!(matches!(
            filtered_indices(&table, &filters),
            Err(ValidationError::UnknownColumn(c)) if c == "zzz"
        ));
    }

    #[test]
    fn test_numeric_column_filter() {
        let table = sample();
        let filters: FilterState = [select("StudentID", &["1", "4"])].into_iter().collect();
        assert_eq!(filtered_indices(&table, &filters).unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_parse_selection() {
        let (col, values) = parse_selection("sex = F, M").unwrap();
        assert_eq!(col, "sex");
        assert_eq!(values.into_iter().collect::<Vec<_>>(), vec!["F", "M"]);
        assert!(parse_selection("sex").is_none());
        assert!(parse_selection("=F").is_none());
    }

    #[test]
    fn test_group_labels() {
        let table = sample();
        assert_eq!(group_labels(&table, Some("sex")).unwrap(), vec!["F", "M", "F", "M"]);
        assert_eq!(group_labels(&table, Some("nope")).unwrap(), vec!["all"; 4]);
        assert_eq!(group_labels(&table, None).unwrap(), vec!["all"; 4]);
    }
}
