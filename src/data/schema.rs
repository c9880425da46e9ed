//! Schema Validation Module
//! Column requirements and value-domain rules for student performance files.

use polars::prelude::*;
use thiserror::Error;

use super::table::any_value_label;

#[derive(Error, Debug)]
pub enum SchemaViolation {
    #[error("Column '{0}' is missing")]
    MissingColumn(String),
    #[error("Unexpected column '{0}'")]
    UnexpectedColumn(String),
    #[error("{column} must be {expected} (row {row}: {found})")]
    OutOfDomain {
        column: String,
        expected: String,
        row: usize,
        found: String,
    },
    #[error("{0} must be unique")]
    DuplicateId(String),
    #[error("{0} must be numeric")]
    NotNumeric(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Allowed values for a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    OneOf(&'static [&'static str]),
    /// Whole numbers in an inclusive range.
    IntRange(i64, i64),
    /// Any number in an inclusive range.
    Range(f64, f64),
}

impl Rule {
    fn describe(&self) -> String {
        match self {
            Rule::OneOf(values) => format!("one of ({})", values.join(", ")),
            Rule::IntRange(lo, hi) => format!("an integer between {lo} and {hi}"),
            Rule::Range(lo, hi) => format!("between {lo} and {hi}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnRule {
    pub column: &'static str,
    pub rule: Rule,
}

const YES_NO: &[&str] = &["yes", "no"];
const JOBS: &[&str] = &["teacher", "health", "services", "at_home", "other"];

/// Columns of the student performance dataset, in file order.
pub const STUDENT_COLUMNS: [&str; 33] = [
    "StudentID", "FirstName", "FamilyName", "sex", "age", "address", "famsize", "Pstatus",
    "Medu", "Fedu", "Mjob", "Fjob", "reason", "guardian", "traveltime", "studytime",
    "failures", "schoolsup", "famsup", "paid", "activities", "nursery", "higher", "internet",
    "romantic", "famrel", "freetime", "goout", "Dalc", "Walc", "health", "absences",
    "FinalGrade",
];

fn student_rules() -> Vec<ColumnRule> {
    use Rule::*;
    let rule = |column, rule| ColumnRule { column, rule };
    vec![
        rule("sex", OneOf(&["M", "F"])),
        rule("age", IntRange(15, 22)),
        rule("address", OneOf(&["U", "R"])),
        rule("famsize", OneOf(&["LE3", "GT3"])),
        rule("Pstatus", OneOf(&["T", "A"])),
        rule("Medu", IntRange(0, 4)),
        rule("Fedu", IntRange(0, 4)),
        rule("Mjob", OneOf(JOBS)),
        rule("Fjob", OneOf(JOBS)),
        rule("reason", OneOf(&["home", "reputation", "course", "other"])),
        rule("guardian", OneOf(&["mother", "father", "other"])),
        rule("traveltime", IntRange(1, 4)),
        rule("studytime", IntRange(1, 4)),
        rule("failures", IntRange(0, 4)),
        rule("schoolsup", OneOf(YES_NO)),
        rule("famsup", OneOf(YES_NO)),
        rule("paid", OneOf(YES_NO)),
        rule("activities", OneOf(YES_NO)),
        rule("nursery", OneOf(YES_NO)),
        rule("higher", OneOf(YES_NO)),
        rule("internet", OneOf(YES_NO)),
        rule("romantic", OneOf(YES_NO)),
        rule("famrel", IntRange(1, 5)),
        rule("freetime", IntRange(1, 5)),
        rule("goout", IntRange(1, 5)),
        rule("Dalc", IntRange(1, 5)),
        rule("Walc", IntRange(1, 5)),
        rule("health", IntRange(1, 5)),
        rule("absences", Range(0.0, 93.0)),
        rule("FinalGrade", Range(0.0, 20.0)),
    ]
}

/// Which validation a data file must pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaKind {
    /// Exactly the student performance columns, with per-column value domains.
    #[default]
    Student,
    /// Only the identifier and a numeric grade column are required.
    Minimal,
}

/// Validator for one data file.
#[derive(Debug, Clone)]
pub struct Schema {
    pub kind: SchemaKind,
    pub id_column: String,
    pub grade_column: String,
    rules: Vec<ColumnRule>,
}

impl Schema {
    pub fn new(kind: SchemaKind, id_column: &str, grade_column: &str) -> Self {
        let rules = match kind {
            SchemaKind::Student => student_rules(),
            SchemaKind::Minimal => Vec::new(),
        };
        Self {
            kind,
            id_column: id_column.to_string(),
            grade_column: grade_column.to_string(),
            rules,
        }
    }

    /// Columns a file must contain.
    pub fn required_columns(&self) -> Vec<String> {
        match self.kind {
            SchemaKind::Student => STUDENT_COLUMNS
                .iter()
                .map(|c| match *c {
                    "StudentID" => self.id_column.clone(),
                    "FinalGrade" => self.grade_column.clone(),
                    other => other.to_string(),
                })
                .collect(),
            SchemaKind::Minimal => vec![self.id_column.clone(), self.grade_column.clone()],
        }
    }

    /// Check a single file's frame. Incomplete rows must already be dropped.
    pub fn validate(&self, df: &DataFrame) -> Result<(), SchemaViolation> {
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let required = self.required_columns();

        if self.kind == SchemaKind::Student {
            if let Some(extra) = present.iter().find(|c| !required.contains(c)) {
                return Err(SchemaViolation::UnexpectedColumn(extra.clone()));
            }
        }
        if let Some(missing) = required.iter().find(|c| !present.contains(c)) {
            return Err(SchemaViolation::MissingColumn(missing.clone()));
        }

        self.check_unique_ids(df)?;

        let grade = df.column(&self.grade_column)?;
        if !super::table::is_numeric_dtype(grade.dtype()) {
            return Err(SchemaViolation::NotNumeric(self.grade_column.clone()));
        }

        for rule in &self.rules {
            let column = match rule.column {
                "FinalGrade" => self.grade_column.as_str(),
                other => other,
            };
            check_rule(df, column, &rule.rule)?;
        }
        Ok(())
    }

    fn check_unique_ids(&self, df: &DataFrame) -> Result<(), SchemaViolation> {
        let ids = df.column(&self.id_column)?;
        if ids.as_materialized_series().n_unique()? != ids.len() {
            return Err(SchemaViolation::DuplicateId(self.id_column.clone()));
        }
        Ok(())
    }
}

fn check_rule(df: &DataFrame, column: &str, rule: &Rule) -> Result<(), SchemaViolation> {
    let col = df.column(column)?;
    let violation = |row: usize, found: String| SchemaViolation::OutOfDomain {
        column: column.to_string(),
        expected: rule.describe(),
        row,
        found,
    };

    match rule {
        Rule::OneOf(allowed) => {
            for i in 0..col.len() {
                let label = any_value_label(&col.get(i)?).unwrap_or_default();
                if !allowed.contains(&label.as_str()) {
                    return Err(violation(i, label));
                }
            }
        }
        Rule::IntRange(lo, hi) => {
            let values = col.cast(&DataType::Float64)?;
            for (i, v) in values.f64()?.into_iter().enumerate() {
                let ok = v.is_some_and(|v| {
                    v.fract() == 0.0 && v >= *lo as f64 && v <= *hi as f64
                });
                if !ok {
                    let found = any_value_label(&col.get(i)?).unwrap_or_default();
                    return Err(violation(i, found));
                }
            }
        }
        Rule::Range(lo, hi) => {
            let values = col.cast(&DataType::Float64)?;
            for (i, v) in values.f64()?.into_iter().enumerate() {
                if !v.is_some_and(|v| v >= *lo && v <= *hi) {
                    let found = any_value_label(&col.get(i)?).unwrap_or_default();
                    return Err(violation(i, found));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Schema {
        Schema::new(SchemaKind::Minimal, "StudentID", "FinalGrade")
    }

    #[test]
    fn test_minimal_requires_id_and_grade() {
        let df = df!("StudentID" => [1i64, 2], "Math" => [3.0, 4.0]).unwrap();
        let err = minimal().validate(&df).unwrap_err();
        assert!(matches!(err, SchemaViolation::MissingColumn(c) if c == "FinalGrade"));
    }

    #[test]
    fn test_minimal_accepts_extra_columns() {
        let df = df!(
            "StudentID" => [1i64, 2],
            "FinalGrade" => [80.0, 60.0],
            "Math" => [90.0, 50.0],
        )
        .unwrap();
        assert!(minimal().validate(&df).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let df = df!("StudentID" => [1i64, 1], "FinalGrade" => [8.0, 9.0]).unwrap();
        assert!(matches!(
            minimal().validate(&df),
            Err(SchemaViolation::DuplicateId(_))
        ));
    }

    #[test]
    fn test_grade_must_be_numeric() {
        let df = df!("StudentID" => [1i64], "FinalGrade" => ["A"]).unwrap();
        assert!(matches!(
            minimal().validate(&df),
            Err(SchemaViolation::NotNumeric(_))
        ));
    }

    #[test]
    fn test_student_schema_rejects_unknown_column() {
        let schema = Schema::new(SchemaKind::Student, "StudentID", "FinalGrade");
        let df = df!("StudentID" => [1i64], "FinalGrade" => [8.0], "shoe_size" => [42i64])
            .unwrap();
        assert!(matches!(
            schema.validate(&df),
            Err(SchemaViolation::UnexpectedColumn(c)) if c == "shoe_size"
        ));
    }

    #[test]
    fn test_rules() {
        let df = df!(
            "sex" => ["M", "X"],
            "age" => [16i64, 23],
            "absences" => [0.0, 4.5],
        )
        .unwrap();
        assert!(check_rule(&df, "absences", &Rule::Range(0.0, 93.0)).is_ok());

        let err = check_rule(&df, "sex", &Rule::OneOf(&["M", "F"])).unwrap_err();
        assert!(matches!(err, SchemaViolation::OutOfDomain { row: 1, .. }));

        let err = check_rule(&df, "age", &Rule::IntRange(15, 22)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "age must be an integer between 15 and 22 (row 1: 23)"
        );
    }
}
