//! Improvability - Student Improvability Scoring over CSV Grade Data
//!
//! Loads a directory of student CSV files, scores each student on a chosen
//! set of features and writes the grade/score charts and group statistics.

mod charts;
mod data;
mod report;
mod score;
mod session;
mod stats;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use charts::{StaticChartRenderer, SCATTER_FILE};
use data::filter::parse_selection;
use data::{DataLoader, FilterState, LoaderConfig, SchemaKind};
use report::ScoreReport;
use score::{ScoreMethod, Scorer};
use session::Session;

#[derive(Parser)]
#[command(name = "improvability")]
#[command(about = "Score students on selected features and chart the result against FinalGrade")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Args)]
struct DataArgs {
    /// Directory of CSV files; the bundled data is used when empty or missing
    #[arg(short, long, env = "IMPROVABILITY_DATA_DIR", default_value = "")]
    data_dir: PathBuf,

    /// Validation applied to each file
    #[arg(long, value_enum, default_value_t = SchemaKind::Student)]
    schema: SchemaKind,

    #[arg(long, default_value = "StudentID")]
    id_column: String,

    #[arg(long, default_value = "FinalGrade")]
    grade_column: String,
}

impl DataArgs {
    fn loader(&self) -> DataLoader {
        DataLoader::new(LoaderConfig {
            id_column: self.id_column.clone(),
            grade_column: self.grade_column.clone(),
            schema: self.schema,
            ..LoaderConfig::default()
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the columns of the loaded table
    Columns {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Score students on the selected features
    Score {
        #[command(flatten)]
        data: DataArgs,

        /// Feature columns, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = ScoreMethod::MinMax)]
        method: ScoreMethod,

        /// Column whose values split charts and statistics ("none" to disable)
        #[arg(short, long, default_value = "sex")]
        group_by: String,

        /// Keep rows whose COL value is one of the listed values (repeatable)
        #[arg(short = 'w', long = "where", value_name = "COL=V1,V2")]
        filters: Vec<String>,

        /// Write the scored rows to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write PNG charts into this directory
        #[arg(short, long)]
        charts: Option<PathBuf>,

        /// Open the scatter chart once written
        #[arg(long = "open", requires = "charts")]
        open_chart: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_filters(args: &[String]) -> Result<FilterState> {
    let mut filters = FilterState::new();
    for arg in args {
        let Some((column, values)) = parse_selection(arg) else {
            bail!("Invalid filter '{arg}', expected COL=V1,V2");
        };
        filters.entry(column).or_default().extend(values);
    }
    Ok(filters)
}

fn run_columns(data: DataArgs) -> Result<()> {
    let table = data
        .loader()
        .load(&data.data_dir)
        .context("Failed to load data")?;
    let numeric = table.numeric_columns();
    for (name, dtype) in table.describe_columns() {
        let kind = if numeric.contains(&name) { "numeric" } else { "categorical" };
        println!("{name:<16} {dtype:<10} {kind}");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_score(
    data: DataArgs,
    features: Vec<String>,
    method: ScoreMethod,
    group_by: String,
    filters: Vec<String>,
    output: Option<PathBuf>,
    charts: Option<PathBuf>,
    open_chart: bool,
    json: bool,
) -> Result<()> {
    let filters = parse_filters(&filters)?;
    let scorer = Scorer::new(method, &data.grade_column);
    let mut session =
        Session::open(data.loader(), scorer, &data.data_dir).context("Failed to load data")?;
    session
        .select_features(features)
        .context("Invalid feature selection")?;

    let group_by = match group_by.as_str() {
        "" | "none" => None,
        col => Some(col),
    };
    let view = session
        .view(&filters, group_by)
        .context("Failed to apply filters")?;

    if let Some(path) = &output {
        view.table
            .write_csv(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} scored rows to {:?}", view.table.height(), path);
    }

    let mut written = Vec::new();
    if let Some(dir) = &charts {
        written = StaticChartRenderer::render_all(&view.chart_data, session.grade_column(), dir)
            .context("Failed to render charts")?;
        if open_chart {
            let scatter = dir.join(SCATTER_FILE);
            open::that(&scatter)
                .with_context(|| format!("Failed to open {}", scatter.display()))?;
        }
    }

    let report = ScoreReport::new(&session, &view, &filters).with_charts(written);
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Columns { data } => run_columns(data),
        Commands::Score {
            data,
            features,
            method,
            group_by,
            filters,
            output,
            charts,
            open_chart,
            json,
        } => run_score(
            data, features, method, group_by, filters, output, charts, open_chart, json,
        ),
    }
}
