//! querywright CLI - compile, validate and run semantic query plans
//!
//! Usage:
//!   querywright compile --catalog <catalog.json> --plan <plan.json> [--dialect <dialect>]
//!   querywright validate --sql "<statement>" [--catalog <catalog.json>]
//!   querywright search --catalog <catalog.json> <text>
//!   querywright run --catalog <catalog.json> --plan <plan.json> --database <db.sqlite>
//!
//! Examples:
//!   querywright compile --catalog demos/catalog.json --plan demos/plan.json --dialect duckdb
//!   querywright validate --catalog demos/catalog.json --sql "DELETE FROM companies"
//!   querywright search --catalog demos/catalog.json "company revenue"

use clap::{Parser, Subcommand, ValueEnum};
use querywright::catalog::SemanticCatalog;
use querywright::compile::{compile_plan, validate_sql, CompileOptions};
use querywright::config::Settings;
use querywright::execution::SqliteBackend;
use querywright::planner::PlanProposal;
use querywright::run::Run;
use querywright::security::SecurityPolicy;
use querywright::sql::Dialect;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "querywright")]
#[command(about = "querywright - compile semantic query plans to validated SQL")]
#[command(version)]
struct Cli {
    /// Path to a querywright.toml (overrides the default search)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a plan to SQL without executing it
    Compile {
        /// Path to the catalog definition (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Path to the plan proposal (JSON)
        #[arg(long)]
        plan: PathBuf,

        /// SQL dialect to generate (defaults to the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Check a SQL statement against the security policy
    Validate {
        /// The statement text
        #[arg(long)]
        sql: String,

        /// Catalog whose tables form the allowlist when none is configured
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Dialect used to parse the statement
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Search catalog entities
    Search {
        /// Path to the catalog definition (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Search text
        text: String,
    },

    /// Compile a plan and execute it against a SQLite database
    Run {
        /// Path to the catalog definition (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Path to the plan proposal (JSON)
        #[arg(long)]
        plan: PathBuf,

        /// Path to the SQLite database
        #[arg(long)]
        database: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Sqlite,
    Duckdb,
    Postgres,
    Snowflake,
    Bigquery,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Snowflake => Dialect::Snowflake,
            DialectArg::Bigquery => Dialect::BigQuery,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL with plan and estimate comments
    Verbose,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "querywright=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            catalog,
            plan,
            dialect,
            output,
        } => cmd_compile(&settings, &catalog, &plan, dialect, output),
        Commands::Validate {
            sql,
            catalog,
            dialect,
        } => cmd_validate(&settings, &sql, catalog.as_deref(), dialect),
        Commands::Search { catalog, text } => cmd_search(&catalog, &text),
        Commands::Run {
            catalog,
            plan,
            database,
        } => cmd_run(&settings, &catalog, &plan, &database).await,
    }
}

fn load_catalog(path: &Path) -> Option<SemanticCatalog> {
    match SemanticCatalog::from_file(path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("Catalog error: {}", e);
            None
        }
    }
}

fn load_proposal(path: &Path) -> Option<PlanProposal> {
    let json = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            return None;
        }
    };
    match PlanProposal::from_json(&json) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("Plan error: {}", e);
            None
        }
    }
}

/// The configured policy, or one allowing every catalog table when no
/// allowlist is configured.
fn effective_policy(settings: &Settings, catalog: Option<&SemanticCatalog>) -> SecurityPolicy {
    match catalog {
        Some(c) if settings.security.allowed_tables.is_empty() => SecurityPolicy {
            allowed_tables: SecurityPolicy::for_catalog(c).allowed_tables,
            ..settings.security.clone()
        },
        _ => settings.security.clone(),
    }
}

fn cmd_compile(
    settings: &Settings,
    catalog: &Path,
    plan: &Path,
    dialect: Option<DialectArg>,
    output: OutputFormat,
) -> ExitCode {
    let Some(catalog) = load_catalog(catalog) else {
        return ExitCode::FAILURE;
    };
    let Some(proposal) = load_proposal(plan) else {
        return ExitCode::FAILURE;
    };

    let policy = effective_policy(settings, Some(&catalog));
    let options = CompileOptions::default()
        .with_dialect(dialect.map_or(settings.compiler.dialect, Dialect::from))
        .with_tie_break(settings.compiler.tie_break);

    match compile_plan(&catalog, &policy, &proposal, options) {
        Ok(compiled) => {
            match output {
                OutputFormat::Sql => {
                    println!("{}", compiled.sql);
                }
                OutputFormat::Verbose => {
                    println!("-- querywright compiled SQL");
                    println!("-- Dialect: {}", compiled.dialect);
                    println!("-- Join path: {}", compiled.path.entities().join(" -> "));
                    if compiled.statement.was_clamped() {
                        println!("-- Row limit clamped to {}", policy.max_rows);
                    }
                    println!(
                        "-- Estimate: ~{} rows, ~{} bytes scanned",
                        compiled.estimate.approximate_rows, compiled.estimate.approximate_scan_bytes
                    );
                    println!();
                    println!("{}", compiled.sql);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error ({}): {}", e.class(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate(
    settings: &Settings,
    sql: &str,
    catalog: Option<&Path>,
    dialect: Option<DialectArg>,
) -> ExitCode {
    let catalog = match catalog {
        Some(path) => match load_catalog(path) {
            Some(c) => Some(c),
            None => return ExitCode::FAILURE,
        },
        None => None,
    };
    let policy = effective_policy(settings, catalog.as_ref());
    let dialect = dialect.map_or(settings.compiler.dialect, Dialect::from);

    match validate_sql(sql, &policy, dialect) {
        Ok(validated) => {
            println!("OK: {}", validated.statement().to_sql(dialect));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Rejected ({}): {}", e.class(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_search(catalog: &Path, text: &str) -> ExitCode {
    let Some(catalog) = load_catalog(catalog) else {
        return ExitCode::FAILURE;
    };

    let results = catalog.search_entities(text);
    if results.is_empty() {
        println!("No matching entities.");
        return ExitCode::SUCCESS;
    }
    for summary in results {
        match &summary.description {
            Some(desc) => println!("{:>4}  {}  {}", summary.score, summary.id, desc),
            None => println!("{:>4}  {}", summary.score, summary.id),
        }
    }
    ExitCode::SUCCESS
}

async fn cmd_run(settings: &Settings, catalog: &Path, plan: &Path, database: &Path) -> ExitCode {
    let Some(catalog) = load_catalog(catalog) else {
        return ExitCode::FAILURE;
    };
    let Some(proposal) = load_proposal(plan) else {
        return ExitCode::FAILURE;
    };
    let backend = match SqliteBackend::open(database) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Database error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = Settings {
        security: effective_policy(settings, Some(&catalog)),
        ..settings.clone()
    };
    let report = Run::new(&catalog, &settings, &backend).execute(&proposal).await;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing report: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
