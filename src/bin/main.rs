//! formql CLI - check form queries and evaluate formulas offline
//!
//! Usage:
//!   formql check <query> [--schema forms.json] [--read-write] [--var name=value]...
//!   formql vars <query> [--var name=value]...
//!   formql calc <expression> [--data data.json] [--submissions rows.json]
//!   formql validate-expr <expression> [--field id]...
//!   formql functions [--category math]
//!
//! Examples:
//!   formql check 'SELECT Status FROM intake' --schema forms.json
//!   formql calc 'ROUND(MULTIPLY(#price, #qty), 2)' --data order.json
//!   formql validate-expr 'DIVIDE(SUM(#score), 2)' --field score

use ariadne::{Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use formql::calc::{self, CalculationContext, Submission};
use formql::config::Settings;
use formql::query::{self, ParseOptions, QueryMode, VariableContext, VariableValue};
use formql::schema::{InMemorySchemaProvider, SchemaCacheManager};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "formql")]
#[command(about = "formql - Query and calculation engine for form submissions")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to FORMQL_CONFIG, ./formql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a query against form definitions and print its canonical form
    Check {
        /// Query text
        query: String,

        /// JSON file holding an array of form definitions
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Allow INSERT statements
        #[arg(long)]
        read_write: bool,

        /// Template variable binding (name=value), repeatable
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// List template variables and show the substituted text
    Vars {
        /// Query text
        query: String,

        /// Template variable binding (name=value), repeatable
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// Evaluate a calculation expression
    Calc {
        /// Expression text
        expression: String,

        /// JSON object of field id -> value for the current submission
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// JSON array of submissions used by aggregate functions
        #[arg(long)]
        submissions: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Check an expression for syntax, unknown functions and unknown fields
    ValidateExpr {
        /// Expression text
        expression: String,

        /// Field ids the expression may reference, repeatable
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// List the calculation function catalog
    Functions {
        /// Only show one category
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Display string
    Text,
    /// JSON value
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    match cli.command {
        Commands::Check {
            query,
            schema,
            read_write,
            vars,
        } => cmd_check(&settings, &query, schema, read_write, &vars),
        Commands::Vars { query, vars } => cmd_vars(&query, &vars),
        Commands::Calc {
            expression,
            data,
            submissions,
            output,
        } => cmd_calc(&expression, data, submissions, output),
        Commands::ValidateExpr { expression, fields } => cmd_validate_expr(&expression, &fields),
        Commands::Functions { category } => cmd_functions(category.as_deref()),
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, formql::config::SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

/// `FORMQL_LOG` wins over `RUST_LOG`, which wins over the settings file.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_env("FORMQL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_check(
    settings: &Settings,
    text: &str,
    schema: Option<PathBuf>,
    read_write: bool,
    vars: &[String],
) -> ExitCode {
    let schema_path = match schema {
        Some(path) => path,
        None => match settings.schema.resolved_forms_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("No schema file given; pass --schema or set schema.forms_path");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("Error resolving schema.forms_path: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let Some(json) = read_file(&schema_path) else {
        return ExitCode::FAILURE;
    };
    let provider = match InMemorySchemaProvider::from_json(&json) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading forms from '{}': {}", schema_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let context = match variable_context(vars) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut options: ParseOptions = settings.query.parse_options();
    if read_write {
        options.mode = QueryMode::ReadWrite;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let manager = SchemaCacheManager::new(Arc::new(provider));
    let cache = match runtime.block_on(manager.get_cache()) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error loading schema: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Diagnostics carry spans into the substituted text, so report against it.
    let substitution = query::replace_query_variables(text, &context);
    let parsed = query::parse_with(&substitution.text, &cache, &options);
    for name in &substitution.unresolved {
        eprintln!("warning: variable '{}' has no value; using NULL", name.value);
    }

    for warning in &parsed.warnings {
        report(ReportKind::Warning, &substitution.text, warning);
    }
    match &parsed.sql {
        Some(sql) if parsed.errors.is_empty() => {
            println!("{}", sql);
            ExitCode::SUCCESS
        }
        _ => {
            for error in &parsed.errors {
                report(ReportKind::Error, &substitution.text, error);
            }
            ExitCode::FAILURE
        }
    }
}

fn report(kind: ReportKind<'_>, source: &str, diag: &query::Diagnostic) {
    let span = diag.span.start.min(source.len())..diag.span.end.min(source.len());
    let printed = Report::build(kind, span.clone())
        .with_code(diag.kind.as_str())
        .with_message(&diag.message)
        .with_label(Label::new(span).with_message(&diag.message))
        .finish()
        .eprint(Source::from(source));
    if printed.is_err() {
        eprintln!("{}", diag);
    }
}

fn cmd_vars(text: &str, vars: &[String]) -> ExitCode {
    let context = match variable_context(vars) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let names = query::extract_query_variables(text);
    if names.is_empty() {
        println!("No variables");
    } else {
        println!("Variables:");
        for name in &names {
            match context.get(name) {
                Some(value) => println!("  {} = {}", name, value.to_sql_literal()),
                None => println!("  {} (unbound)", name),
            }
        }
    }

    let substitution = query::replace_query_variables(text, &context);
    println!();
    println!("{}", substitution.text);
    ExitCode::SUCCESS
}

fn cmd_calc(
    expression: &str,
    data: Option<PathBuf>,
    submissions: Option<PathBuf>,
    output: OutputFormat,
) -> ExitCode {
    let mut ctx = CalculationContext::new();

    if let Some(path) = data {
        let Some(json) = read_file(&path) else {
            return ExitCode::FAILURE;
        };
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&json) {
            Ok(form_data) => ctx = ctx.with_form_data(form_data),
            Err(e) => {
                eprintln!("Error parsing '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(path) = submissions {
        let Some(json) = read_file(&path) else {
            return ExitCode::FAILURE;
        };
        match serde_json::from_str::<Vec<Submission>>(&json) {
            Ok(rows) => ctx = ctx.with_submissions(rows),
            Err(e) => {
                eprintln!("Error parsing '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    match calc::evaluate_formula(expression, &ctx) {
        Ok(value) => {
            match output {
                OutputFormat::Text => println!("{}", value.to_display_string()),
                OutputFormat::Json => println!("{}", value.to_json()),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Calculation error [{}]: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate_expr(expression: &str, fields: &[String]) -> ExitCode {
    let validation = calc::validate_expression(expression, fields);
    if validation.is_valid {
        println!("✓ Expression is valid");
        return ExitCode::SUCCESS;
    }

    eprintln!("Expression has {} problem(s):", validation.errors.len());
    for error in &validation.errors {
        eprintln!("  {}", error);
    }
    ExitCode::FAILURE
}

fn cmd_functions(category: Option<&str>) -> ExitCode {
    let mut shown = 0;
    for spec in calc::catalog() {
        if category.is_some_and(|c| !c.eq_ignore_ascii_case(spec.category.as_str())) {
            continue;
        }
        let arity = match spec.max_args {
            Some(max) if max == spec.min_args => format!("{}", max),
            Some(max) => format!("{}..{}", spec.min_args, max),
            None => format!("{}+", spec.min_args),
        };
        println!("{:<12} {:<10} args: {}", spec.name, spec.category.as_str(), arity);
        shown += 1;
    }

    if shown == 0 {
        eprintln!("No functions in category '{}'", category.unwrap_or_default());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn read_file(path: &PathBuf) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            None
        }
    }
}

/// Build a variable context from `name=value` arguments.
///
/// Values that parse as numbers or booleans bind as such; `null` binds NULL.
fn variable_context(vars: &[String]) -> Result<VariableContext, String> {
    let mut ctx = VariableContext::new();
    for var in vars {
        let Some((name, raw)) = var.split_once('=') else {
            return Err(format!("Invalid --var '{}': expected NAME=VALUE", var));
        };
        let value = if raw.eq_ignore_ascii_case("null") {
            VariableValue::Null
        } else if let Ok(b) = raw.parse::<bool>() {
            VariableValue::Bool(b)
        } else if let Some(n) = raw.parse::<f64>().ok().filter(|n| n.is_finite()) {
            VariableValue::Number(n)
        } else {
            VariableValue::Text(raw.to_string())
        };
        ctx.set(name.trim(), value);
    }
    Ok(ctx)
}
