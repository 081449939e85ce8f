//! Starload CLI - Transform CSV extracts into star schemas
//!
//! # Main Commands
//!
//! ```bash
//! starload transform fast_chargers.csv          # Write dim_*.csv, fact_*.csv, manifest.json
//! starload transform in.csv -m model.json -o out
//! starload verify data_file_output              # Re-check written tables
//! ```
//!
//! # Model Commands
//!
//! ```bash
//! starload inspect input.csv                    # Encoding, delimiter, headers
//! starload example-model                        # Print the built-in model
//! starload check-model model.json --input in.csv
//! ```

use clap::{Parser, Subcommand};
use starload::config::{self, CliOverrides, EnvConfig};
use starload::logging::{init_tracing, TracingConfig};
use starload::parser::format_delimiter;
use starload::{ev_charger_model, read_file, run, verify_output_dir, StarModel};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "starload")]
#[command(about = "Transform CSV extracts into star-schema tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: CSV → dimensions + fact table → CSV files
    Transform {
        /// Input CSV file
        input: PathBuf,

        /// Output directory (default: data_file_output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Star model JSON file (default: built-in EV charger model)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = config::parse_delimiter)]
        delimiter: Option<char>,

        /// Reject input columns not declared in the model
        #[arg(long)]
        strict: bool,

        /// Do not write manifest.json
        #[arg(long)]
        no_manifest: bool,
    },

    /// Show how a CSV file is read
    Inspect {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = config::parse_delimiter)]
        delimiter: Option<char>,
    },

    /// Print the built-in EV charger model
    ExampleModel,

    /// Validate a star model file
    CheckModel {
        /// Model JSON file
        model: PathBuf,

        /// Also check the model's input columns against this CSV header
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Re-read a written output directory and check its integrity
    Verify {
        /// Output directory
        dir: PathBuf,

        /// Star model JSON file (default: built-in EV charger model)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    init_tracing(&TracingConfig::from_env());

    let cli = Cli::parse();
    let env = EnvConfig::from_env();

    let result = match cli.command {
        Commands::Transform {
            input,
            output,
            model,
            delimiter,
            strict,
            no_manifest,
        } => {
            let overrides = CliOverrides {
                output_dir: output,
                model,
                delimiter,
                strict,
                no_manifest,
            };
            cmd_transform(&input, &overrides, &env)
        }

        Commands::Inspect { input, delimiter } => cmd_inspect(&input, delimiter.or(env.delimiter)),

        Commands::ExampleModel => cmd_example_model(),

        Commands::CheckModel { model, input } => cmd_check_model(&model, input.as_deref()),

        Commands::Verify { dir, model } => cmd_verify(&dir, model.or(env.model)),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_transform(
    input: &Path,
    overrides: &CliOverrides,
    env: &EnvConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let model_path = config::resolve_model_path(overrides, env);
    let model = config::load_model(model_path.as_deref())?;
    let options = config::resolve_options(overrides, env);
    eprintln!(
        "   Model: {}{}",
        model.name,
        if model_path.is_none() { " (built-in)" } else { "" }
    );

    let report = run(input, &model, &options)?;

    eprintln!("   Encoding: {}", report.input.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(report.input.delimiter));
    eprintln!("   Rows: {}", report.input.row_count);
    if !report.input.ignored_columns.is_empty() {
        eprintln!("   ⚠️  Ignored columns: {}", report.input.ignored_columns.join(", "));
    }

    eprintln!("\n📦 Tables:");
    for table in &report.tables {
        eprintln!("   {} ({} rows)", table.file, table.rows);
    }
    if let Some(ref manifest) = report.manifest {
        eprintln!("   💾 Manifest: {}", manifest.display());
    }

    eprintln!("\n✨ Done! Output in {}", options.output_dir.display());
    Ok(())
}

fn cmd_inspect(input: &Path, delimiter: Option<char>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let table = read_file(input, delimiter)?;

    eprintln!("   Encoding: {}", table.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(table.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ {} data rows", table.rows.len());
    Ok(())
}

fn cmd_example_model() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", ev_charger_model().to_json()?);
    Ok(())
}

fn cmd_check_model(path: &Path, input: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Checking model: {}", path.display());

    let model = StarModel::from_file(path)?;
    eprintln!("   Name: {}", model.name);
    eprintln!("   Tables: {}", model.table_names().join(", "));

    if let Some(input) = input {
        let table = read_file(input, None)?;
        let binding = model.input.bind(&table.headers, false)?;
        eprintln!("   Header of {} matches", input.display());
        if !binding.ignored.is_empty() {
            eprintln!("   ⚠️  Undeclared columns: {}", binding.ignored.join(", "));
        }
    }

    eprintln!("✅ Model is valid");
    Ok(())
}

fn cmd_verify(dir: &Path, model_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔍 Verifying: {}", dir.display());

    let model = config::load_model(model_path.as_deref())?;
    let report = verify_output_dir(dir, &model)?;

    for (table, rows) in &report.dimensions {
        eprintln!("   {}: {} rows", table, rows);
    }
    eprintln!("   {}: {} rows", model.fact.table, report.fact_rows);
    eprintln!("   Empty foreign keys: {}", report.null_foreign_keys);

    eprintln!("✅ Keys unique, all foreign keys resolve");
    Ok(())
}
