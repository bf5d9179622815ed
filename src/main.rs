use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

mod aggregate;
mod engine;
mod error;
mod minimums;
mod models;
mod normalize;
mod reconcile;
mod report;

use aggregate::CaseFilter;
use engine::EngineContext;
use minimums::{RequirementTable, RolePolicy};
use models::{CaseSet, Role};
use reconcile::{CompoundLabelConvention, ParentRollup};

#[derive(Parser)]
#[command(name = "case-minimums")]
#[command(about = "Track surgical case log progress against minimum requirements", long_about = None)]
struct Cli {
    /// Only log errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Log debug detail
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConventionArgs {
    /// Separator between a category and its parent annotation
    #[arg(long, default_value_t = reconcile::DEFAULT_DELIMITER)]
    delimiter: char,
    /// Parent rollup as `qualifier=parent`; repeatable
    #[arg(long = "rollup")]
    rollups: Vec<ParentRollup>,
}

impl ConventionArgs {
    fn into_convention(self) -> CompoundLabelConvention {
        let mut convention = CompoundLabelConvention {
            delimiter: self.delimiter,
            ..CompoundLabelConvention::default()
        };
        if !self.rollups.is_empty() {
            convention.rollups = self.rollups;
        }
        convention
    }
}

#[derive(Args)]
struct MinimumsArgs {
    /// Requirements CSV (Category, Minimum, optional WhichRole); defaults to the built-in table
    #[arg(long, env = "CASELOG_MINIMUMS")]
    minimums: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = RolePolicy::PerRequirement)]
    role_policy: RolePolicy,
    #[command(flatten)]
    convention: ConventionArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Show case totals and the area breakdown for one role
    Summary {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum, default_value_t = Role::Primary)]
        role: Role,
    },
    /// Show progress toward each minimum requirement
    Minimums {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        config: MinimumsArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show case counts per defined category after reconciliation
    Categories {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        convention: ConventionArgs,
        /// Counts per truncated category, before parent rollups
        #[arg(long)]
        raw: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Print the normalized case log as CSV, newest first
    Cases {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum)]
        role: Option<Role>,
        /// Keep cases whose TypeDesc contains this text (case-insensitive)
        #[arg(long = "type")]
        type_text: Option<String>,
        /// Keep cases whose CPTDesc contains this text (case-insensitive)
        #[arg(long = "cpt")]
        cpt_text: Option<String>,
        /// Keep cases from this YearOfCase; repeatable
        #[arg(long = "year")]
        years: Vec<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum, default_value_t = Role::Primary)]
        role: Role,
        #[command(flatten)]
        config: MinimumsArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Commands::Summary { csv, role } => {
            let cases = load_cases(&csv)?;
            if cases.is_empty() {
                println!("No cases in {}.", csv.display());
                return Ok(());
            }
            let overview = aggregate::overview(&cases, role);

            println!("{}", report::overview_sentence(&overview));
            let breakdown = aggregate::area_breakdown(&overview.role_subset);
            if breakdown.is_empty() {
                println!("No cases logged as {role}.");
                return Ok(());
            }

            println!("Cases by area (largest area: {}):", overview.max_area_count);
            for area in breakdown.iter() {
                println!("- {} ({})", area.area, area.count);
                for (type_desc, count) in area.types.iter() {
                    println!("    {type_desc}: {count}");
                }
            }
        }
        Commands::Minimums {
            csv,
            config,
            format,
        } => {
            // Requirements load before the upload so a bad table fails first.
            let context = engine_context(config)?;
            let cases = load_cases(&csv)?;
            let progress = context.progress(&cases);

            match format {
                OutputFormat::Table => print!("{}", report::progress_table(&progress.rows)),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&progress.rows)?)
                }
                OutputFormat::Csv => report::write_progress_csv(std::io::stdout(), &progress.rows)
                    .context("failed to write progress CSV")?,
            }
        }
        Commands::Categories {
            csv,
            convention,
            raw,
            format,
        } => {
            let cases = load_cases(&csv)?;
            let reconciliation = reconcile::reconcile(&cases, &convention.into_convention());
            let counts = if raw {
                &reconciliation.raw
            } else {
                &reconciliation.reconciled
            };

            match format {
                OutputFormat::Table => print!("{}", report::category_table(counts)),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&counts.entries())?)
                }
                OutputFormat::Csv => report::write_category_csv(std::io::stdout(), &counts.entries())
                    .context("failed to write category CSV")?,
            }
        }
        Commands::Cases {
            csv,
            role,
            type_text,
            cpt_text,
            years,
        } => {
            let cases = load_cases(&csv)?;
            let filter = CaseFilter {
                role,
                type_text,
                cpt_text,
                years,
            };
            let records = filter.apply(&cases);
            report::write_cases_csv(std::io::stdout(), &records)
                .context("failed to write case CSV")?;
        }
        Commands::Report {
            csv,
            role,
            config,
            out,
        } => {
            let context = engine_context(config)?;
            let cases = load_cases(&csv)?;
            let overview = aggregate::overview(&cases, role);
            let progress = context.progress(&cases);
            let generated_on = chrono::Local::now().date_naive();

            let report = report::build_report(&overview, &progress, generated_on);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_cases(path: &Path) -> anyhow::Result<CaseSet> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let cases = normalize::read_case_set(file)
        .with_context(|| format!("failed to read case log {}", path.display()))?;
    Ok(cases)
}

fn engine_context(args: MinimumsArgs) -> anyhow::Result<EngineContext> {
    let requirements = match args.minimums.as_deref() {
        Some(path) => RequirementTable::from_path(path)?,
        None => RequirementTable::builtin()?,
    };

    let mut context = EngineContext::new(requirements);
    context.convention = args.convention.into_convention();
    context.policy = args.role_policy;
    Ok(context)
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("CASELOG_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
