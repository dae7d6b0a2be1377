//! table-partition CLI - Key-range partitioning for table validation.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use table_partition::output::PartitionConfig;
use table_partition::runner::ValidationResult;
use table_partition::{
    health_check, job_completion_index, Config, ConfigRunner, CountValidationEngine,
    MemorySource, PartitionError, Partitioner, PgSource, ProcessMemory, RunnerArgs,
    ValidationEngine,
};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "table-partition")]
#[command(about = "Split tables into key-range partitions for parallel validation")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate partition configs for the configured table
    Generate {
        /// Number of partitions (overrides the configuration)
        #[arg(long)]
        partitions: Option<usize>,

        /// Directory to write partition configs to
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Read key rows from a YAML file instead of the database
        #[arg(long)]
        keys_file: Option<PathBuf>,
    },

    /// Recommend a partition count from a memory probe
    Estimate {
        /// Rows to materialize for the probe
        #[arg(long)]
        probe_rows: Option<usize>,

        /// Memory budget per partition in MB
        #[arg(long)]
        budget_mb: Option<u64>,
    },

    /// Work with generated partition configs
    Configs {
        #[command(subcommand)]
        command: ConfigsCommand,
    },

    /// Test database connections
    HealthCheck,
}

#[derive(Subcommand)]
enum ConfigsCommand {
    /// Run partition configs through row-count validation
    Run {
        /// Single partition config file
        #[arg(long, conflicts_with = "config_dir", required_unless_present = "config_dir")]
        config_file: Option<PathBuf>,

        /// Directory of partition configs
        #[arg(long)]
        config_dir: Option<PathBuf>,

        /// Run only the file matching JOB_COMPLETION_INDEX (Kubernetes indexed Jobs)
        #[arg(long, visible_alias = "kc")]
        kube_completions: bool,

        /// Print the partition filters without running them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), PartitionError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| PartitionError::Config(e.to_string()))?;

    match cli.command {
        Commands::Generate {
            partitions,
            output_dir,
            keys_file,
        } => {
            let partitioner = Partitioner::new(load_config(&cli.config)?)?;

            let mut result = match keys_file {
                Some(path) => {
                    let source = MemorySource::load(partitioner.key_schema().clone(), &path)?;
                    info!("Loaded {} key rows from {:?}", source.rows().len(), path);
                    let n = partitioner
                        .partition_count(partitions, &source, None, &ProcessMemory)
                        .await?;
                    partitioner.generate(&source, n).await?
                }
                None => {
                    let source = PgSource::new(partitioner.sample_database(), 2).await?;
                    let table = partitioner.sample_table();
                    let probe = source.probe(
                        &table,
                        partitioner.key_schema(),
                        partitioner.config().partition.filter.as_deref(),
                    );
                    let n = partitioner
                        .partition_count(partitions, &source, Some(&probe), &ProcessMemory)
                        .await?;
                    partitioner.generate(&source, n).await?
                }
            };
            let dir = partitioner.write(&mut result, output_dir.as_deref())?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nPartition configs generated!");
                println!("  Table: {}", result.table);
                println!("  Rows: {}", result.row_count);
                println!("  Partitions: {}", result.partition_count);
                println!("  Directory: {}", dir.display());
            }
        }

        Commands::Estimate {
            probe_rows,
            budget_mb,
        } => {
            let partitioner = Partitioner::new(load_config(&cli.config)?)?;
            let source = PgSource::new(partitioner.sample_database(), 2).await?;
            let table = partitioner.sample_table();
            let probe = source.probe(
                &table,
                partitioner.key_schema(),
                partitioner.config().partition.filter.as_deref(),
            );
            let estimate = partitioner
                .estimate(&source, &probe, &ProcessMemory, probe_rows, budget_mb)
                .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                println!("Estimate for {}:", table);
                println!("  Rows: {}", estimate.total_rows);
                println!("  Bytes per row: {:.1}", estimate.bytes_per_row);
                println!("  Rows per partition: {}", estimate.rows_per_partition);
                println!("  Recommended partitions: {}", estimate.partition_count);
            }
        }

        Commands::Configs {
            command:
                ConfigsCommand::Run {
                    config_file,
                    config_dir,
                    kube_completions,
                    dry_run,
                },
        } => {
            let args = RunnerArgs {
                config_file,
                config_dir,
                kube_completions,
                dry_run,
            };

            let report = if dry_run {
                let engine = DryRunEngine;
                ConfigRunner::new(&engine)
                    .with_job_index(job_completion_index())
                    .run(&args)
                    .await?
            } else {
                let config = load_config(&cli.config)?;
                let engine = CountValidationEngine::connect(&config).await?;
                ConfigRunner::new(&engine)
                    .with_job_index(job_completion_index())
                    .with_expected_hash(config.hash())
                    .run(&args)
                    .await?
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if dry_run {
                for planned in &report.planned {
                    println!(
                        "Partition {}/{}:",
                        planned.partition_index + 1,
                        planned.partition_count
                    );
                    println!(
                        "  Source {}: {}",
                        planned.source.table_ref(),
                        planned.source.filter
                    );
                    println!(
                        "  Target {}: {}",
                        planned.target.table_ref(),
                        planned.target.filter
                    );
                }
            } else {
                println!("Validation Results:");
                for r in &report.results {
                    println!(
                        "  Partition {}: {:?} (source {}, target {})",
                        r.partition_index, r.status, r.source_rows, r.target_rows
                    );
                }
                let mismatches = report.mismatches();
                if mismatches > 0 {
                    return Err(PartitionError::Validation(format!(
                        "{} partitions have mismatched row counts",
                        mismatches
                    )));
                }
            }
        }

        Commands::HealthCheck => {
            let config = load_config(&cli.config)?;
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    config.source.r#type,
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms)",
                    config.target.r#type,
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
            }

            if !result.healthy() {
                return Err(PartitionError::pool(
                    "one or more databases are unreachable",
                    "health check",
                ));
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config, PartitionError> {
    let config = Config::load(path)?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Stands in for a database engine when configs are only printed.
struct DryRunEngine;

#[async_trait]
impl ValidationEngine for DryRunEngine {
    async fn validate(&self, config: &PartitionConfig) -> table_partition::Result<ValidationResult> {
        Err(PartitionError::Config(format!(
            "partition {} cannot be validated in a dry run",
            config.partition_index
        )))
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
