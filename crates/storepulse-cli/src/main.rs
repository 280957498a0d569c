mod import;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "storepulse-cli")]
#[command(about = "StorePulse command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Load the source CSV datasets into the database
    Import {
        /// Store status observations (`store_id,status,timestamp_utc`)
        #[arg(long)]
        store_status: Option<PathBuf>,
        /// Weekly business hours (`store_id,dayOfWeek,start_time_local,end_time_local`)
        #[arg(long)]
        business_hours: Option<PathBuf>,
        /// Store timezones (`store_id,timezone_str`)
        #[arg(long)]
        timezones: Option<PathBuf>,
    },
    /// Build an uptime/downtime report now and write it as CSV
    Report {
        /// Write the CSV here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Also store the finished report so it can be fetched by id
        #[arg(long)]
        persist: bool,
    },
    /// Show the status of a stored report
    Status {
        /// Report id returned by `trigger_report` or `report --persist`
        report_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("storepulse-cli ready; run with --help to list commands");
        return Ok(());
    };

    let config = storepulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = storepulse_db::PoolConfig::from_app_config(&config);
    let pool = storepulse_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Migrate => {
            let applied = storepulse_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Import {
            store_status,
            business_hours,
            timezones,
        } => {
            let paths = import::ImportPaths {
                store_status,
                business_hours,
                timezones,
            };
            import::run_import(&pool, &paths).await?;
        }
        Commands::Report { output, persist } => {
            report::run_report(&pool, &config, output.as_deref(), persist).await?;
        }
        Commands::Status { report_id } => report::run_status(&pool, report_id).await?,
    }

    Ok(())
}
