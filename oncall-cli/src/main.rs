// OnCall CLI - run log analyses from the terminal or start the HTTP service

use anyhow::Result;
use clap::{Parser, Subcommand};
use oncall_core::{
    logging::init_tracing, AnalysisRequest, AnalysisService, LogFetcher, OutputFormat, Settings,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "oncall")]
#[command(about = "AI-assisted analysis of GCP Cloud Logging entries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch logs, analyze them and write a report
    Analyze {
        /// How far back to look, in hours
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..=168))]
        hours_back: u32,

        /// Additional Cloud Logging filter (only used with --all-logs)
        #[arg(long)]
        filter: Option<String>,

        /// Maximum number of entries to fetch
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
        max_logs: Option<u32>,

        /// Include entries below WARNING
        #[arg(long)]
        all_logs: bool,

        /// Report format (markdown or json)
        #[arg(long, default_value = "markdown")]
        format: OutputFormat,
    },

    /// Print severity statistics for recent logs
    Stats {
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..=168))]
        hours_back: u32,
    },

    /// Start the HTTP service
    Serve {
        /// Bind address (defaults to HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port (defaults to PORT or 8000)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn analysis_request(
    hours_back: u32,
    filter: Option<String>,
    max_logs: Option<u32>,
    all_logs: bool,
    format: OutputFormat,
) -> AnalysisRequest {
    AnalysisRequest {
        hours_back,
        filter_query: filter,
        max_logs,
        focus_on_errors: !all_logs,
        output_format: format,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    init_tracing(&settings);

    match cli.command {
        Commands::Analyze {
            hours_back,
            filter,
            max_logs,
            all_logs,
            format,
        } => {
            if !all_logs && filter.is_some() {
                warn!("--filter is ignored unless --all-logs is set");
            }
            let request = analysis_request(hours_back, filter, max_logs, all_logs, format);

            let service = AnalysisService::from_settings(&settings)?;
            let result = service.analyze(&request).await?;

            info!(
                analysis_id = %result.analysis_id,
                findings = result.findings.len(),
                "Analysis finished"
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Stats { hours_back } => {
            let fetcher = LogFetcher::from_settings(&settings)?;
            let stats = fetcher.log_statistics(hours_back).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            oncall_web::serve(settings).await?;
        }
    }

    Ok(())
}
