use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use staffing_oracle::config::{Config, ConfigOverrides};
use staffing_oracle::context::{Audience, ContextRecord, DecisionContext, DecisionMode, Objective};
use staffing_oracle::error::{InputError, PipelineError};
use staffing_oracle::forecast::{RawForecast, RawServiceTarget};
use staffing_oracle::output::csv::{
    batch_to_csv, scenarios_to_csv, staffing_to_csv, tradeoffs_to_csv,
};
use staffing_oracle::output::json::{render_json, write_json};
use staffing_oracle::output::table::{
    render_batch_table, render_decision_report, render_scenario_report, render_staffing_table,
};
use staffing_oracle::pipeline::{
    BatchItem, DecisionPipeline, DecisionReport, DecisionRequest, ScenarioReport,
};
use staffing_oracle::provider::{build_provider, ProviderKind};
use staffing_oracle::server::run_server;
use staffing_oracle::staffing::StaffingResult;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "staffing-oracle",
    about = "Erlang C staffing scenarios with grounded AI decision support"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// live | dummy
    #[arg(long)]
    provider: Option<ProviderKind>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long = "cost-per-agent")]
    cost_per_agent_annual: Option<f64>,
    #[arg(long = "max-retries")]
    max_retries: Option<u32>,
    /// Used when RUST_LOG is unset.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct ForecastArgs {
    /// Contacts per interval.
    #[arg(long)]
    volume: Option<f64>,
    /// Average handle time in seconds.
    #[arg(long = "aht")]
    aht_secs: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    shrinkage: f64,
    #[arg(long = "interval", default_value_t = 30.0)]
    interval_minutes: f64,
    #[arg(long = "target-sla")]
    target_sla: Option<f64>,
    #[arg(long = "answer-secs")]
    answer_secs: Option<f64>,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct ContextArgs {
    #[arg(long)]
    objective: Option<Objective>,
    #[arg(long)]
    mode: Option<DecisionMode>,
    #[arg(long)]
    audience: Option<Audience>,
    #[arg(long = "min-sla")]
    min_sla_target: Option<f64>,
    #[arg(long = "max-budget")]
    max_budget_annual: Option<f64>,
    #[arg(long = "max-risk")]
    max_breach_risk: Option<f64>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    question: Option<String>,
}

impl TryFrom<ContextArgs> for DecisionContext {
    type Error = InputError;

    fn try_from(value: ContextArgs) -> Result<Self, Self::Error> {
        DecisionContext::try_from(ContextRecord {
            objective: value.objective.unwrap_or_default(),
            decision_mode: value.mode.unwrap_or_default(),
            audience: value.audience.unwrap_or_default(),
            min_sla_target: value.min_sla_target,
            max_budget_annual: value.max_budget_annual,
            max_breach_risk: value.max_breach_risk,
            notes: value.notes,
        })
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Size a single interval with Erlang C.
    Staffing {
        #[command(flatten)]
        forecast: ForecastArgs,
    },
    /// Generate the scenario set and mark feasibility.
    Scenarios {
        #[command(flatten)]
        forecast: ForecastArgs,
        #[command(flatten)]
        context: ContextArgs,
        /// JSON request file; replaces the forecast and context flags.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Run the full decision pipeline.
    Decide {
        #[command(flatten)]
        forecast: ForecastArgs,
        #[command(flatten)]
        context: ContextArgs,
        #[arg(long)]
        request: Option<PathBuf>,
        /// Also write the report as JSON to this path.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Run a JSON array of requests concurrently.
    Batch {
        #[arg(long)]
        input: PathBuf,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 2 for bad input, 3 for unstaffable load, 1 for anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PipelineError>()
        .or_else(|| {
            err.chain()
                .find_map(|cause| cause.downcast_ref::<PipelineError>())
        })
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(config_path.as_path()))?;
    config.apply_overrides(ConfigOverrides {
        provider: cli.provider,
        model: cli.model.clone(),
        cost_per_agent_annual: cli.cost_per_agent_annual,
        max_retries: cli.max_retries,
    });

    match cli.command {
        Commands::Config { init, show } => {
            handle_config_command(init, show, &config, &config_path)?;
        }
        Commands::Staffing { forecast } => {
            let pipeline = build_pipeline(&config)?;
            let (forecast, target) = forecast_from_args(&forecast)?;
            let result = pipeline.staffing(forecast, target)?;
            print_staffing(&result, cli.output)?;
        }
        Commands::Scenarios {
            forecast,
            context,
            request,
        } => {
            let pipeline = build_pipeline(&config)?;
            let request = build_request(request.as_deref(), &forecast, context)?;
            let report = pipeline.evaluate(&request).await?;
            print_scenarios(&report, cli.output)?;
        }
        Commands::Decide {
            forecast,
            context,
            request,
            save,
        } => {
            let pipeline = build_pipeline(&config)?;
            let request = build_request(request.as_deref(), &forecast, context)?;
            let report = pipeline.run(&request).await?;
            if let Some(path) = save {
                write_json(&path, &report)?;
                info!("report saved to {}", path.display());
            }
            print_decision(&report, cli.output)?;
        }
        Commands::Batch { input } => {
            let pipeline = build_pipeline(&config)?;
            let data = fs::read_to_string(&input)
                .with_context(|| format!("failed reading batch input: {}", input.display()))?;
            let requests: Vec<serde_json::Value> = serde_json::from_str(&data)
                .map_err(|e| PipelineError::from(InputError::new("batch", e.to_string())))?;
            let items = pipeline.run_batch(requests).await;
            let failed = items.iter().filter(|item| item.error.is_some()).count();
            if failed > 0 {
                warn!(failed, total = items.len(), "some batch requests failed");
            }
            print_batch(&items, cli.output)?;
        }
        Commands::Serve { host, port } => {
            let pipeline = build_pipeline(&config)?;
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            run_server(pipeline, addr).await?;
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> Result<DecisionPipeline> {
    let api_key = std::env::var(&config.provider.api_key_env).ok();
    let provider = build_provider(&config.provider_settings(api_key))
        .map_err(|e| anyhow!("failed to initialise provider: {e}"))?;
    let pipeline = DecisionPipeline::new(config.pipeline_config()?, provider);
    info!(provider = pipeline.provider_name(), "pipeline ready");
    Ok(pipeline)
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn forecast_from_args(
    args: &ForecastArgs,
) -> Result<(RawForecast, Option<RawServiceTarget>), PipelineError> {
    let volume = args
        .volume
        .ok_or_else(|| InputError::new("volume", "is required (--volume)"))?;
    let aht_secs = args
        .aht_secs
        .ok_or_else(|| InputError::new("aht_secs", "is required (--aht)"))?;
    let forecast = RawForecast {
        volume,
        aht_secs,
        shrinkage: args.shrinkage,
        interval_minutes: args.interval_minutes,
    };
    let target = match (args.target_sla, args.answer_secs) {
        (None, None) => None,
        (target_sla, answer_secs) => Some(RawServiceTarget {
            target_sla: target_sla
                .ok_or_else(|| InputError::new("target_sla", "--answer-secs needs --target-sla"))?,
            answer_secs: answer_secs
                .ok_or_else(|| InputError::new("answer_secs", "--target-sla needs --answer-secs"))?,
        }),
    };
    Ok((forecast, target))
}

fn build_request(
    path: Option<&Path>,
    forecast: &ForecastArgs,
    context: ContextArgs,
) -> Result<DecisionRequest> {
    if let Some(path) = path {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading request: {}", path.display()))?;
        return Ok(DecisionRequest::from_json(&data).map_err(PipelineError::from)?);
    }
    let (forecast, target) = forecast_from_args(forecast)?;
    let question = context.question.clone();
    Ok(DecisionRequest {
        forecast,
        target,
        context: DecisionContext::try_from(context).map_err(PipelineError::from)?,
        question,
    })
}

fn print_staffing(result: &StaffingResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_staffing_table(result)),
        OutputFormat::Json => println!("{}", render_json(result)?),
        OutputFormat::Csv => print!("{}", staffing_to_csv(result)?),
    }
    Ok(())
}

fn print_scenarios(report: &ScenarioReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_scenario_report(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => print!("{}", scenarios_to_csv(&report.scenarios)?),
    }
    Ok(())
}

fn print_decision(report: &DecisionReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_decision_report(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => {
            print!("{}", scenarios_to_csv(&report.scenarios)?);
            println!();
            print!("{}", tradeoffs_to_csv(&report.response)?);
        }
    }
    Ok(())
}

fn print_batch(items: &[BatchItem], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_batch_table(items)),
        OutputFormat::Json => println!("{}", render_json(items)?),
        OutputFormat::Csv => print!("{}", batch_to_csv(items)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use staffing_oracle::context::Objective;
    use staffing_oracle::error::{CapacityError, InputError, PipelineError};

    use super::{exit_code, forecast_from_args, Cli, Commands, ForecastArgs};

    #[test]
    fn exit_codes_follow_the_error_kind() {
        let input = anyhow::Error::from(PipelineError::from(InputError::new("volume", "bad")));
        assert_eq!(exit_code(&input), 2);
        let capacity = anyhow::Error::from(PipelineError::from(CapacityError::UnstableQueue {
            offered_load: f64::INFINITY,
        }))
        .context("decide failed");
        assert_eq!(exit_code(&capacity), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("disk full")), 1);
    }

    #[test]
    fn parses_decide_flags() {
        let cli = Cli::try_parse_from([
            "staffing-oracle",
            "--provider",
            "dummy",
            "decide",
            "--volume",
            "100",
            "--aht",
            "300",
            "--shrinkage",
            "0.3",
            "--objective",
            "min-cost",
            "--max-budget",
            "1500000",
        ])
        .expect("valid cli");
        let Commands::Decide {
            forecast, context, ..
        } = cli.command
        else {
            panic!("expected decide");
        };
        assert_eq!(forecast.volume, Some(100.0));
        assert_eq!(forecast.interval_minutes, 30.0);
        assert_eq!(context.objective, Some(Objective::MinCost));
        assert_eq!(context.max_budget_annual, Some(1_500_000.0));
    }

    #[test]
    fn forecast_flags_require_volume_and_paired_target() {
        let err = forecast_from_args(&ForecastArgs::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let half_target = ForecastArgs {
            volume: Some(10.0),
            aht_secs: Some(200.0),
            target_sla: Some(0.9),
            ..ForecastArgs::default()
        };
        assert!(forecast_from_args(&half_target).is_err());
    }
}
