use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use momentum_bot::backtest::{
    load_bars, BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator,
};
use momentum_bot::RiskParameters;

#[derive(Parser)]
#[command(
    name = "momentum-bot",
    about = "Single-instrument momentum bot: MA/EMA bias with ATR risk sizing"
)]
struct Cli {
    /// TOML/YAML/JSON file with risk parameters; MOMENTUM_* env vars override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay daily bars from a CSV file against the simulated exchange.
    Backtest {
        /// CSV with Date Time/Open/High/Low/Close/Volume columns.
        #[arg(long)]
        csv: PathBuf,

        /// Starting account balance.
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,

        /// Print the report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run the bot over seeded synthetic bars.
    Simulate {
        #[arg(long, value_enum, default_value_t = Scenario::Reversal)]
        scenario: Scenario,

        #[arg(long, default_value_t = 500)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    Uptrend,
    Downtrend,
    Sideways,
    Volatile,
    Reversal,
}

impl From<Scenario> for MarketScenario {
    fn from(scenario: Scenario) -> Self {
        match scenario {
            Scenario::Uptrend => MarketScenario::Uptrend,
            Scenario::Downtrend => MarketScenario::Downtrend,
            Scenario::Sideways => MarketScenario::Sideways,
            Scenario::Volatile => MarketScenario::Volatile,
            Scenario::Reversal => MarketScenario::Reversal,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let params = load_params(cli.config.as_deref())?;

    match cli.command {
        Commands::Backtest { csv, balance, json } => {
            let bars = load_bars(&csv)
                .with_context(|| format!("failed to load bars from {}", csv.display()))?;
            let report = BacktestRunner::new(&params, balance).run(bars)?;
            emit(&report, json)
        }
        Commands::Simulate {
            scenario,
            bars,
            seed,
            balance,
            json,
        } => {
            let mut generator = SyntheticDataGenerator::new(seed);
            let bars = generator.generate(scenario.into(), bars);
            let report = BacktestRunner::new(&params, balance).run(bars)?;
            emit(&report, json)
        }
    }
}

fn load_params(path: Option<&Path>) -> Result<RiskParameters> {
    let params = RiskParameters::load(path).context("invalid risk parameters")?;
    tracing::info!(
        "Trading {} ({}): MA {} / EMA {} / ATR {}, leverage {}x",
        params.instrument,
        params.currency,
        params.ma_lookback,
        params.ema_lookback,
        params.atr_lookback,
        params.leverage
    );
    Ok(params)
}

fn emit(report: &BacktestReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        report.print_report();
    }
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("momentum_bot=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
