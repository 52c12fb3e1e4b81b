mod batch;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use preservion_ai::Pipeline;
use preservion_core::{DecisionConfig, DecisionEngine, SensorReading};
use preservion_server::AppState;

#[derive(Parser)]
#[command(name = "preservion", version, about = "Onion storage spoilage assessment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Directory holding artifact.json
    #[arg(long, env = "PRESERVION_MODEL_DIR", default_value = "models/onion-centroid")]
    model_dir: PathBuf,

    /// JSON file overriding the built-in decision rules
    #[arg(long, env = "PRESERVION_RULES")]
    rules: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve /predict and /health
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        #[arg(long, env = "PRESERVION_ADDR", default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
    },
    /// Assess a single reading and print the result as JSON
    Predict {
        #[command(flatten)]
        model: ModelArgs,

        #[arg(long, allow_negative_numbers = true)]
        temperature: f64,
        #[arg(long)]
        humidity: f64,
        #[arg(long)]
        ethylene: f64,
        #[arg(long)]
        co2: f64,
        #[arg(long)]
        onion_type: String,
    },
    /// Score a Parquet file of readings
    Batch {
        #[command(flatten)]
        model: ModelArgs,

        input: PathBuf,
        output: PathBuf,
    },
    /// POST a sample reading to a running server
    Probe {
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,
    },
}

fn load_pipeline(args: &ModelArgs) -> anyhow::Result<Pipeline> {
    let engine = match &args.rules {
        Some(path) => DecisionEngine::new(DecisionConfig::from_path(path)?)?,
        None => DecisionEngine::default(),
    };
    Pipeline::load(&args.model_dir, engine)
        .with_context(|| format!("loading model artifact from {}", args.model_dir.display()))
}

async fn probe(url: &str) -> anyhow::Result<()> {
    let sample = serde_json::json!({
        "temperature": 18,
        "humidity": 80,
        "ethylene": 3.2,
        "co2": 620,
        "onion_type": "red"
    });
    let endpoint = format!("{}/predict", url.trim_end_matches('/'));
    let resp = reqwest::Client::new()
        .post(&endpoint)
        .json(&sample)
        .send()
        .await
        .with_context(|| format!("POST {endpoint}"))?;
    println!("Status Code: {}", resp.status().as_u16());
    println!("Response: {}", resp.text().await?);
    Ok(())
}

fn report_batch(input: &Path, stats: &batch::BatchStats) {
    eprintln!(
        "Scored {} of {} rows from {} ({} rejected) in {:.2}s",
        stats.scored.scored,
        stats.scored.rows,
        input.display(),
        stats.scored.rejected,
        stats.elapsed_secs
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { model, addr } => {
            tracing::info!("preservion v{}", env!("CARGO_PKG_VERSION"));
            let pipeline = load_pipeline(&model)?;
            preservion_server::serve(addr, AppState::new(pipeline)).await?;
        }
        Command::Predict {
            model,
            temperature,
            humidity,
            ethylene,
            co2,
            onion_type,
        } => {
            let pipeline = load_pipeline(&model)?;
            let reading = SensorReading {
                temperature,
                humidity,
                ethylene,
                co2,
                onion_type,
            };
            let assessment = pipeline.assess(&reading)?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Command::Batch {
            model,
            input,
            output,
        } => {
            let pipeline = load_pipeline(&model)?;
            let now = chrono::Utc::now()
                .timestamp_nanos_opt()
                .context("system clock outside the nanosecond timestamp range")?;
            let stats = batch::run_batch(&pipeline, &input, &output, now)?;
            report_batch(&input, &stats);
        }
        Command::Probe { url } => probe(&url).await?,
    }
    Ok(())
}
