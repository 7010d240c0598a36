use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sampling_agent::{
    config::TrainerConfig,
    demo::{PathSignalConfig, PathSignalEnv},
    dqn::DqnEstimator,
    env::Environment,
    estimator::ValueEstimator,
    evaluate::evaluate,
    report::{CsvReporter, Reporter, Tee, TracingReporter},
    trainer::Trainer,
};

#[derive(Parser)]
#[command(name = "sampling-agent")]
#[command(about = "Train a DQN to choose which graph nodes to sample", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on the built-in path-signal environment
    Train {
        /// JSON file with trainer settings; missing fields take defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of training episodes
        #[arg(short, long)]
        episodes: Option<usize>,

        /// Seed for replay sampling, exploration and the signal
        #[arg(long)]
        seed: Option<u64>,

        /// Also write episode reports to this CSV file
        #[arg(long)]
        report_csv: Option<PathBuf>,

        /// Samples per episode
        #[arg(long, default_value = "10")]
        budget: usize,

        /// Run one evaluation episode after training
        #[arg(long)]
        eval: bool,
    },

    /// Print the default trainer configuration as JSON
    Defaults,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Train {
            config,
            episodes,
            seed,
            report_csv,
            budget,
            eval,
        } => {
            let mut trainer_config = match config {
                Some(path) => TrainerConfig::from_json_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => TrainerConfig::default(),
            };
            if let Some(episodes) = episodes {
                trainer_config.num_episodes = episodes;
            }
            if let Some(seed) = seed {
                trainer_config.seed = Some(seed);
                trainer_config.estimator.seed = Some(seed.wrapping_add(1));
            }

            let env = PathSignalEnv::new(PathSignalConfig {
                budget,
                seed: seed.map(|s| s.wrapping_add(2)),
                ..Default::default()
            })
            .context("building environment")?;

            match report_csv {
                Some(path) => run(
                    trainer_config,
                    env,
                    Tee(TracingReporter, CsvReporter::new(path)),
                    eval,
                ),
                None => run(trainer_config, env, TracingReporter, eval),
            }
        }
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&TrainerConfig::default())?);
            Ok(())
        }
    }
}

fn run<R: Reporter>(
    config: TrainerConfig,
    mut env: PathSignalEnv,
    reporter: R,
    eval: bool,
) -> Result<()> {
    let mut estimator =
        DqnEstimator::new(&env.observation_space(), env.num_actions(), &config.estimator)
            .context("building estimator")?;
    estimator.initialize()?;

    let eval_explore_prob = config.eval_explore_prob;
    let render_eval = config.render_eval;
    let mut trainer = Trainer::new(config, reporter).context("invalid trainer configuration")?;

    let start = Instant::now();
    let summary = trainer
        .train(&mut env, &mut estimator)
        .context("training failed")?;
    info!(
        took_ms = start.elapsed().as_millis() as u64,
        steps = summary.global_steps,
        updates = summary.updates,
        "done"
    );

    if eval {
        let result = evaluate(&mut env, &mut estimator, eval_explore_prob, render_eval)?;
        println!("nmse: {}", result.quality);
    }
    Ok(())
}
