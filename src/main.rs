use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cogex_experiment::{ExperimentConfig, Session};
use cogex_timing::{HighPrecisionTimer, RealtimeScheduler, VirtualScheduler};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod participant;
mod runner;
mod storage;

use participant::{Profile, SimulatedParticipant};
use storage::JsonlStore;

const USAGE: &str =
    "usage: acct [--config PATH] [--output DIR] [--seed N] [--accuracy P] [--realtime]";

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    output: PathBuf,
    seed: u64,
    accuracy: f64,
    realtime: bool,
}

impl Args {
    /// Flags win over `COGEX_CONFIG`, `COGEX_OUTPUT` and `COGEX_SEED`.
    fn parse() -> Result<Self> {
        let mut args = Self {
            config: std::env::var("COGEX_CONFIG").ok().map(PathBuf::from),
            output: std::env::var("COGEX_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("results")),
            seed: match std::env::var("COGEX_SEED") {
                Ok(s) => s.parse().with_context(|| format!("COGEX_SEED={s}"))?,
                Err(_) => rand::random(),
            },
            accuracy: Profile::default().accuracy,
            realtime: false,
        };

        let mut it = std::env::args().skip(1);
        while let Some(flag) = it.next() {
            let mut value = || it.next().with_context(|| format!("{flag} needs a value\n{USAGE}"));
            match flag.as_str() {
                "--config" => args.config = Some(PathBuf::from(value()?)),
                "--output" => args.output = PathBuf::from(value()?),
                "--seed" => args.seed = value()?.parse().context("--seed")?,
                "--accuracy" => args.accuracy = value()?.parse().context("--accuracy")?,
                "--realtime" => args.realtime = true,
                "-h" | "--help" => {
                    println!("{USAGE}");
                    std::process::exit(0);
                }
                other => bail!("unknown argument {other}\n{USAGE}"),
            }
        }
        Ok(args)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse()?;
    let config = match &args.config {
        Some(path) => ExperimentConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    info!(
        experiment = %config.name,
        seed = args.seed,
        output = %args.output.display(),
        realtime = args.realtime,
        "starting"
    );

    let store = JsonlStore::open(&args.output, config.blocks.trials_per_block)?;
    let mut session = Session::new(config, StdRng::seed_from_u64(args.seed), store)
        .context("invalid experiment configuration")?;
    let mut participant = SimulatedParticipant::new(
        args.seed.wrapping_add(1),
        Profile {
            accuracy: args.accuracy,
            ..Profile::default()
        },
    );

    let summary = if args.realtime {
        let mut scheduler = RealtimeScheduler::new(HighPrecisionTimer::new());
        runner::run_session(&mut session, &mut scheduler, &mut participant)?
    } else {
        let mut scheduler = VirtualScheduler::new();
        runner::run_session(&mut session, &mut scheduler, &mut participant)?
    };

    let snapshot = session.controller().snapshot();
    let config = session.config();
    let path = session
        .sink()
        .write_session(args.seed, (&config.name, &config.version), snapshot)?;

    println!("Session complete: {} trials", session.results().len());
    println!(
        "Accuracy {:.1}%, mean RT {:.0} ms, final level {} ({}), {} adjustments",
        summary.accuracy * 100.0,
        summary.mean_rt_ms,
        summary.current_level,
        summary.level_name,
        summary.adjustments
    );
    println!(
        "Results saved to {} and {}",
        session.sink().dir().join(storage::TRIALS_FILE).display(),
        path.display()
    );
    Ok(())
}
