use clap::{Parser, ValueEnum};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use task_assignment::data::{self, DemoData, ScheduleDocument};
use task_assignment::solver::{JobManager, SolverConfig};
use task_assignment::{algo, analyze_reader};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug)]
struct Algorithm(&'static str);

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ValueEnum for Algorithm {
    fn value_variants<'a>() -> &'a [Self] {
        static ALGORITHMS: std::sync::LazyLock<Vec<Algorithm>> = std::sync::LazyLock::new(|| {
            let iter = algo::SEARCH_ENGINES.iter();
            iter.map(|init| Algorithm(init().name())).collect()
        });

        ALGORITHMS.as_slice()
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.0))
    }
}

/// Assigns tasks to skilled resources under capacity, duration and balance constraints.
#[derive(Debug, Parser)]
enum Application {
    /// List the demo datasets or print one as a schedule document.
    Demo {
        /// Dataset identifier, e.g. SMALL.
        dataset: Option<String>,
    },
    /// Solve a schedule document and print the best schedule found.
    Solve {
        /// The search engine.
        algorithm: Algorithm,
        /// Schedule document. Read from stdin when omitted.
        #[clap(short, long)]
        input: Option<PathBuf>,
        /// Time limit of the solve job.
        #[clap(short, long, default_value = "30")]
        seconds: u64,
        /// Stop after this many seconds without an improvement.
        #[clap(short, long)]
        unimproved_seconds: Option<u64>,
        /// Seed of the search engine.
        #[clap(long)]
        seed: Option<u64>,
        /// Interval between two status polls.
        #[clap(short, long, default_value = "100")]
        poll_millis: u64,
    },
    /// Print the score breakdown of a schedule document.
    Analyze {
        /// Schedule document. Read from stdin when omitted.
        #[clap(short, long)]
        input: Option<PathBuf>,
    },
}

fn open(input: Option<PathBuf>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match input {
        Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::stdin().lock()),
    })
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Application::parse() {
        Application::Demo { dataset: None } => {
            println!("{}", data::to_string(&DemoData::ALL)?);
        }
        Application::Demo {
            dataset: Some(dataset),
        } => {
            let schedule = dataset.parse::<DemoData>()?.generate()?;
            println!("{}", data::to_string(&ScheduleDocument::from(&schedule))?);
        }
        Application::Solve {
            algorithm,
            input,
            seconds,
            unimproved_seconds,
            seed,
            poll_millis,
        } => {
            let (schedule, weights) = data::read_schedule(&mut open(input)?)?;

            let mut config = SolverConfig::default()
                .with_engine(algorithm.0)
                .with_spent_limit(Duration::from_secs(seconds));
            if let Some(limit) = unimproved_seconds {
                config = config.with_unimproved_spent_limit(Duration::from_secs(limit));
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }

            let manager = JobManager::new(config);
            let id = manager.submit(schedule, weights)?;
            let report = data::watch(&manager, &id, Duration::from_millis(poll_millis))?;
            for entry in report.entries() {
                tracing::info!(job = %id, "{entry}");
            }

            let schedule = manager.join(&id)?;
            println!("{}", data::to_string(&ScheduleDocument::from(&schedule))?);
        }
        Application::Analyze { input } => {
            let analysis = analyze_reader(&mut open(input)?)?;
            println!("{}", data::to_string(&analysis)?);
        }
    }

    Ok(())
}
