use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;

use pairbai::{
    budget_sweep, BestArmPolicy, CorrelatedSource, CovarianceModel, ExperimentConfig,
    GaussianSource, IdentificationPolicy, PolicyComparison, SuccessRate,
};

#[derive(Parser)]
#[command(
    name = "pairbai",
    version = pairbai::PAIRBAI_VERSION,
    about = "Fixed-budget best-arm identification with correlated pairwise MSE",
    long_about = "Compares uniform allocation against Successive Rejects at finding the arm with \
                 the lowest pairwise mean squared error under a multivariate Gaussian model."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate each policy's probability of finding the best arm
    #[command(about = "Compare policy success rates over repeated trials")]
    Compare {
        /// TOML file with [[experiment]] tables (defaults to the built-in "ex0" model)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Total joint draws per run; repeat to sweep several budgets
        #[arg(long = "budget", value_name = "N")]
        budgets: Vec<u64>,

        /// Independently seeded runs per policy and budget
        #[arg(long, value_name = "N")]
        trials: Option<usize>,

        /// Base seed for the experiment
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
    },

    /// Print the analytic MSE of every arm
    #[command(about = "Print analytic per-arm MSE and the true best arm(s)")]
    TrueMse {
        /// TOML file with [[experiment]] tables (defaults to the built-in "ex0" model)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Run a single identification and print its trace
    #[command(about = "Run one identification and print estimates and phases")]
    Run {
        /// TOML file with [[experiment]] tables (defaults to the built-in "ex0" model)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Experiment to run when the file holds several (defaults to the first)
        #[arg(long, value_name = "NAME")]
        experiment: Option<String>,

        /// Total joint draws
        #[arg(long, value_name = "N")]
        budget: u64,

        /// Source seed
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = PolicyArg::SuccessiveRejects)]
        policy: PolicyArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Uniform,
    SuccessiveRejects,
}

impl From<PolicyArg> for IdentificationPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Uniform => IdentificationPolicy::Uniform,
            PolicyArg::SuccessiveRejects => IdentificationPolicy::SuccessiveRejects,
        }
    }
}

#[derive(Debug, Error)]
enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse experiment file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("experiment file '{}' defines no [[experiment]] tables", .0.display())]
    Empty(PathBuf),

    #[error("no experiment named '{0}'")]
    UnknownExperiment(String),

    #[error("experiment '{name}': {source}")]
    Invalid {
        name: String,
        source: pairbai::Error,
    },

    #[error(transparent)]
    Model(#[from] pairbai::Error),
}

/// On-disk layout of an experiment file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExperimentFile {
    experiment: Vec<ExperimentSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExperimentSpec {
    name: String,
    covariance: Vec<Vec<f64>>,
    #[serde(default = "default_budgets")]
    budgets: Vec<u64>,
    #[serde(default = "default_trials")]
    trials: usize,
    #[serde(default)]
    seed: u64,
}

fn default_budgets() -> Vec<u64> {
    vec![ExperimentConfig::default().budget]
}

fn default_trials() -> usize {
    ExperimentConfig::default().trials
}

/// A validated experiment ready to run.
struct Experiment {
    name: String,
    model: CovarianceModel,
    budgets: Vec<u64>,
    trials: usize,
    seed: u64,
}

impl Experiment {
    fn from_spec(spec: ExperimentSpec) -> Result<Self, ConfigError> {
        let model = CovarianceModel::new(spec.covariance).map_err(|source| ConfigError::Invalid {
            name: spec.name.clone(),
            source,
        })?;
        Ok(Self {
            name: spec.name,
            model,
            budgets: spec.budgets,
            trials: spec.trials,
            seed: spec.seed,
        })
    }

    /// Trial settings for this experiment, with CLI overrides applied.
    fn config(&self, trials: Option<usize>, seed: Option<u64>) -> ExperimentConfig {
        ExperimentConfig {
            trials: trials.unwrap_or(self.trials),
            seed: seed.unwrap_or(self.seed),
            ..ExperimentConfig::default()
        }
    }

    /// Budgets to sweep: `overrides` when any were given, otherwise the file's.
    fn budgets<'a>(&'a self, overrides: &'a [u64]) -> &'a [u64] {
        if overrides.is_empty() {
            &self.budgets
        } else {
            overrides
        }
    }
}

fn builtin_ex0() -> ExperimentSpec {
    ExperimentSpec {
        name: "ex0".to_string(),
        covariance: vec![
            vec![1.0, 0.6, 0.2, 0.1],
            vec![0.6, 1.0, 0.1, 0.1],
            vec![0.2, 0.1, 1.0, 0.0],
            vec![0.1, 0.1, 0.0, 1.0],
        ],
        budgets: default_budgets(),
        trials: default_trials(),
        seed: 0,
    }
}

fn load_experiments(config: Option<&Path>) -> Result<Vec<Experiment>, ConfigError> {
    let Some(path) = config else {
        return Experiment::from_spec(builtin_ex0()).map(|e| vec![e]);
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_experiments(&text, path)
}

/// Parse and validate the contents of an experiment file read from `origin`.
fn parse_experiments(text: &str, origin: &Path) -> Result<Vec<Experiment>, ConfigError> {
    let file: ExperimentFile = toml::from_str(text)?;
    if file.experiment.is_empty() {
        return Err(ConfigError::Empty(origin.to_path_buf()));
    }
    info!(
        "loaded {} experiment(s) from {}",
        file.experiment.len(),
        origin.display()
    );
    file.experiment
        .into_iter()
        .map(Experiment::from_spec)
        .collect()
}

/// The experiment called `name`, or the first one when no name is given.
fn select_experiment(
    experiments: Vec<Experiment>,
    name: Option<&str>,
) -> Result<Experiment, ConfigError> {
    match name {
        Some(name) => experiments
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::UnknownExperiment(name.to_string())),
        None => experiments
            .into_iter()
            .next()
            .ok_or_else(|| ConfigError::UnknownExperiment(String::new())),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare {
            config,
            budgets,
            trials,
            seed,
        } => compare_command(config.as_deref(), &budgets, trials, seed),
        Commands::TrueMse { config } => true_mse_command(config.as_deref()),
        Commands::Run {
            config,
            experiment,
            budget,
            seed,
            policy,
        } => run_command(
            config.as_deref(),
            experiment.as_deref(),
            budget,
            seed,
            policy.into(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn format_rate(r: &SuccessRate) -> String {
    format!("{:.3} ({}/{})", r.rate(), r.successes, r.trials)
}

fn format_row(name: &str, row: &PolicyComparison) -> String {
    format!(
        "{}\t{}\t{:?}\t{}\t{}\t{:+.3}",
        name,
        row.budget,
        row.best_arms,
        format_rate(&row.uniform),
        format_rate(&row.successive_rejects),
        row.rate_difference()
    )
}

fn compare_command(
    config: Option<&Path>,
    budgets: &[u64],
    trials: Option<usize>,
    seed: Option<u64>,
) -> Result<(), ConfigError> {
    let experiments = load_experiments(config)?;

    println!("experiment\tbudget\tbest_arms\tuniform\tsuccessive_rejects\tdifference");
    for exp in &experiments {
        let budgets = exp.budgets(budgets);
        let cfg = exp.config(trials, seed);
        info!(
            "experiment '{}': k={} trials={} seed={} budgets={:?}",
            exp.name,
            exp.model.num_arms(),
            cfg.trials,
            cfg.seed,
            budgets
        );
        for row in budget_sweep(&exp.model, budgets, &cfg)? {
            println!("{}", format_row(&exp.name, &row));
        }
    }
    Ok(())
}

fn true_mse_command(config: Option<&Path>) -> Result<(), ConfigError> {
    for exp in load_experiments(config)? {
        let mse = exp.model.true_mse();
        let cells: Vec<String> = mse.iter().map(|m| format!("{m:.6}")).collect();
        println!(
            "{}\tmse=[{}]\tbest={:?}",
            exp.name,
            cells.join(", "),
            exp.model.best_arms(ExperimentConfig::default().tie_tol)
        );
    }
    Ok(())
}

fn run_command(
    config: Option<&Path>,
    experiment: Option<&str>,
    budget: u64,
    seed: Option<u64>,
    policy: IdentificationPolicy,
) -> Result<(), ConfigError> {
    let exp = select_experiment(load_experiments(config)?, experiment)?;

    let seed = seed.unwrap_or(exp.seed);
    let mut source = GaussianSource::with_seed(exp.model.clone(), seed);
    let truth = source.true_mse();
    let id = policy.identify(&mut source, budget)?;

    println!(
        "experiment={} policy={} budget={} seed={} drawn={}",
        exp.name, id.policy, budget, seed, id.samples_drawn
    );
    for phase in &id.phases {
        let estimates: Vec<String> = phase
            .estimates
            .iter()
            .map(|(arm, m)| format!("{arm}:{m:.4}"))
            .collect();
        println!(
            "phase {}: +{} per pair (n={}) over {} pairs, estimates {{{}}}, eliminated {}",
            phase.phase,
            phase.increment,
            phase.cumulative,
            phase.active_pairs,
            estimates.join(", "),
            phase.eliminated
        );
    }
    println!("arm\testimate\ttrue");
    for (arm, (est, t)) in id.mse.iter().zip(&truth).enumerate() {
        println!("{arm}\t{est:.6}\t{t:.6}");
    }
    let best = exp.model.best_arms(ExperimentConfig::default().tie_tol);
    println!(
        "best_arm={} ({})",
        id.best_arm,
        if id.is_correct(&best) {
            "correct"
        } else {
            "incorrect"
        }
    );
    Ok(())
}
