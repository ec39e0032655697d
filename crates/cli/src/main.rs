use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use partex::analyser::Progress;
use partex::error::ConfigError;
use partex::explorer::StateTable;
use partex::prelude::*;
use partex::validate::check_core_property;
use partex::values::ReachTarget;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod model;
mod provenance;
mod report;

use report::{Outcome, Validation};

#[derive(Parser)]
#[command(name = "partex-cli")]
#[command(about = "Partial exploration of Markov decision processes")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Probability to reach a labelled set of states
    Reach {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        args: ReachArgs,
    },
    /// Find an explored part that the system leaves with probability at most ε
    Core {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        args: CoreArgs,
    },
    /// Long-run average reward
    MeanPayoff {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        args: MeanPayoffArgs,
    },
}

#[derive(Args, Debug, Serialize)]
struct Common {
    /// Model file (JSON)
    #[arg(long)]
    model: PathBuf,
    /// Target width of the bounds (ε for `core`)
    #[arg(long, default_value_t = 1e-6)]
    precision: f64,
    /// Measure the width relative to the magnitude of the value
    #[arg(long)]
    relative: bool,
    /// Also write the result to this file, with a provenance sidecar
    #[arg(long)]
    out: Option<PathBuf>,
    /// Stop after this many rounds and report the bounds reached so far
    #[arg(long)]
    round_limit: Option<u64>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args, Debug, Serialize)]
struct ReachArgs {
    #[arg(long, default_value = "goal")]
    goal: String,
    /// States that must not be passed on the way to the goal
    #[arg(long)]
    avoid: Option<String>,
    /// Reach within this many steps
    #[arg(long)]
    bound: Option<usize>,
    #[arg(long, value_enum, default_value_t = Opt::Max)]
    optimization: Opt,
    /// Decide `value <comparison> threshold` instead of estimating the value
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long, value_enum, default_value_t = Cmp::Ge)]
    comparison: Cmp,
    /// Explore everything and sweep the whole system every round
    #[arg(long)]
    global: bool,
}

#[derive(Args, Debug, Serialize)]
struct CoreArgs {
    /// Certify the unbounded property (default unless `--bounded` is given)
    #[arg(long, conflicts_with = "bounded")]
    unbounded: bool,
    /// Certify the property for this many steps
    #[arg(long)]
    bounded: Option<usize>,
    /// Step storage for `--bounded`: `dense` or `simple,<width>`
    #[arg(long, default_value = "dense")]
    storage: String,
    /// Re-solve the extracted core and check it
    #[arg(long)]
    validate: bool,
}

#[derive(Args, Debug, Serialize)]
struct MeanPayoffArgs {
    /// Name of the reward structure
    #[arg(long)]
    rewards: String,
    /// Lower bound on the reward per step (derived from the model if omitted)
    #[arg(long)]
    reward_min: Option<f64>,
    #[arg(long)]
    reward_max: Option<f64>,
    #[arg(long, value_enum, default_value_t = Opt::Max)]
    optimization: Opt,
    #[arg(long)]
    global: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Opt {
    Max,
    Min,
}

impl From<Opt> for Optimization {
    fn from(opt: Opt) -> Self {
        match opt {
            Opt::Max => Optimization::MaxValue,
            Opt::Min => Optimization::MinValue,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Cmp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl From<Cmp> for Comparison {
    fn from(cmp: Cmp) -> Self {
        match cmp {
            Cmp::Gt => Comparison::Greater,
            Cmp::Ge => Comparison::GreaterOrEqual,
            Cmp::Lt => Comparison::Less,
            Cmp::Le => Comparison::LessOrEqual,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let cmd = Cmd::parse();
    let (common, outcome, params) = match cmd.action {
        Action::Reach { common, args } => {
            let outcome = reach(&common, &args)?;
            (common, outcome, serde_json::to_value(&args)?)
        }
        Action::Core { common, args } => {
            let outcome = core(&common, &args)?;
            (common, outcome, serde_json::to_value(&args)?)
        }
        Action::MeanPayoff { common, args } => {
            let outcome = mean_payoff(&common, &args)?;
            (common, outcome, serde_json::to_value(&args)?)
        }
    };
    let text = serde_json::to_string_pretty(&outcome)?;
    println!("{text}");
    if let Some(out) = &common.out {
        write_output(out, &text)?;
        let payload = provenance::Payload::new(
            outcome.command,
            json!({ "common": serde_json::to_value(&common)?, "command": params }),
        )
        .with_input(&common.model);
        let sidecar = provenance::write_sidecar(out, payload)?;
        tracing::info!(out = %out.display(), sidecar = %sidecar.display(), "wrote result");
    }
    Ok(())
}

fn write_output(out: &Path, text: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(out, text).with_context(|| format!("writing {}", out.display()))
}

fn verdict(common: &Common, threshold: Option<f64>, comparison: Cmp) -> Result<Box<dyn Verdict>, ConfigError> {
    if let Some(threshold) = threshold {
        return Ok(Box::new(QualitativeVerdict::new(comparison.into(), threshold)));
    }
    if !common.precision.is_finite() || common.precision <= 0.0 {
        return Err(ConfigError::InvalidPrecision(common.precision));
    }
    Ok(Box::new(QuantitativeVerdict::new(common.precision, common.relative)))
}

/// Logs the bounds of the initial states at most every 5 seconds.
fn progress_logger() -> impl FnMut(&Progress) + 'static {
    let period = Duration::from_secs(5);
    let mut last = Instant::now();
    move |progress: &Progress| {
        if last.elapsed() < period {
            return;
        }
        last = Instant::now();
        for (state, bounds) in &progress.initial_bounds {
            tracing::info!(
                rounds = progress.rounds,
                explored = progress.explored_states,
                state = state.index(),
                %bounds,
                "progress"
            );
        }
    }
}

fn finish(command: &'static str, mut analyser: Box<dyn Analyser>, table: &StateTable<usize>) -> Outcome {
    let started = Instant::now();
    let completed = analyser.run();
    let stats = analyser.statistics();
    tracing::info!(command, completed, elapsed = ?started.elapsed(), "{stats}");
    Outcome::collect(command, analyser.as_ref(), table)
}

fn label_set(model: &ExplicitModel, name: &str) -> Result<BTreeSet<usize>, ConfigError> {
    model::require_label(model, name)?;
    Ok(model.label_states(name).cloned().unwrap_or_default())
}

fn reach(common: &Common, args: &ReachArgs) -> Result<Outcome> {
    let model = model::load(&common.model)?;
    let goal = label_set(&model, &args.goal)?;
    let avoid = match &args.avoid {
        Some(name) => label_set(&model, name)?,
        None => BTreeSet::new(),
    };
    if let Some(state) = goal.intersection(&avoid).next() {
        bail!("state {state} is labelled both `{}` and avoided", args.goal);
    }
    let verdict = verdict(common, args.threshold, args.comparison)?;
    let optimization = Optimization::from(args.optimization);

    // Goal and avoided states absorb: nothing behind them matters.
    let stop: BTreeSet<usize> = goal.union(&avoid).copied().collect();
    let explorer = DefaultExplorer::new(SafetyGenerator::new(model, move |s: &usize| !stop.contains(s)));
    let table = explorer.state_table();
    let is_goal = explorer.state_predicate(move |s: &usize| goal.contains(s));

    let analyser: Box<dyn Analyser> = match args.bound {
        Some(steps) => {
            let is_avoided = explorer.state_predicate(move |s: &usize| avoid.contains(s));
            let target = move |s: StateId| {
                if is_goal(s) {
                    ReachTarget::Goal
                } else if is_avoided(s) {
                    ReachTarget::Sink
                } else {
                    ReachTarget::Unknown
                }
            };
            let values = BoundedReachValues::new(optimization, target, StepStorage::Dense, true);
            let cfg = PrefixCfg {
                round_limit: common.round_limit,
                seed: common.seed,
                ..PrefixCfg::default()
            };
            Box::new(
                PrefixAnalyser::sampler(explorer, values, verdict, steps, cfg).with_observer(progress_logger()),
            )
        }
        None => {
            let values = UnboundedReachValues::new(optimization, is_goal);
            let collapse = CollapseCfg {
                round_limit: common.round_limit,
                ..CollapseCfg::default()
            };
            if args.global {
                Box::new(
                    CollapsingAnalyser::global(explorer, values, verdict)
                        .with_cfg(collapse)
                        .with_observer(progress_logger()),
                )
            } else {
                let sampler = SamplerCfg {
                    seed: common.seed,
                    ..SamplerCfg::default()
                };
                Box::new(
                    CollapsingAnalyser::sampler(explorer, values, verdict, sampler)
                        .with_cfg(collapse)
                        .with_observer(progress_logger()),
                )
            }
        }
    };
    Ok(finish("reach", analyser, &table))
}

fn core(common: &Common, args: &CoreArgs) -> Result<Outcome> {
    let model = model::load(&common.model)?;
    let verdict = verdict(common, None, Cmp::Le)?;
    let epsilon = common.precision;
    let explorer = DefaultExplorer::new(model);
    let table = explorer.state_table();

    let (mut analyser, bound): (Box<dyn Analyser>, Option<usize>) = match args.bounded {
        Some(steps) if !args.unbounded => {
            let storage: StepStorage = args.storage.parse()?;
            let cfg = PrefixCfg {
                round_limit: common.round_limit,
                seed: common.seed,
                ..PrefixCfg::default()
            };
            // Core values are 0 with no step left, so a `steps`-step core
            // needs one more step of lookahead.
            let horizon = steps + 1;
            let analyser = PrefixAnalyser::sampler(explorer, BoundedCoreValues::new(storage), verdict, horizon, cfg)
                .with_observer(progress_logger());
            (Box::new(analyser), Some(steps))
        }
        _ => {
            let sampler = SamplerCfg {
                seed: common.seed,
                ..SamplerCfg::default()
            };
            let analyser = CollapsingAnalyser::sampler(explorer, UnboundedCoreValues::new(), verdict, sampler)
                .with_cfg(CollapseCfg {
                    round_limit: common.round_limit,
                    ..CollapseCfg::default()
                })
                .with_observer(progress_logger());
            (Box::new(analyser), None)
        }
    };
    analyser.run();
    let mut outcome = Outcome::collect("core", analyser.as_ref(), &table);
    tracing::info!(solved = outcome.solved, "{}", outcome.summary);

    let system = analyser.model();
    tracing::info!(states = system.explored_count(), "extracted core");
    if args.validate {
        let frontier_probability =
            check_core_property(&system, epsilon, bound).context("validating the extracted core")?;
        outcome.validation = Some(Validation {
            epsilon,
            frontier_probability,
        });
    }
    Ok(outcome)
}

fn mean_payoff(common: &Common, args: &MeanPayoffArgs) -> Result<Outcome> {
    let model = model::load(&common.model)?;
    let rewards = model::require_rewards(&model, &args.rewards)?;
    let (derived_min, derived_max) = rewards.range(model.state_count());
    let min = args.reward_min.unwrap_or(derived_min);
    let max = args.reward_max.unwrap_or(derived_max);
    if min.is_nan() || max.is_nan() || min > max {
        bail!("reward range [{min}, {max}] is empty");
    }
    let verdict = verdict(common, None, Cmp::Ge)?;
    let optimization = Optimization::from(args.optimization);

    let explorer = DefaultExplorer::new(model);
    let table = explorer.state_table();
    let values = MeanPayoffValues::new(optimization, Bounds::new(min, max), explorer.rewards(rewards));
    let collapse = CollapseCfg {
        round_limit: common.round_limit,
        ..CollapseCfg::default()
    };
    let analyser: Box<dyn Analyser> = if args.global {
        Box::new(
            CollapsingAnalyser::global(explorer, values, verdict)
                .with_cfg(collapse)
                .with_observer(progress_logger()),
        )
    } else {
        let sampler = SamplerCfg {
            seed: common.seed,
            ..SamplerCfg::default()
        };
        Box::new(
            CollapsingAnalyser::sampler(explorer, values, verdict, sampler)
                .with_cfg(collapse)
                .with_observer(progress_logger()),
        )
    };
    Ok(finish("mean-payoff", analyser, &table))
}
