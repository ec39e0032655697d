//! JSON result of one analysis run.

use partex::analyser::{Analyser, Statistics};
use partex::explorer::StateTable;
use partex::verdict::Resolution;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Outcome {
    pub command: &'static str,
    pub solved: bool,
    pub initial: Vec<InitialResult>,
    pub statistics: StatisticsReport,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

#[derive(Debug, Serialize)]
pub struct InitialResult {
    /// Id in the model file.
    pub state: usize,
    pub lower: f64,
    pub upper: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsReport {
    pub explored_states: usize,
    pub quotient_states: usize,
    pub rounds: u64,
    pub component_searches: u64,
    pub successful_component_searches: u64,
    pub backtracks: u64,
    pub backtracks_to_initial: u64,
}

impl From<&Statistics> for StatisticsReport {
    fn from(stats: &Statistics) -> Self {
        Self {
            explored_states: stats.explored_states,
            quotient_states: stats.quotient_states,
            rounds: stats.rounds,
            component_searches: stats.component_searches,
            successful_component_searches: stats.successful_component_searches,
            backtracks: stats.backtracks,
            backtracks_to_initial: stats.backtracks_to_initial,
        }
    }
}

/// Result of re-solving the extracted core.
#[derive(Debug, Serialize)]
pub struct Validation {
    pub epsilon: f64,
    pub frontier_probability: f64,
}

impl Outcome {
    pub fn collect(command: &'static str, analyser: &dyn Analyser, table: &StateTable<usize>) -> Self {
        let initial = analyser
            .initial_states()
            .into_iter()
            .map(|id| {
                let bounds = analyser.bounds(id);
                let (decided, estimate) = match analyser.resolve(id) {
                    Some(Resolution::Decided(b)) => (Some(b), None),
                    Some(Resolution::Estimate(v)) => (None, Some(v)),
                    None => (None, None),
                };
                InitialResult {
                    state: table.get(id).unwrap_or(id.index()),
                    lower: bounds.lower(),
                    upper: bounds.upper(),
                    decided,
                    estimate,
                }
            })
            .collect();
        let stats = analyser.statistics();
        Self {
            command,
            solved: analyser.is_solved(),
            initial,
            statistics: StatisticsReport::from(&stats),
            summary: stats.to_string(),
            validation: None,
        }
    }
}
