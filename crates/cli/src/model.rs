//! JSON model files.
//!
//! ```json
//! {
//!   "initial": [0],
//!   "states": [
//!     { "id": 0, "labels": ["start"],
//!       "choices": [ { "label": "a", "transitions": [[1, 0.5], [2, 0.5]] } ] },
//!     { "id": 1, "labels": ["goal"] }
//!   ],
//!   "rewards": {
//!     "cost": { "states": { "0": 1.0 },
//!               "transitions": [ { "state": 0, "label": "a", "value": 0.5 } ] }
//!   }
//! }
//! ```
//!
//! States without choices are deadlocks (they self-loop once explored).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use partex::error::ConfigError;
use partex::explorer::{ExplicitModel, ExplicitRewards};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    pub initial: Vec<usize>,
    #[serde(default)]
    pub states: Vec<StateEntry>,
    #[serde(default)]
    pub rewards: BTreeMap<String, RewardEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateEntry {
    pub id: usize,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceEntry {
    #[serde(default)]
    pub label: Option<String>,
    pub transitions: Vec<(usize, f64)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardEntry {
    #[serde(default)]
    pub states: BTreeMap<usize, f64>,
    #[serde(default)]
    pub transitions: Vec<TransitionReward>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionReward {
    pub state: usize,
    pub label: String,
    pub value: f64,
}

const MASS_TOLERANCE: f64 = 1e-6;

impl ModelFile {
    /// Check probabilities and build the explicit model.
    pub fn into_model(self) -> Result<ExplicitModel, ConfigError> {
        if self.initial.is_empty() {
            return Err(ConfigError::InvalidModel("no initial state".into()));
        }
        let mut model = ExplicitModel::new(self.initial);
        for state in self.states {
            for choice in state.choices {
                if let Some(&(target, p)) = choice.transitions.iter().find(|&&(_, p)| !(p > 0.0 && p <= 1.0)) {
                    return Err(ConfigError::InvalidModel(format!(
                        "state {}: probability {p} to {target} outside (0, 1]",
                        state.id
                    )));
                }
                let mass: f64 = choice.transitions.iter().map(|&(_, p)| p).sum();
                if (mass - 1.0).abs() > MASS_TOLERANCE {
                    return Err(ConfigError::InvalidModel(format!(
                        "state {}: choice {} has mass {mass}",
                        state.id,
                        choice.label.as_deref().unwrap_or("<unlabelled>")
                    )));
                }
                model.add_choice(state.id, choice.label, choice.transitions);
            }
            for label in &state.labels {
                model.add_label(label, [state.id]);
            }
        }
        for (name, rewards) in self.rewards {
            for (state, value) in rewards.states {
                model.set_state_reward(&name, state, value);
            }
            for t in rewards.transitions {
                model.set_transition_reward(&name, t.state, &t.label, t.value);
            }
        }
        Ok(model)
    }
}

pub fn parse(text: &str) -> Result<ExplicitModel> {
    let file: ModelFile = serde_json::from_str(text).context("parsing model JSON")?;
    Ok(file.into_model()?)
}

pub fn load(path: &Path) -> Result<ExplicitModel> {
    let text = fs::read_to_string(path).with_context(|| format!("reading model {}", path.display()))?;
    parse(&text).with_context(|| format!("loading model {}", path.display()))
}

/// Fail fast on a label the model never mentions.
pub fn require_label(model: &ExplicitModel, name: &str) -> Result<(), ConfigError> {
    match model.label_states(name) {
        Some(_) => Ok(()),
        None => Err(ConfigError::MissingLabel(name.to_owned())),
    }
}

pub fn require_rewards(model: &ExplicitModel, name: &str) -> Result<ExplicitRewards, ConfigError> {
    model
        .reward_structure(name)
        .ok_or_else(|| ConfigError::MissingReward(name.to_owned()))
}
