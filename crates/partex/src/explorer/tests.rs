use super::*;
use crate::model::Distribution;

fn diamond() -> ExplicitModel {
    ExplicitModel::new([0])
        .labelled_choice(0, Some("a"), &[(1, 0.5), (2, 0.5)])
        .labelled_choice(0, Some("b"), &[(2, 1.0)])
        .choice(1, &[(3, 1.0)])
        .choice(2, &[(3, 1.0)])
        .label("goal", &[3])
        .state_reward("r", 1, 2.0)
        .transition_reward("r", 0, "a", 0.5)
}

#[test]
fn ids_follow_discovery_order() {
    let mut explorer = DefaultExplorer::new(diamond());
    assert_eq!(explorer.initial_states(), &[StateId(0)]);
    assert_eq!(explorer.partial_system().state_count(), 1);
    explorer.explore_state(StateId(0));
    assert_eq!(explorer.lookup(&1), Some(StateId(1)));
    assert_eq!(explorer.lookup(&2), Some(StateId(2)));
    assert_eq!(explorer.lookup(&3), None);
    let choices = explorer.choices(StateId(0));
    assert_eq!(choices.len(), 2);
    assert_eq!(choices[0].label(), Some("a"));
    assert_eq!(choices[1].distribution, Distribution::dirac(StateId(2)));
}

#[test]
fn explore_reachable_reaches_everything() {
    let mut explorer = DefaultExplorer::new(diamond());
    explorer.explore_reachable(&[StateId(0)]);
    assert_eq!(explorer.explored_count(), 4);
    assert_eq!(explorer.snapshot().explored_count(), 4);
}

#[test]
fn deadlocks_become_self_loops() {
    let mut explorer = DefaultExplorer::new(diamond());
    explorer.explore_reachable(&[StateId(0)]);
    let goal = explorer.lookup(&3).unwrap();
    let choices = explorer.choices(goal);
    assert_eq!(choices.len(), 1);
    assert!(choices[0].distribution.is_only_successor(goal));
}

#[test]
fn predicates_and_rewards_resolve_through_the_table() {
    let model = diamond();
    let rewards = model.reward_structure("r").unwrap();
    let labels = model.clone();
    let mut explorer = DefaultExplorer::new(model);
    let goal = explorer.state_predicate(move |s| labels.has_label("goal", *s));
    let rewards = explorer.rewards(rewards);
    // Predicate sees states interned after it was built.
    explorer.explore_reachable(&[StateId(0)]);
    let three = explorer.lookup(&3).unwrap();
    assert!(goal(three));
    assert!(!goal(StateId(0)));
    assert_eq!(rewards.reward(explorer.lookup(&1).unwrap()), 2.0);
    let a = &explorer.choices(StateId(0))[0];
    assert_eq!(rewards.transition_reward(StateId(0), a), 0.5);
}

#[test]
fn safety_generator_cuts_exploration_at_unsafe_states() {
    let safe = SafetyGenerator::new(diamond(), |s: &usize| *s != 1);
    let mut explorer = DefaultExplorer::new(safe);
    explorer.explore_reachable(&[StateId(0)]);
    let one = explorer.lookup(&1).unwrap();
    assert!(explorer.choices(one)[0].distribution.is_only_successor(one));
    assert_eq!(explorer.explored_count(), 4);
}

#[test]
fn reward_range_covers_state_and_transition_rewards() {
    let model = diamond();
    let rewards = model.reward_structure("r").unwrap();
    assert_eq!(model.state_count(), 4);
    assert_eq!(rewards.range(model.state_count()), (0.0, 2.5));
}
