use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::*;
use crate::bounds::{Bounds, Optimization};
use crate::explorer::RewardExplorer;
use crate::model::{Choice, Distribution, StateId};
use crate::quotient::Component;

fn d(pairs: &[(usize, f64)]) -> Distribution {
    Distribution::new(pairs.iter().map(|&(s, p)| (StateId(s), p)))
}

fn component(edges: Vec<(usize, Vec<(usize, f64)>)>) -> Component {
    let states: BTreeSet<StateId> = edges.iter().map(|&(s, _)| StateId(s)).collect();
    let mut choices: BTreeMap<StateId, Vec<Choice>> = BTreeMap::new();
    for (s, targets) in edges {
        choices
            .entry(StateId(s))
            .or_default()
            .push(Choice::unlabelled(d(&targets)));
    }
    Component::new(states, choices)
}

struct FixedRewards(HashMap<StateId, f64>);

impl RewardExplorer for FixedRewards {
    fn reward(&self, state: StateId) -> f64 {
        self.0.get(&state).copied().unwrap_or(0.0)
    }
}

fn rewards(pairs: &[(usize, f64)]) -> FixedRewards {
    FixedRewards(pairs.iter().map(|&(s, r)| (StateId(s), r)).collect())
}

#[test]
fn optimal_prefers_first_maximum() {
    assert_eq!(optimal([3, 1, 3], |x| x as f64), Some(3));
    assert_eq!(optimal([(0, 1.0), (1, 1.0)], |x| x.1), Some((0, 1.0)));
    assert_eq!(optimal(Vec::<usize>::new(), |x| x as f64), None);
}

#[test]
fn goal_is_fixed_at_one_regardless_of_exploration() {
    let goal = StateId(7);
    let values = UnboundedReachValues::new(Optimization::MaxValue, move |s| s == goal);
    assert_eq!(values.bounds(goal), Bounds::one());
    assert_eq!(values.bounds(StateId(0)), Bounds::unknown_reach());
    assert!(values.is_unknown(StateId(0)));
}

#[test]
fn self_loop_is_divided_out_of_the_backup() {
    // s0: 0.5 back to itself, 0.5 to the goal s1.
    let mut values = UnboundedReachValues::new(Optimization::MaxValue, |s| s == StateId(1));
    let dists = vec![d(&[(0, 0.5), (1, 0.5)])];
    let b = values.update(StateId(0), &dists, &[ChoiceRef::Transition(0)], ChoiceRef::Transition(0));
    assert_eq!(b, Bounds::one());
}

#[test]
fn reach_update_selects_componentwise() {
    let mut values = UnboundedReachValues::new(Optimization::MaxValue, |s| s == StateId(1));
    let dists = vec![d(&[(1, 0.3), (2, 0.7)]), d(&[(2, 1.0)])];
    let choices = values.choices(StateId(0), &dists);
    let b = values.update(StateId(0), &dists, &choices, choices[0]);
    assert!(b.equals_up_to(&Bounds::new(0.3, 1.0), 1e-12));
    // Scores rank by upper bound under maximisation.
    assert!(values.score(StateId(0), &dists, choices[0]) >= values.score(StateId(0), &dists, choices[1]));
}

#[test]
fn goal_free_component_collapses_to_zero() {
    let comp = component(vec![(0, vec![(1, 1.0)]), (1, vec![(2, 1.0)]), (2, vec![(0, 1.0)])]);
    for opt in [Optimization::MaxValue, Optimization::MinValue] {
        let mut values = UnboundedReachValues::new(opt, |s| s == StateId(9));
        values.collapse(StateId(0), &[], &comp);
        assert_eq!(values.bounds(StateId(0)), Bounds::zero());
    }
}

#[test]
fn component_with_goal_collapses_to_one() {
    let comp = component(vec![(0, vec![(1, 1.0)]), (1, vec![(0, 1.0)])]);
    let mut values = UnboundedReachValues::new(Optimization::MinValue, |s| s == StateId(1));
    values.collapse(StateId(0), &[d(&[(5, 1.0)])], &comp);
    assert_eq!(values.bounds(StateId(0)), Bounds::one());
}

#[test]
fn bounded_reach_terminal_and_fixed_targets() {
    let target = |s: StateId| match s.0 {
        1 => ReachTarget::Goal,
        2 => ReachTarget::Sink,
        _ => ReachTarget::Unknown,
    };
    let values = BoundedReachValues::new(Optimization::MaxValue, target, StepStorage::Dense, true);
    assert_eq!(values.bounds(StateId(0), 0), Bounds::zero());
    assert_eq!(values.bounds(StateId(1), 0), Bounds::one());
    assert_eq!(values.bounds(StateId(2), 5), Bounds::zero());
    assert_eq!(values.bounds(StateId(0), 3), Bounds::unknown_reach());
}

#[test]
fn bounded_reach_backup_reads_the_previous_horizon() {
    let target = |s: StateId| if s == StateId(1) { ReachTarget::Goal } else { ReachTarget::Unknown };
    let mut values = BoundedReachValues::new(Optimization::MaxValue, target, StepStorage::Dense, true);
    let choices = vec![
        Choice::unlabelled(d(&[(1, 0.5), (3, 0.5)])),
        Choice::unlabelled(d(&[(3, 1.0)])),
    ];
    // With one step left the frontier state 3 cannot reach the goal anymore.
    let b = values.update(StateId(0), 1, &choices, &choices[0]);
    assert_eq!(b, Bounds::exact(0.5));
    // Two steps: state 3 is still unknown at horizon 1.
    let b2 = values.update(StateId(0), 2, &choices, &choices[0]);
    assert!(b2.equals_up_to(&Bounds::new(0.5, 1.0), 1e-12));
    assert!(values.score(StateId(0), 2, &choices[0]) >= values.score(StateId(0), 2, &choices[1]));
}

#[test]
fn unbounded_core_tracks_escape_to_frontier() {
    let mut values = UnboundedCoreValues::new();
    // s0 -> 0.9 explored absorbing s1, 0.1 frontier s2.
    assert!(values.is_unknown(StateId(0)));
    values.collapse(StateId(1), &[], &component(vec![(1, vec![(1, 1.0)])]));
    assert_eq!(values.bounds(StateId(1)), Bounds::zero());
    let dists = vec![d(&[(1, 0.9), (2, 0.1)])];
    let b = values.update(StateId(0), &dists, &[ChoiceRef::Transition(0)], ChoiceRef::Transition(0));
    assert!(b.equals_up_to(&Bounds::new(0.0, 0.1), 1e-12));
    assert_eq!(values.lower_bound(StateId(0)), 0.0);
}

#[test]
fn bounded_core_is_zero_without_steps() {
    let mut values = BoundedCoreValues::new(StepStorage::Compressed { width: 2 });
    assert_eq!(values.bounds(StateId(0), 0), Bounds::zero());
    assert_eq!(values.bounds(StateId(0), 4), Bounds::unknown_reach());
    let choices = vec![Choice::unlabelled(d(&[(0, 0.5), (1, 0.5)]))];
    // One step: both successors are at horizon 0.
    assert_eq!(values.update(StateId(0), 1, &choices, &choices[0]), Bounds::zero());
    // Pure self-loops are skipped.
    let stuck = vec![Choice::unlabelled(d(&[(0, 1.0)]))];
    assert_eq!(values.update(StateId(0), 3, &stuck, &stuck[0]), Bounds::zero());
}

#[test]
fn singleton_mean_payoff_component_is_exact_immediately() {
    let mut values = MeanPayoffValues::new(
        Optimization::MaxValue,
        Bounds::new(0.0, 10.0),
        rewards(&[(0, 5.0)]),
    );
    let comp = component(vec![(0, vec![(0, 1.0)])]);
    values.collapse(StateId(0), &[], &comp);
    let it = values.iterator(StateId(0)).expect("iterator");
    assert_eq!(it.current_bounds(), Bounds::exact(5.0));
    assert_eq!(values.bounds(StateId(0)), Bounds::exact(5.0));
}

#[test]
fn relative_value_iteration_converges_on_periodic_cycle() {
    // Deterministic two-cycle with rewards 1 and 3: gain 2.
    let mut values = MeanPayoffValues::new(
        Optimization::MaxValue,
        Bounds::new(0.0, 5.0),
        rewards(&[(0, 1.0), (1, 3.0)]),
    );
    let comp = component(vec![(0, vec![(1, 1.0)]), (1, vec![(0, 1.0)])]);
    values.collapse(StateId(0), &[], &comp);
    let choices = values.choices(StateId(0), &[]);
    assert_eq!(choices, vec![ChoiceRef::Stay]);
    let mut previous = values.bounds(StateId(0));
    for _ in 0..100 {
        let b = values.update(StateId(0), &[], &choices, ChoiceRef::Stay);
        assert!(previous.contains_eps(&b, 1e-9));
        previous = b;
    }
    assert!(previous.contains_eps(&Bounds::exact(2.0), 1e-9));
    assert!(previous.width() < 1e-6, "width {}", previous.width());
}

#[test]
fn merged_component_salvages_absorbed_bounds() {
    let mut values = MeanPayoffValues::new(
        Optimization::MaxValue,
        Bounds::new(0.0, 5.0),
        rewards(&[(0, 1.0), (1, 3.0), (2, 2.0)]),
    );
    let inner = component(vec![(0, vec![(1, 1.0)]), (1, vec![(0, 1.0)])]);
    let leave = vec![d(&[(2, 1.0)])];
    values.collapse(StateId(0), &leave, &inner);
    for _ in 0..10 {
        values.update(StateId(0), &leave, &[ChoiceRef::Transition(0), ChoiceRef::Stay], ChoiceRef::Stay);
    }
    let before = values.iterator(StateId(0)).unwrap().current_bounds();
    assert!(before.lower() > 0.0);

    let outer = component(vec![(0, vec![(1, 1.0)]), (1, vec![(0, 1.0)]), (1, vec![(2, 1.0)]), (2, vec![(0, 1.0)])]);
    values.collapse(StateId(0), &[], &outer);
    let after = values.iterator(StateId(0)).unwrap();
    assert_eq!(after.size(), 3);
    // The salvaged lower bound survives; refinement only tightens it.
    assert!(after.current_bounds().lower() >= before.lower() - 1e-12);
    assert!(after.current_bounds().contains_eps(&Bounds::exact(2.0), 1e-9));
}
