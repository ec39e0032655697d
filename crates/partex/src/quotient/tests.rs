use proptest::prelude::*;

use super::*;
use crate::explorer::{DefaultExplorer, ExplicitModel, Explorer};

fn explored(model: ExplicitModel) -> DefaultExplorer<ExplicitModel> {
    let mut explorer = DefaultExplorer::new(model);
    let initial = explorer.initial_states().to_vec();
    explorer.explore_reachable(&initial);
    explorer
}

fn all_states(explorer: &DefaultExplorer<ExplicitModel>) -> BTreeSet<StateId> {
    explorer.partial_system().explored_states().collect()
}

#[test]
fn fresh_quotient_is_identity() {
    let q = DynamicQuotient::new();
    assert_eq!(q.representative(StateId(5)), StateId(5));
    assert!(!q.is_removed(StateId(5)));
    assert_eq!(q.class_members(StateId(5)), vec![StateId(5)]);
}

#[test]
fn three_cycle_with_exit_collapses_to_smallest_id() {
    // s0 -> s1 -> s2 -> s0 deterministic; s2 additionally exits to t with 0.5.
    let model = ExplicitModel::new([0])
        .choice(0, &[(1, 1.0)])
        .choice(1, &[(2, 1.0)])
        .choice(2, &[(0, 1.0)])
        .choice(2, &[(0, 0.5), (3, 0.5)])
        .label("goal", &[3]);
    let explorer = explored(model);
    let system = explorer.partial_system();
    let t = explorer.lookup(&3).unwrap();

    let mut q = DynamicQuotient::new();
    let found = q.update_components(system, &all_states(&explorer), |s| system.is_explored(s));

    let rep = StateId(0);
    let component = found.get(&rep).expect("cycle component");
    assert_eq!(component.size(), 3);
    for s in [StateId(0), StateId(1), StateId(2)] {
        assert_eq!(q.representative(s), rep);
    }
    // The goal self-loop is reported as its own singleton component.
    assert!(found.contains_key(&t));

    // Only the randomised exit survives, with the internal half inlined.
    let dists = q.distributions(system, StateId(1));
    assert_eq!(dists.len(), 1);
    assert_eq!(dists[0].iter().collect::<Vec<_>>(), vec![(t, 1.0)]);
    // Internal choices are kept on the component.
    assert_eq!(component.choices(StateId(2)).len(), 1);
}

#[test]
fn singletons_are_not_reported_twice() {
    let model = ExplicitModel::new([0]).choice(0, &[(0, 1.0)]);
    let explorer = explored(model);
    let system = explorer.partial_system();
    let mut q = DynamicQuotient::new();
    let recent = all_states(&explorer);
    assert_eq!(q.update_components(system, &recent, |s| system.is_explored(s)).len(), 1);
    assert!(q.update_components(system, &recent, |s| system.is_explored(s)).is_empty());
    assert!(q.distributions(system, StateId(0)).is_empty());
}

#[test]
fn transient_chain_has_no_components() {
    let model = ExplicitModel::new([0])
        .choice(0, &[(1, 0.5), (2, 0.5)])
        .choice(1, &[(2, 1.0)]);
    let mut explorer = DefaultExplorer::new(model);
    explorer.explore_state(StateId(0));
    explorer.explore_state(StateId(1));
    let system = explorer.partial_system();
    let mut q = DynamicQuotient::new();
    let recent: BTreeSet<StateId> = [StateId(0), StateId(1)].into_iter().collect();
    assert!(q
        .update_components(system, &recent, |s| system.is_explored(s))
        .is_empty());
    assert_eq!(q.state_count(system), 3);
}

#[test]
fn components_nest_as_exploration_grows() {
    // {0,1} is an end component; once 2 is explored, {0,1,2} is a larger one.
    let model = ExplicitModel::new([0])
        .choice(0, &[(1, 1.0)])
        .choice(1, &[(0, 1.0)])
        .choice(1, &[(2, 1.0)])
        .choice(2, &[(0, 1.0)])
        .choice(2, &[(3, 1.0)]);
    let mut explorer = DefaultExplorer::new(model);
    explorer.explore_state(StateId(0));
    explorer.explore_state(StateId(1));
    let mut q = DynamicQuotient::new();
    let first: BTreeSet<StateId> = [StateId(0), StateId(1)].into_iter().collect();
    {
        let system = explorer.partial_system();
        let found = q.update_components(system, &first, |s| system.is_explored(s));
        assert_eq!(found.len(), 1);
        assert_eq!(found[&StateId(0)].size(), 2);
    }
    explorer.explore_state(StateId(2));
    let system = explorer.partial_system();
    let second: BTreeSet<StateId> = [StateId(2)].into_iter().collect();
    let found = q.update_components(system, &second, |s| system.is_explored(s));
    assert_eq!(found[&StateId(0)].size(), 3);
    assert_eq!(q.representative(StateId(2)), StateId(0));
    assert_eq!(q.class_members(StateId(1)), vec![StateId(0), StateId(1), StateId(2)]);
    // Leaving choice towards the frontier state 3.
    let dists = q.distributions(system, StateId(0));
    assert_eq!(dists, vec![Distribution::dirac(StateId(3))]);
}

/// Per state, choices given as target sets. Targets at or beyond the last
/// state go to a sink that is never explored; with `forward` every target lies
/// strictly above its source.
fn shaped(shape: &[Vec<BTreeSet<usize>>], forward: bool) -> DefaultExplorer<ExplicitModel> {
    let sink = shape.len();
    let mut model = ExplicitModel::new([0]);
    for (source, choices) in shape.iter().enumerate() {
        for targets in choices {
            let targets: BTreeSet<usize> = targets
                .iter()
                .map(|&t| (if forward { source + 1 + t } else { t }).min(sink))
                .collect();
            let p = 1.0 / targets.len() as f64;
            let transitions: Vec<(usize, f64)> = targets.into_iter().map(|t| (t, p)).collect();
            model = model.choice(source, &transitions);
        }
    }
    let mut explorer = DefaultExplorer::new(model);
    for _ in 0..sink {
        for state in 0..sink {
            if let Some(id) = explorer.lookup(&state) {
                explorer.explore_state(id);
            }
        }
    }
    explorer
}

fn shape_strategy() -> impl Strategy<Value = Vec<Vec<BTreeSet<usize>>>> {
    proptest::collection::vec(
        proptest::collection::vec(proptest::collection::btree_set(0usize..12, 1..4), 1..3),
        1..10,
    )
}

proptest! {
    #[test]
    fn acyclic_systems_have_no_components(shape in shape_strategy()) {
        let explorer = shaped(&shape, true);
        let system = explorer.partial_system();
        let mut q = DynamicQuotient::new();
        let found = q.update_components(system, &all_states(&explorer), |s| system.is_explored(s));
        prop_assert!(found.is_empty());
        for s in all_states(&explorer) {
            prop_assert_eq!(q.representative(s), s);
        }
    }

    #[test]
    fn repeated_detection_changes_nothing(shape in shape_strategy()) {
        let explorer = shaped(&shape, false);
        let system = explorer.partial_system();
        let recent = all_states(&explorer);
        let mut q = DynamicQuotient::new();
        q.update_components(system, &recent, |s| system.is_explored(s));
        let classes: Vec<Vec<StateId>> = recent.iter().map(|&s| q.class_members(s)).collect();
        let count = q.state_count(system);

        prop_assert!(q.update_components(system, &BTreeSet::new(), |s| system.is_explored(s)).is_empty());
        prop_assert!(q.update_components(system, &recent, |s| system.is_explored(s)).is_empty());
        let again: Vec<Vec<StateId>> = recent.iter().map(|&s| q.class_members(s)).collect();
        prop_assert_eq!(classes, again);
        prop_assert_eq!(q.state_count(system), count);
    }
}
