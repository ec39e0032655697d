use super::*;
use crate::bounds::Bounds;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn d(pairs: &[(usize, f64)]) -> Distribution {
    Distribution::new(pairs.iter().map(|&(s, p)| (StateId(s), p)))
}

#[test]
fn construction_merges_duplicates_and_sorts() {
    let dist = d(&[(3, 0.25), (1, 0.5), (3, 0.25), (2, 0.0)]);
    let pairs: Vec<_> = dist.iter().collect();
    assert_eq!(pairs, vec![(StateId(1), 0.5), (StateId(3), 0.5)]);
    assert!(!dist.contains(StateId(2)));
    assert!((dist.total() - 1.0).abs() < 1e-15);
}

#[test]
fn jacobi_sum_divides_out_self_loop() {
    let dist = d(&[(0, 0.5), (1, 0.25), (2, 0.25)]);
    let v = dist
        .sum_weighted_except_jacobi(|s| if s == StateId(1) { 1.0 } else { 0.0 }, StateId(0))
        .unwrap();
    assert!((v - 0.5).abs() < 1e-12);
    let b = dist
        .sum_weighted_except_jacobi_bounds(|_| Bounds::new(0.2, 0.6), StateId(0))
        .unwrap();
    assert!(b.equals_up_to(&Bounds::new(0.2, 0.6), 1e-12));
}

#[test]
fn jacobi_sum_on_pure_self_loop_is_none() {
    let dist = Distribution::dirac(StateId(4));
    assert!(dist.is_only_successor(StateId(4)));
    assert_eq!(dist.sum_weighted_except_jacobi(|_| 1.0, StateId(4)), None);
    assert_eq!(dist.without_self_loop(StateId(4)), None);
}

#[test]
fn without_self_loop_rescales_remaining_mass() {
    let dist = d(&[(0, 0.5), (1, 0.5)]);
    let rest = dist.without_self_loop(StateId(0)).unwrap();
    assert_eq!(rest.iter().collect::<Vec<_>>(), vec![(StateId(1), 1.0)]);
}

#[test]
fn sampling_respects_zero_weights_and_exclusions() {
    let mut rng = StdRng::seed_from_u64(7);
    let dist = d(&[(0, 0.5), (1, 0.3), (2, 0.2)]);
    for _ in 0..50 {
        let s = dist
            .sample_weighted(&mut rng, |s, p| if s == StateId(1) { 0.0 } else { p })
            .unwrap();
        assert_ne!(s, StateId(1));
        let t = dist
            .sample_weighted_except(&mut rng, |_, p| p, |s| s != StateId(2))
            .unwrap();
        assert_eq!(t, StateId(2));
    }
    assert_eq!(dist.sample_weighted(&mut rng, |_, _| 0.0), None);
}

#[test]
fn sampling_frequencies_follow_weights() {
    let mut rng = StdRng::seed_from_u64(11);
    let dist = d(&[(0, 0.75), (1, 0.25)]);
    let hits = (0..4000)
        .filter(|_| dist.sample_weighted(&mut rng, |_, p| p) == Some(StateId(0)))
        .count();
    let freq = hits as f64 / 4000.0;
    assert!((freq - 0.75).abs() < 0.05, "freq={freq}");
}

#[test]
fn transition_system_tracks_frontier() {
    let mut sys = TransitionSystem::new();
    let a = sys.add_state();
    let b = sys.add_state();
    sys.add_initial(a);
    assert!(!sys.is_explored(a));
    sys.set_choices(a, vec![Choice::unlabelled(Distribution::dirac(b))]);
    assert!(sys.is_explored(a));
    assert_eq!(sys.explored_count(), 1);
    assert_eq!(sys.explored_states().collect::<Vec<_>>(), vec![a]);
    assert!(sys.choices(b).is_empty());
    assert!(sys.is_deterministic());

    let snapshot = PartialSystem::full(&sys);
    assert!(snapshot.is_explored(a));
    assert!(!snapshot.is_explored(b));
    assert_eq!(snapshot.initial_states(), &[a]);
}

#[test]
#[should_panic]
fn exploring_twice_panics() {
    let mut sys = TransitionSystem::new();
    let a = sys.add_state();
    sys.set_choices(a, vec![]);
    sys.set_choices(a, vec![]);
}
