//! Maximal end-component decomposition of a small sub-MDP.
//!
//! Input is a node set and, per node, its choices as target lists. Choices
//! with a target outside the node set can never be part of an end component
//! and are dropped up front. The decomposition alternates SCC splitting with
//! removal of choices that leave their SCC until nothing changes.

use std::collections::HashMap;

use crate::model::StateId;

/// Maximal end components among `nodes`. Each component is sorted; the list
/// is ordered by smallest member.
pub(crate) fn maximal_end_components(
    nodes: &[StateId],
    choices: &HashMap<StateId, Vec<Vec<StateId>>>,
) -> Vec<Vec<StateId>> {
    let index: HashMap<StateId, usize> = nodes.iter().enumerate().map(|(i, &s)| (s, i)).collect();
    let n = nodes.len();
    // Local choice lists; `None` marks a removed choice.
    let mut local: Vec<Vec<Option<Vec<usize>>>> = nodes
        .iter()
        .map(|s| {
            choices
                .get(s)
                .map(|cs| {
                    cs.iter()
                        .map(|targets| {
                            targets
                                .iter()
                                .map(|t| index.get(t).copied())
                                .collect::<Option<Vec<usize>>>()
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();
    let mut alive = vec![true; n];

    loop {
        let part = strongly_connected(&alive, &local);
        let mut changed = false;
        for v in 0..n {
            if !alive[v] {
                continue;
            }
            for slot in local[v].iter_mut() {
                let leaves = match slot {
                    Some(targets) => targets.iter().any(|&t| !alive[t] || part[t] != part[v]),
                    None => false,
                };
                if leaves {
                    *slot = None;
                    changed = true;
                }
            }
            if local[v].iter().all(Option::is_none) {
                alive[v] = false;
                changed = true;
            }
        }
        if !changed {
            let mut groups: HashMap<usize, Vec<StateId>> = HashMap::new();
            for v in (0..n).filter(|&v| alive[v]) {
                groups.entry(part[v]).or_default().push(nodes[v]);
            }
            let mut result: Vec<Vec<StateId>> = groups
                .into_values()
                .map(|mut g| {
                    g.sort();
                    g
                })
                .collect();
            result.sort();
            return result;
        }
    }
}

/// Iterative Tarjan over alive nodes using the remaining choices as edges.
/// Returns an SCC index per node (`usize::MAX` for dead nodes).
fn strongly_connected(alive: &[bool], local: &[Vec<Option<Vec<usize>>>]) -> Vec<usize> {
    const UNVISITED: usize = usize::MAX;
    let n = alive.len();
    let edges: Vec<Vec<usize>> = (0..n)
        .map(|v| {
            if !alive[v] {
                return Vec::new();
            }
            let mut out: Vec<usize> = local[v]
                .iter()
                .flatten()
                .flatten()
                .copied()
                .filter(|&t| alive[t])
                .collect();
            out.sort_unstable();
            out.dedup();
            out
        })
        .collect();

    let mut order = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut part = vec![UNVISITED; n];
    let mut counter = 0usize;
    let mut parts = 0usize;

    for root in 0..n {
        if !alive[root] || order[root] != UNVISITED {
            continue;
        }
        // (node, next edge position)
        let mut call: Vec<(usize, usize)> = vec![(root, 0)];
        order[root] = counter;
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(&(v, pos)) = call.last() {
            if pos < edges[v].len() {
                let w = edges[v][pos];
                let top = call.len() - 1;
                call[top].1 += 1;
                if order[w] == UNVISITED {
                    order[w] = counter;
                    low[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(order[w]);
                }
                continue;
            }
            call.pop();
            if let Some(&(parent, _)) = call.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if low[v] == order[v] {
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    part[w] = parts;
                    if w == v {
                        break;
                    }
                }
                parts += 1;
            }
        }
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[usize]) -> Vec<StateId> {
        v.iter().map(|&i| StateId(i)).collect()
    }

    fn graph(edges: Vec<(usize, Vec<Vec<usize>>)>) -> HashMap<StateId, Vec<Vec<StateId>>> {
        edges
            .into_iter()
            .map(|(s, cs)| (StateId(s), cs.iter().map(|t| ids(t)).collect()))
            .collect()
    }

    #[test]
    fn two_cycle_is_one_component() {
        let g = graph(vec![(0, vec![vec![1]]), (1, vec![vec![0]])]);
        assert_eq!(maximal_end_components(&ids(&[0, 1]), &g), vec![ids(&[0, 1])]);
    }

    #[test]
    fn leaving_choice_splits_component() {
        // 0 -> {1,2} must leave {0,1}; 1 loops on itself.
        let g = graph(vec![
            (0, vec![vec![1, 2]]),
            (1, vec![vec![1]]),
            (2, vec![vec![0]]),
        ]);
        let nodes = ids(&[0, 1]);
        assert_eq!(maximal_end_components(&nodes, &g), vec![ids(&[1])]);
    }

    #[test]
    fn probabilistic_branch_inside_scc_is_kept() {
        let g = graph(vec![
            (0, vec![vec![1, 2]]),
            (1, vec![vec![0]]),
            (2, vec![vec![0]]),
        ]);
        assert_eq!(
            maximal_end_components(&ids(&[0, 1, 2]), &g),
            vec![ids(&[0, 1, 2])]
        );
    }

    #[test]
    fn transient_state_is_dropped() {
        // 0 -> 1 only; 1 <-> 2.
        let g = graph(vec![
            (0, vec![vec![1]]),
            (1, vec![vec![2]]),
            (2, vec![vec![1]]),
        ]);
        assert_eq!(maximal_end_components(&ids(&[0, 1, 2]), &g), vec![ids(&[1, 2])]);
    }

    #[test]
    fn nested_split_after_choice_removal() {
        // 0 <-> 1 is a cycle; 0's second choice leaks to 3 (outside) and 2 only
        // feeds into the cycle, so just {0, 1} remains.
        let g = graph(vec![
            (0, vec![vec![1], vec![1, 3]]),
            (1, vec![vec![0]]),
            (2, vec![vec![0]]),
        ]);
        assert_eq!(maximal_end_components(&ids(&[0, 1, 2]), &g), vec![ids(&[0, 1])]);
    }
}
