//! Cognitive map: learned transition predictions and path planning over
//! them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::parameters::RunParameters;

/// `z[(e, b, e')]`: predicted probability that responding `b` to `e` is
/// followed by `e'`.
#[derive(Debug, Clone, PartialEq)]
pub struct CognitiveMap {
    elements: usize,
    behaviors: usize,
    z: Vec<f64>,
    seen: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Visit {
    cost: f64,
    node: usize,
}

impl Eq for Visit {}

impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        // 小さいコストを先に取り出す
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl CognitiveMap {
    pub fn new(elements: usize, behaviors: usize) -> Self {
        Self {
            elements,
            behaviors,
            z: vec![0.0; elements * behaviors * elements],
            seen: vec![false; elements],
        }
    }

    fn index(&self, from: usize, behavior: usize, to: usize) -> usize {
        (from * self.behaviors + behavior) * self.elements + to
    }

    pub fn z(&self, from: usize, behavior: usize, to: usize) -> f64 {
        self.z.get(self.index(from, behavior, to)).copied().unwrap_or(0.0)
    }

    pub fn mark_seen(&mut self, elements: &[(usize, f64)]) {
        for (e, _) in elements {
            if let Some(seen) = self.seen.get_mut(*e) {
                *seen = true;
            }
        }
    }

    /// Delta rule towards the observed successor elements.
    pub fn learn(
        &mut self,
        previous: &[usize],
        behavior: usize,
        observed: &[usize],
        alpha_w: &[f64],
    ) {
        for &from in previous {
            let alpha = alpha_w.get(from).copied().unwrap_or(0.0);
            for to in 0..self.elements {
                let target = if observed.contains(&to) { 1.0 } else { 0.0 };
                let i = self.index(from, behavior, to);
                if let Some(z) = self.z.get_mut(i) {
                    *z += alpha * (target - *z);
                }
            }
        }
    }

    /// First behavior of the most probable path from the presented elements
    /// to the seen element of highest `u`, when that element is worth more
    /// than anything presented now.
    pub fn plan(&self, params: &RunParameters, present: &[usize]) -> Option<usize> {
        let current_best = present
            .iter()
            .map(|e| params.u[*e])
            .fold(f64::NEG_INFINITY, f64::max);
        let target = (0..self.elements)
            .filter(|e| self.seen[*e] && params.u[*e] > current_best)
            .max_by(|a, b| params.u[*a].total_cmp(&params.u[*b]))?;

        let mut dist = vec![f64::INFINITY; self.elements];
        let mut first: Vec<Option<usize>> = vec![None; self.elements];
        let mut heap = BinaryHeap::new();
        for &source in present {
            dist[source] = 0.0;
            heap.push(Visit {
                cost: 0.0,
                node: source,
            });
        }

        while let Some(Visit { cost, node }) = heap.pop() {
            if node == target {
                trace!("planned path to {} with cost {}", target, cost);
                return first[node];
            }
            if cost > dist[node] {
                continue;
            }
            for behavior in 0..self.behaviors {
                if !params.is_feasible(behavior, &[node]) {
                    continue;
                }
                for next in (0..self.elements).filter(|n| self.seen[*n]) {
                    let z = self.z(node, behavior, next);
                    if z <= 0.0 {
                        continue;
                    }
                    let candidate = cost - z.ln();
                    if candidate < dist[next] {
                        dist[next] = candidate;
                        first[next] = first[node].or(Some(behavior));
                        heap.push(Visit {
                            cost: candidate,
                            node: next,
                        });
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::tests::run_parameters;

    #[test]
    fn test_learn_moves_towards_observation() {
        let mut map = CognitiveMap::new(2, 2);
        map.learn(&[0], 1, &[1], &[0.5, 0.5]);
        assert_eq!(map.z(0, 1, 1), 0.5);
        assert_eq!(map.z(0, 1, 0), 0.0);
        map.learn(&[0], 1, &[1], &[0.5, 0.5]);
        assert_eq!(map.z(0, 1, 1), 0.75);
    }

    #[test]
    fn test_plan_picks_behavior_leading_to_reward() {
        let params = run_parameters(&[("mechanism", "cm"), ("u", "s2:10, default:0")]);
        let mut map = CognitiveMap::new(2, 2);
        map.mark_seen(&[(0, 1.0), (1, 1.0)]);
        assert_eq!(map.plan(&params, &[0]), None);
        map.learn(&[0], 1, &[1], &[1.0, 1.0]);
        assert_eq!(map.plan(&params, &[0]), Some(1));
        assert_eq!(map.plan(&params, &[1]), None);
    }
}
