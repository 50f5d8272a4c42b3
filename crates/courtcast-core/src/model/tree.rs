// Regression tree grown level by level with the second-order split gain.
//
// Gain of a split with gradient/hessian sums (G_L, H_L) and (G_R, H_R):
//   0.5 * (G_L^2 / (H_L + lambda) + G_R^2 / (H_R + lambda) - G^2 / (H + lambda))
// Leaf weight: -G / (H + lambda), scaled by the learning rate.
//
// Missing (NaN) values follow a per-split default direction picked by gain.

use serde::{Deserialize, Serialize};

use super::BoostParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        gain: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

/// Per-feature row order by ascending value, NaN rows excluded. Built once
/// per training set and shared by every tree.
pub struct Presorted {
    order: Vec<Vec<usize>>,
}

impl Presorted {
    pub fn new(values: &[Vec<f64>], n_features: usize) -> Self {
        let order = (0..n_features)
            .map(|f| {
                let mut rows: Vec<usize> =
                    (0..values.len()).filter(|&r| !values[r][f].is_nan()).collect();
                rows.sort_by(|&a, &b| values[a][f].total_cmp(&values[b][f]));
                rows
            })
            .collect();
        Self { order }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    g: f64,
    h: f64,
}

impl Sums {
    fn add(&mut self, g: f64, h: f64) {
        self.g += g;
        self.h += h;
    }

    fn minus(self, other: Sums) -> Sums {
        Sums {
            g: self.g - other.g,
            h: self.h - other.h,
        }
    }

    fn score(self, lambda: f64) -> f64 {
        self.g * self.g / (self.h + lambda)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    default_left: bool,
    gain: f64,
}

impl Tree {
    /// Grow one tree on the gradients of the current ensemble.
    pub fn grow(
        values: &[Vec<f64>],
        presorted: &Presorted,
        grad: &[f64],
        hess: &[f64],
        params: &BoostParams,
    ) -> Self {
        let n = values.len();
        let mut nodes = vec![Node::Leaf { weight: 0.0 }];
        // Frontier node each row currently sits in; None once its leaf is final.
        let mut position: Vec<Option<usize>> = vec![Some(0); n];
        let mut frontier = vec![0usize];

        for depth in 0..=params.max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut slot_of = vec![None; nodes.len()];
            for (slot, &node) in frontier.iter().enumerate() {
                slot_of[node] = Some(slot);
            }
            let slot = |r: usize| position[r].and_then(|node| slot_of[node]);

            let mut totals = vec![Sums::default(); frontier.len()];
            for r in 0..n {
                if let Some(s) = slot(r) {
                    totals[s].add(grad[r], hess[r]);
                }
            }

            let mut best: Vec<Option<Candidate>> = vec![None; frontier.len()];
            if depth < params.max_depth {
                for (feature, sorted) in presorted.order.iter().enumerate() {
                    let mut present = vec![Sums::default(); frontier.len()];
                    for &r in sorted {
                        if let Some(s) = slot(r) {
                            present[s].add(grad[r], hess[r]);
                        }
                    }

                    let mut left = vec![Sums::default(); frontier.len()];
                    let mut last: Vec<Option<f64>> = vec![None; frontier.len()];
                    for &r in sorted {
                        let Some(s) = slot(r) else {
                            continue;
                        };
                        let v = values[r][feature];
                        if let Some(prev) = last[s] {
                            if v > prev {
                                let missing = totals[s].minus(present[s]);
                                let threshold = midpoint(prev, v);
                                consider(
                                    &mut best[s],
                                    feature,
                                    threshold,
                                    left[s],
                                    missing,
                                    totals[s],
                                    params,
                                );
                            }
                        }
                        left[s].add(grad[r], hess[r]);
                        last[s] = Some(v);
                    }
                }
            }

            let mut next = Vec::new();
            for (s, &node) in frontier.iter().enumerate() {
                match best[s] {
                    Some(c) => {
                        let l = nodes.len();
                        nodes.push(Node::Leaf { weight: 0.0 });
                        nodes.push(Node::Leaf { weight: 0.0 });
                        nodes[node] = Node::Split {
                            feature: c.feature,
                            threshold: c.threshold,
                            default_left: c.default_left,
                            gain: c.gain,
                            left: l,
                            right: l + 1,
                        };
                        next.push(l);
                        next.push(l + 1);
                    }
                    None => {
                        nodes[node] = Node::Leaf {
                            weight: -params.learning_rate * totals[s].g
                                / (totals[s].h + params.lambda),
                        };
                    }
                }
            }

            for r in 0..n {
                let Some(node) = position[r] else {
                    continue;
                };
                position[r] = match &nodes[node] {
                    Node::Leaf { .. } => None,
                    split => Some(route(split, &values[r])),
                };
            }
            frontier = next;
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { weight } => return *weight,
                split => i = route(split, row),
            }
        }
    }

    /// (feature, gain) for every split in the tree.
    pub fn split_gains(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            Node::Split { feature, gain, .. } => Some((*feature, *gain)),
            Node::Leaf { .. } => None,
        })
    }

    /// Structural check for a deserialized tree: children in range and
    /// pointing forward, features within `n_features`.
    pub fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {i} splits on unknown feature {feature}"));
                }
                for child in [*left, *right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("node {i} has invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn route(split: &Node, row: &[f64]) -> usize {
    match split {
        Node::Split {
            feature,
            threshold,
            default_left,
            left,
            right,
            ..
        } => {
            let v = row[*feature];
            let go_left = if v.is_nan() {
                *default_left
            } else {
                v < *threshold
            };
            if go_left {
                *left
            } else {
                *right
            }
        }
        Node::Leaf { .. } => unreachable!("route called on a leaf"),
    }
}

/// Split point strictly above `lo` so that `lo` routes left and `hi` right.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid > lo {
        mid
    } else {
        hi
    }
}

fn consider(
    best: &mut Option<Candidate>,
    feature: usize,
    threshold: f64,
    present_left: Sums,
    missing: Sums,
    total: Sums,
    params: &BoostParams,
) {
    let parent = total.score(params.lambda);
    let directions: &[bool] = if missing.h > 0.0 {
        &[false, true]
    } else {
        &[false]
    };
    for &default_left in directions {
        let mut left = present_left;
        if default_left {
            left.add(missing.g, missing.h);
        }
        let right = total.minus(left);
        if left.h < params.min_child_weight || right.h < params.min_child_weight {
            continue;
        }
        let gain = 0.5 * (left.score(params.lambda) + right.score(params.lambda) - parent);
        if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
            *best = Some(Candidate {
                feature,
                threshold,
                default_left,
                gain,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_depth: usize) -> BoostParams {
        BoostParams {
            n_estimators: 1,
            max_depth,
            learning_rate: 1.0,
            lambda: 0.0,
            min_child_weight: 1.0,
        }
    }

    fn grow(values: &[Vec<f64>], y: &[f64], p: &BoostParams) -> Tree {
        let presorted = Presorted::new(values, values[0].len());
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        Tree::grow(values, &presorted, &grad, &hess, p)
    }

    #[test]
    fn single_split_separates_step() {
        let values: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64, 1.0]).collect();
        let y = [0.0, 0.0, 0.0, 10.0, 10.0, 10.0];
        let tree = grow(&values, &y, &params(1));

        assert_eq!(tree.len(), 3);
        match &tree.nodes[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 2.5);
            }
            other => panic!("expected root split, got {other:?}"),
        }
        assert_eq!(tree.predict_row(&[1.0, 1.0]), 0.0);
        assert_eq!(tree.predict_row(&[4.0, 1.0]), 10.0);
    }

    #[test]
    fn depth_zero_is_a_single_leaf() {
        let values: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let tree = grow(&values, &[1.0, 2.0, 3.0, 4.0], &params(0));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.predict_row(&[0.0]), 2.5);
    }

    #[test]
    fn min_child_weight_blocks_small_leaves() {
        let values: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let mut p = params(1);
        p.min_child_weight = 3.0;
        let tree = grow(&values, &[0.0, 0.0, 0.0, 100.0], &p);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn missing_values_follow_learned_direction() {
        let values = vec![
            vec![1.0],
            vec![2.0],
            vec![f64::NAN],
            vec![8.0],
            vec![9.0],
            vec![f64::NAN],
        ];
        let y = [0.0, 0.0, 10.0, 10.0, 10.0, 10.0];
        let tree = grow(&values, &y, &params(1));
        assert_eq!(tree.predict_row(&[f64::NAN]), 10.0);
        assert_eq!(tree.predict_row(&[1.5]), 0.0);
    }

    #[test]
    fn check_rejects_bad_children() {
        let tree = Tree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 1.0,
                default_left: false,
                gain: 1.0,
                left: 1,
                right: 2,
            }],
        };
        assert!(tree.check(1).is_err());
    }
}
