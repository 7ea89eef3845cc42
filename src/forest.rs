//! Random forest classifier.
//!
//! CART trees grown on bootstrap resamples with Gini impurity and a random
//! subset of candidate features per split. Each leaf keeps the class
//! distribution of its training samples; the forest averages those vectors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RiskError, RiskResult};
use crate::synth::RandomSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        probabilities: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Flat node arena; the root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn predict_proba(&self, features: &[f64]) -> RiskResult<&[f64]> {
        let mut index = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(Node::Leaf { probabilities }) => return Ok(probabilities.as_slice()),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).ok_or_else(|| {
                        RiskError::Inference(format!(
                            "split on feature {feature} but vector has {}",
                            features.len()
                        ))
                    })?;
                    index = if value <= threshold { *left } else { *right };
                }
                None => {
                    return Err(RiskError::Inference(format!(
                        "tree references missing node {index}"
                    )))
                }
            }
        }
        Err(RiskError::Inference("tree contains a cycle".to_string()))
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize, budget: usize) -> usize {
            match nodes.get(index) {
                Some(Node::Split { left, right, .. }) if budget > 0 => {
                    1 + walk(nodes, *left, budget - 1).max(walk(nodes, *right, budget - 1))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestParams {
    pub trees: usize,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub feature_names: Vec<String>,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit<R: RandomSource + ?Sized>(
        feature_names: &[&str],
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
        params: &ForestParams,
        rng: &mut R,
    ) -> RiskResult<Self> {
        let width = feature_names.len();
        if features.is_empty() || features.len() != labels.len() {
            return Err(RiskError::ModelUnavailable(format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            )));
        }
        if params.trees == 0 {
            return Err(RiskError::ModelUnavailable(
                "forest needs at least one tree".to_string(),
            ));
        }
        if features.iter().any(|row| row.len() != width) {
            return Err(RiskError::ModelUnavailable(format!(
                "training rows must have {width} features"
            )));
        }
        if let Some(label) = labels.iter().find(|&&label| label >= n_classes) {
            return Err(RiskError::ModelUnavailable(format!(
                "label {label} outside {n_classes} classes"
            )));
        }

        let max_features = ((width as f64).sqrt().floor() as usize).max(1);
        let n = features.len();
        let mut trees = Vec::with_capacity(params.trees);
        for _ in 0..params.trees {
            let mut sample: Vec<usize> = (0..n).map(|_| rng.next_index(n)).collect();
            let mut builder = TreeBuilder {
                features,
                labels,
                n_classes,
                max_features,
                max_depth: params.max_depth,
                nodes: Vec::new(),
            };
            builder.grow(rng, &mut sample, 0);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        debug!(
            trees = trees.len(),
            samples = n,
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "fitted random forest"
        );

        Ok(Self {
            feature_names: feature_names.iter().map(|name| name.to_string()).collect(),
            n_classes,
            trees,
        })
    }

    /// Mean of the trees' leaf distributions.
    pub fn predict_proba(&self, features: &[f64]) -> RiskResult<Vec<f64>> {
        if features.len() != self.feature_names.len() {
            return Err(RiskError::Inference(format!(
                "forest expects {} features, got {}",
                self.feature_names.len(),
                features.len()
            )));
        }
        if self.trees.is_empty() {
            return Err(RiskError::Inference("forest has no trees".to_string()));
        }

        let mut totals = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let probabilities = tree.predict_proba(features)?;
            if probabilities.len() != self.n_classes {
                return Err(RiskError::Inference(format!(
                    "leaf has {} classes, forest has {}",
                    probabilities.len(),
                    self.n_classes
                )));
            }
            for (total, p) in totals.iter_mut().zip(probabilities) {
                *total += p;
            }
        }
        let count = self.trees.len() as f64;
        Ok(totals.into_iter().map(|total| total / count).collect())
    }

    /// Predicted class (ties go to the lower index) and its probability vector.
    pub fn predict(&self, features: &[f64]) -> RiskResult<(usize, Vec<f64>)> {
        let probabilities = self.predict_proba(features)?;
        let mut best = 0;
        for (class, p) in probabilities.iter().enumerate() {
            if !p.is_finite() {
                return Err(RiskError::Inference(format!(
                    "non-finite probability for class {class}"
                )));
            }
            if *p > probabilities[best] {
                best = class;
            }
        }
        Ok((best, probabilities))
    }
}

struct Candidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn grow<R: RandomSource + ?Sized>(
        &mut self,
        rng: &mut R,
        indices: &mut [usize],
        depth: usize,
    ) -> usize {
        let counts = self.class_counts(indices);
        let node = self.nodes.len();
        self.nodes.push(leaf(&counts));

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let at_depth = self.max_depth.is_some_and(|max| depth >= max);
        if pure || indices.len() < 2 || at_depth {
            return node;
        }

        let Some(split) = self.best_split(rng, indices, &counts) else {
            return node;
        };

        let feature = split.feature;
        let features = self.features;
        indices.sort_by(|a, b| features[*a][feature].total_cmp(&features[*b][feature]));
        let mid = indices.partition_point(|i| features[*i][feature] <= split.threshold);
        let (left_indices, right_indices) = indices.split_at_mut(mid);

        let left = self.grow(rng, left_indices, depth + 1);
        let right = self.grow(rng, right_indices, depth + 1);
        self.nodes[node] = Node::Split {
            feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }

    /// Visits features in random order. At least `max_features` are tried,
    /// and more only while none has produced a valid split.
    fn best_split<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        indices: &[usize],
        parent: &[usize],
    ) -> Option<Candidate> {
        let width = self.features[indices[0]].len();
        let mut order: Vec<usize> = (0..width).collect();
        for i in 0..width {
            let j = i + rng.next_index(width - i);
            order.swap(i, j);
        }

        let mut best: Option<Candidate> = None;
        for (visited, &feature) in order.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_on(feature, indices, parent) {
                if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_split_on(&self, feature: usize, indices: &[usize], parent: &[usize]) -> Option<Candidate> {
        let value = |i: usize| self.features[i][feature];
        let mut sorted = indices.to_vec();
        sorted.sort_by(|a, b| value(*a).total_cmp(&value(*b)));

        let total = sorted.len();
        let mut left = vec![0usize; self.n_classes];
        let mut right = parent.to_vec();
        let mut best: Option<Candidate> = None;

        for pos in 0..total - 1 {
            let class = self.labels[sorted[pos]];
            left[class] += 1;
            right[class] -= 1;

            let here = value(sorted[pos]);
            let next = value(sorted[pos + 1]);
            if next <= here {
                continue;
            }

            let n_left = pos + 1;
            let n_right = total - n_left;
            let impurity = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / total as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = here / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = here;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn leaf(counts: &[usize]) -> Node {
    let total: usize = counts.iter().sum();
    let probabilities = if total == 0 {
        vec![0.0; counts.len()]
    } else {
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    };
    Node::Leaf { probabilities }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SeededRandom;

    fn two_blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let offset = i as f64 * 0.1;
            features.push(vec![offset, 1.0 + offset]);
            labels.push(0);
            features.push(vec![10.0 + offset, 12.0 - offset]);
            labels.push(1);
        }
        (features, labels)
    }

    fn params(trees: usize) -> ForestParams {
        ForestParams {
            trees,
            max_depth: None,
        }
    }

    #[test]
    fn separates_linearly_separable_classes() {
        let (features, labels) = two_blobs();
        let mut rng = SeededRandom::new(3);
        let forest =
            RandomForest::fit(&["x", "y"], &features, &labels, 2, &params(15), &mut rng).unwrap();

        let (class, probabilities) = forest.predict(&[0.5, 1.5]).unwrap();
        assert_eq!(class, 0);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let (class, _) = forest.predict(&[11.0, 11.0]).unwrap();
        assert_eq!(class, 1);
    }

    #[test]
    fn same_seed_grows_identical_forests() {
        let (features, labels) = two_blobs();
        let a = RandomForest::fit(&["x", "y"], &features, &labels, 2, &params(5), &mut SeededRandom::new(9))
            .unwrap();
        let b = RandomForest::fit(&["x", "y"], &features, &labels, 2, &params(5), &mut SeededRandom::new(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn max_depth_limits_growth() {
        let (features, labels) = two_blobs();
        let shallow = ForestParams {
            trees: 3,
            max_depth: Some(1),
        };
        let forest =
            RandomForest::fit(&["x", "y"], &features, &labels, 2, &shallow, &mut SeededRandom::new(1))
                .unwrap();
        assert!(forest.trees.iter().all(|tree| tree.depth() <= 1));
    }

    #[test]
    fn rejects_wrong_feature_count() {
        let (features, labels) = two_blobs();
        let forest =
            RandomForest::fit(&["x", "y"], &features, &labels, 2, &params(2), &mut SeededRandom::new(1))
                .unwrap();
        let err = forest.predict(&[1.0]).unwrap_err();
        assert!(matches!(err, RiskError::Inference(_)));
    }

    #[test]
    fn rejects_invalid_training_input() {
        let (features, labels) = two_blobs();
        let mut rng = SeededRandom::new(1);
        assert!(RandomForest::fit(&["x", "y"], &features, &labels[1..], 2, &params(2), &mut rng).is_err());
        assert!(RandomForest::fit(&["x", "y"], &features, &labels, 1, &params(2), &mut rng).is_err());
        assert!(RandomForest::fit(&["x", "y"], &features, &labels, 2, &params(0), &mut rng).is_err());
    }

    #[test]
    fn ties_resolve_to_lower_class() {
        let forest = RandomForest {
            feature_names: vec!["x".to_string()],
            n_classes: 2,
            trees: vec![DecisionTree {
                nodes: vec![Node::Leaf {
                    probabilities: vec![0.5, 0.5],
                }],
            }],
        };
        assert_eq!(forest.predict(&[0.0]).unwrap().0, 0);
    }

    #[test]
    fn corrupt_tree_is_an_inference_error() {
        let tree = DecisionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(matches!(tree.predict_proba(&[1.0]), Err(RiskError::Inference(_))));
    }

    #[test]
    fn serialises_losslessly() {
        let (features, labels) = two_blobs();
        let forest =
            RandomForest::fit(&["x", "y"], &features, &labels, 2, &params(3), &mut SeededRandom::new(5))
                .unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, forest);
    }
}
