use std::future::Future;
use std::pin::Pin;

use ndarray::{Array1, Array2, ArrayView1};

use crate::timer::Stopwatch;

/// One grouping of mention indices under a single integer cluster label.
#[derive(Debug, Clone)]
pub struct ClusterGroup {
    pub cluster_id: i64,
    pub indices: Vec<usize>,
}

/// Result of a clustering pass: a partition of row indices plus how long
/// it took.
pub struct ClusteringOutcome {
    pub clusters: Vec<ClusterGroup>,
    pub duration_ms: f64,
}

/// Partitions an embedding matrix into integer-labelled groupings.
/// Object-safe via manual future boxing, matching the rest of this
/// workspace's swappable-collaborator trait shape.
pub trait Clusterer: Send + Sync {
    fn cluster<'a>(
        &'a self,
        embeddings: &'a Array2<f64>,
    ) -> Pin<Box<dyn Future<Output = ClusteringOutcome> + Send + 'a>>;
}

/// Deterministic k-means with a silhouette-score sweep over
/// `k ∈ {1..min(n, max_k)}`, picking the k with the highest mean
/// silhouette (ties broken by the smaller k). Centroids are seeded
/// deterministically from evenly spaced rows rather than randomly, so
/// identical input always produces identical output.
pub struct KMeansClusterer {
    max_k: usize,
    max_iterations: usize,
}

impl KMeansClusterer {
    pub fn new() -> Self {
        Self {
            max_k: 5,
            max_iterations: 50,
        }
    }
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clusterer for KMeansClusterer {
    fn cluster<'a>(
        &'a self,
        embeddings: &'a Array2<f64>,
    ) -> Pin<Box<dyn Future<Output = ClusteringOutcome> + Send + 'a>> {
        Box::pin(async move {
            let sw = Stopwatch::start();
            let assignment = best_k_means(embeddings, self.max_k, self.max_iterations);
            let duration_ms = sw.elapsed_ms();
            ClusteringOutcome {
                clusters: assignment_to_groups(&assignment),
                duration_ms,
            }
        })
    }
}

fn assignment_to_groups(assignment: &[usize]) -> Vec<ClusterGroup> {
    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();
    for (idx, label) in assignment.iter().enumerate() {
        groups.entry(*label).or_default().push(idx);
    }
    groups
        .into_iter()
        .map(|(label, indices)| ClusterGroup {
            cluster_id: label as i64,
            indices,
        })
        .collect()
}

/// Runs k-means for every candidate k and returns the assignment with the
/// highest mean silhouette score. `k=1` always has a defined (zero)
/// silhouette and acts as the floor when no larger k improves on it.
fn best_k_means(embeddings: &Array2<f64>, max_k: usize, max_iterations: usize) -> Vec<usize> {
    let n = embeddings.nrows();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0];
    }

    let upper_k = max_k.min(n);
    let mut best_assignment = vec![0usize; n];
    let mut best_score = f64::MIN;

    for k in 1..=upper_k {
        let assignment = run_k_means(embeddings, k, max_iterations);
        let score = if k == 1 || k == n {
            0.0
        } else {
            mean_silhouette(embeddings, &assignment, k)
        };
        if score > best_score {
            best_score = score;
            best_assignment = assignment;
        }
    }

    best_assignment
}

/// Lloyd's algorithm with deterministic seeding: initial centroids are
/// `k` rows spaced evenly across the (unshuffled) input, so the same
/// embedding matrix always converges to the same assignment.
fn run_k_means(embeddings: &Array2<f64>, k: usize, max_iterations: usize) -> Vec<usize> {
    let n = embeddings.nrows();
    let dim = embeddings.ncols();

    let mut centroids: Array2<f64> = Array2::zeros((k, dim));
    for c in 0..k {
        let row_idx = if k == 1 { 0 } else { c * (n - 1) / (k - 1) };
        centroids.row_mut(c).assign(&embeddings.row(row_idx));
    }

    let mut assignment = vec![0usize; n];

    for _ in 0..max_iterations {
        let mut changed = false;
        for i in 0..n {
            let row = embeddings.row(i);
            let mut best_c = 0usize;
            let mut best_dist = f64::MAX;
            for c in 0..k {
                let dist = squared_distance(row, centroids.row(c));
                if dist < best_dist {
                    best_dist = dist;
                    best_c = c;
                }
            }
            if assignment[i] != best_c {
                assignment[i] = best_c;
                changed = true;
            }
        }

        let mut sums: Array2<f64> = Array2::zeros((k, dim));
        let mut counts = vec![0usize; k];
        for i in 0..n {
            let c = assignment[i];
            let mut row = sums.row_mut(c);
            row += &embeddings.row(i);
            counts[c] += 1;
        }
        for c in 0..k {
            if counts[c] > 0 {
                let mean = sums.row(c).to_owned() / counts[c] as f64;
                centroids.row_mut(c).assign(&mean);
            }
        }

        if !changed {
            break;
        }
    }

    assignment
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Mean silhouette coefficient across all points for a given assignment.
fn mean_silhouette(embeddings: &Array2<f64>, assignment: &[usize], k: usize) -> f64 {
    let n = embeddings.nrows();
    if n == 0 {
        return 0.0;
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, label) in assignment.iter().enumerate() {
        members[*label].push(i);
    }

    let scores: Array1<f64> = Array1::from_shape_fn(n, |i| {
        let own_cluster = assignment[i];
        let own_members = &members[own_cluster];

        let a = if own_members.len() <= 1 {
            0.0
        } else {
            own_members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| squared_distance(embeddings.row(i), embeddings.row(j)).sqrt())
                .sum::<f64>()
                / (own_members.len() - 1) as f64
        };

        let b = (0..k)
            .filter(|&c| c != own_cluster && !members[c].is_empty())
            .map(|c| {
                members[c]
                    .iter()
                    .map(|&j| squared_distance(embeddings.row(i), embeddings.row(j)).sqrt())
                    .sum::<f64>()
                    / members[c].len() as f64
            })
            .fold(f64::MAX, f64::min);

        if b == f64::MAX {
            0.0
        } else {
            let denom = a.max(b);
            if denom == 0.0 {
                0.0
            } else {
                (b - a) / denom
            }
        }
    });

    scores.mean().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[tokio::test]
    async fn single_row_yields_one_cluster() {
        let embeddings = array![[1.0, 2.0, 3.0]];
        let clusterer = KMeansClusterer::new();
        let outcome = clusterer.cluster(&embeddings).await;
        assert_eq!(outcome.clusters.len(), 1);
        assert_eq!(outcome.clusters[0].indices, vec![0]);
    }

    #[tokio::test]
    async fn separates_two_well_separated_groups() {
        let embeddings = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.1],
            [10.0, 10.1],
        ];
        let clusterer = KMeansClusterer::new();
        let outcome = clusterer.cluster(&embeddings).await;
        assert_eq!(outcome.clusters.len(), 2);
        let mut sizes: Vec<usize> = outcome.clusters.iter().map(|c| c.indices.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![3, 3]);
    }

    #[test]
    fn same_input_is_fully_deterministic() {
        let embeddings = array![[0.0, 0.0], [1.0, 1.0], [5.0, 5.0], [6.0, 6.0]];
        let first = best_k_means(&embeddings, 5, 50);
        let second = best_k_means(&embeddings, 5, 50);
        assert_eq!(first, second);
    }
}
