use itertools::Itertools;
use log::trace;
use rand::prelude::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::qual::QualityCorpus;

/// Default centroid movement threshold (squared L2 norm) below which the
/// clustering is considered stable.
pub const DEFAULT_MOVEMENT_THRESHOLD: f64 = 4.0;

const MAX_ITERATIONS: usize = 100;

/// Partitions training lines into classes of similar quality profiles.
///
/// Lloyd iteration over the lines seen as integer vectors: lines are
/// assigned to the nearest centroid by squared L2 distance, centroids are
/// recomputed as coordinate means, and the loop stops once the assignment is
/// stable and the total centroid movement falls below the threshold.
#[derive(Debug)]
pub struct Clustering {
    rand: Xoshiro256PlusPlus,
    threshold: f64,
}

impl Clustering {
    /// Creates a new `Clustering` instance with the default movement
    /// threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_MOVEMENT_THRESHOLD)
    }

    /// Creates a new `Clustering` instance with the given movement
    /// threshold.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            rand: Xoshiro256PlusPlus::seed_from_u64(404),
            threshold,
        }
    }

    /// Splits the corpus lines into at most `num_clusters` clusters.
    ///
    /// Initial centroids are distinct random lines. Every returned cluster
    /// holds the indices of its member lines; empty clusters are dropped.
    #[must_use]
    pub fn make_clusters(&mut self, corpus: &QualityCorpus, num_clusters: usize) -> Vec<Cluster> {
        if corpus.is_empty() || num_clusters == 0 {
            return Vec::new();
        }
        let num_clusters = num_clusters.min(corpus.line_count());
        if num_clusters == 1 {
            let centroid = Self::mean_of(corpus, &(0..corpus.line_count()).collect_vec());
            return vec![Cluster::new(centroid, (0..corpus.line_count()).collect_vec())];
        }

        let line_indices = (0..corpus.line_count()).collect_vec();
        let mut centroids: Vec<Vec<f64>> = line_indices
            .choose_multiple(&mut self.rand, num_clusters)
            .map(|&index| corpus.line(index).iter().map(|&s| s as f64).collect_vec())
            .collect();
        trace!("initial centroids drawn from {} lines", corpus.line_count());

        let mut assignment = vec![0_usize; corpus.line_count()];
        for iteration in 0..MAX_ITERATIONS {
            let mut changes = 0;
            for (index, line) in corpus.lines().enumerate() {
                let nearest = Self::nearest_centroid(line, &centroids);
                if assignment[index] != nearest {
                    assignment[index] = nearest;
                    changes += 1;
                }
            }

            let mut movement = 0.0;
            for (cluster_index, centroid) in centroids.iter_mut().enumerate() {
                let members = Self::cluster_members(&assignment, cluster_index);
                if members.is_empty() {
                    continue;
                }
                let updated = Self::mean_of(corpus, &members);
                movement += centroid
                    .iter()
                    .zip(updated.iter())
                    .map(|(&a, &b)| (a - b) * (a - b))
                    .sum::<f64>();
                *centroid = updated;
            }

            trace!(
                "iteration {}: {} assignment changes, centroid movement {:.3}",
                iteration,
                changes,
                movement
            );
            if changes == 0 && movement < self.threshold {
                trace!("converged");
                break;
            }
        }

        centroids
            .into_iter()
            .enumerate()
            .map(|(cluster_index, centroid)| {
                Cluster::new(centroid, Self::cluster_members(&assignment, cluster_index))
            })
            .filter(|cluster| !cluster.lines.is_empty())
            .collect()
    }

    fn cluster_members(assignment: &[usize], cluster_index: usize) -> Vec<usize> {
        assignment
            .iter()
            .enumerate()
            .filter(|(_index, &cluster)| cluster == cluster_index)
            .map(|(index, _cluster)| index)
            .collect()
    }

    #[must_use]
    fn nearest_centroid(line: &[u8], centroids: &[Vec<f64>]) -> usize {
        centroids
            .iter()
            .enumerate()
            .map(|(index, centroid)| (index, Self::distance(line, centroid)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _distance)| index)
            .unwrap()
    }

    #[must_use]
    fn distance(line: &[u8], centroid: &[f64]) -> f64 {
        line.iter()
            .zip(centroid.iter())
            .map(|(&symbol, &coord)| {
                let diff = symbol as f64 - coord;
                diff * diff
            })
            .sum()
    }

    #[must_use]
    fn mean_of(corpus: &QualityCorpus, members: &[usize]) -> Vec<f64> {
        let mut mean = vec![0.0; corpus.columns()];
        for &index in members {
            for (coord, &symbol) in mean.iter_mut().zip(corpus.line(index)) {
                *coord += symbol as f64;
            }
        }
        for coord in &mut mean {
            *coord /= members.len() as f64;
        }
        mean
    }
}

impl Default for Clustering {
    fn default() -> Self {
        Self::new()
    }
}

/// A cluster of training lines: the centroid profile and the member line
/// indices.
#[derive(Debug, PartialEq)]
pub struct Cluster {
    centroid: Vec<f64>,
    lines: Vec<usize>,
}

impl Cluster {
    #[must_use]
    pub fn new<T: Into<Vec<usize>>>(centroid: Vec<f64>, lines: T) -> Self {
        Self {
            centroid,
            lines: lines.into(),
        }
    }

    /// Returns the mean quality profile of this cluster.
    #[inline]
    #[must_use]
    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    /// Returns the indices of the member lines.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[usize] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::clustering::Clustering;
    use crate::qual::QualityCorpus;

    #[test_log::test]
    fn test_single_cluster() {
        let corpus = QualityCorpus::from_lines([vec![0, 1], vec![2, 3], vec![4, 5]]);

        let clusters = Clustering::new().make_clusters(&corpus, 1);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].lines(), [0, 1, 2]);
        assert_eq!(clusters[0].centroid(), [2.0, 3.0]);
    }

    #[test_log::test]
    fn test_two_well_separated_clusters() {
        let low = vec![vec![1, 2, 1], vec![2, 1, 2], vec![1, 1, 1]];
        let high = vec![vec![30, 31, 30], vec![31, 30, 31], vec![30, 30, 30]];
        let corpus = QualityCorpus::from_lines(low.into_iter().chain(high));

        let mut clusters = Clustering::new().make_clusters(&corpus, 2);
        clusters.sort_by_key(|cluster| cluster.lines()[0]);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].lines(), [0, 1, 2]);
        assert_eq!(clusters[1].lines(), [3, 4, 5]);
        assert!(clusters[0].centroid()[0] < 3.0);
        assert!(clusters[1].centroid()[0] > 29.0);
    }

    #[test_log::test]
    fn test_cluster_count_capped_by_lines() {
        let corpus = QualityCorpus::from_lines([vec![0], vec![10]]);

        let clusters = Clustering::new().make_clusters(&corpus, 8);

        assert_eq!(clusters.len(), 2);
        assert_eq!(
            clusters
                .iter()
                .flat_map(|cluster| cluster.lines().iter().copied())
                .sorted()
                .collect_vec(),
            [0, 1]
        );
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = QualityCorpus::from_lines([]);

        let clusters = Clustering::new().make_clusters(&corpus, 3);

        assert!(clusters.is_empty());
    }
}
