//! Density-based clustering (DBSCAN) of retailer locations on a sphere.
//!
//! Neighbourhoods use the haversine central angle, compared against the
//! radius converted to radians, so the radius is a great-circle distance.

use log::debug;

use crate::geodesy::{haversine_angle, radius_to_angle};
use crate::models::ClusterLabel;

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// One label per input point, aligned with the input order.
    pub labels: Vec<ClusterLabel>,
    pub cluster_count: usize,
}

impl Clustering {
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_noise()).count()
    }

    /// Indices of the points labelled with `cluster_id`, in input order.
    pub fn members(&self, cluster_id: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == ClusterLabel::Cluster(cluster_id))
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Indices of every point within `epsilon` radians of `points[idx]`, itself included.
fn region_query(points: &[(f64, f64)], idx: usize, epsilon: f64) -> Vec<usize> {
    let (lat, lon) = points[idx];
    points
        .iter()
        .enumerate()
        .filter(|(_, (other_lat, other_lon))| haversine_angle(lat, lon, *other_lat, *other_lon) <= epsilon)
        .map(|(other, _)| other)
        .collect()
}

/// Labels each `(lat, lon)` point with a cluster id or noise.
///
/// Cluster ids are handed out in discovery order, scanning points in input
/// order. A border point reachable from two clusters stays with the first one
/// that reaches it.
pub fn cluster_points(points: &[(f64, f64)], radius_meters: f64, min_samples: usize) -> Clustering {
    let epsilon = radius_to_angle(radius_meters);
    let neighbourhoods: Vec<Vec<usize>> = (0..points.len())
        .map(|idx| region_query(points, idx, epsilon))
        .collect();
    let is_core: Vec<bool> = neighbourhoods
        .iter()
        .map(|neighbours| neighbours.len() >= min_samples)
        .collect();

    let mut labels = vec![ClusterLabel::Noise; points.len()];
    let mut assigned = vec![false; points.len()];
    let mut cluster_count = 0;

    for seed in 0..points.len() {
        if assigned[seed] || !is_core[seed] {
            continue;
        }

        let label = ClusterLabel::Cluster(cluster_count);
        cluster_count += 1;
        labels[seed] = label;
        assigned[seed] = true;

        let mut frontier = vec![seed];
        while let Some(current) = frontier.pop() {
            for &neighbour in &neighbourhoods[current] {
                if assigned[neighbour] {
                    continue;
                }
                labels[neighbour] = label;
                assigned[neighbour] = true;
                // border points join but do not expand the cluster
                if is_core[neighbour] {
                    frontier.push(neighbour);
                }
            }
        }
    }

    let clustering = Clustering {
        labels,
        cluster_count,
    };
    debug!(
        "DBSCAN over {} points (radius {}m, min_samples {}): {} clusters, {} noise",
        points.len(),
        radius_meters,
        min_samples,
        clustering.cluster_count,
        clustering.noise_count()
    );
    clustering
}
