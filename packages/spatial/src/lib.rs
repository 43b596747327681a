#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial analysis of incident coordinates.
//!
//! Density clustering (DBSCAN) over latitude/longitude pairs with neighbour
//! queries served by an `rstar` R-tree, an interactive Leaflet map of
//! incidents and cluster centroids, and box-count risk lookups.

pub mod map;
pub mod risk;

use std::collections::VecDeque;

use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

/// Default neighbourhood radius, in degrees.
pub const DEFAULT_EPS: f64 = 0.01;

/// Default neighbourhood size (including the point itself) for a core point.
pub const DEFAULT_MIN_POINTS: usize = 5;

/// Errors that can occur while clustering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    /// `eps` must be positive and finite, `min_points` at least one.
    #[error("Invalid DBSCAN parameters: eps={eps}, min_points={min_points}")]
    InvalidParameters {
        /// Requested radius.
        eps: f64,
        /// Requested neighbourhood size.
        min_points: usize,
    },

    /// A coordinate was NaN or infinite.
    #[error("Point {index} has a non-finite coordinate")]
    NonFinitePoint {
        /// Index of the offending point.
        index: usize,
    },
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    const fn as_array(self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

/// DBSCAN membership for one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterLabel {
    Noise,
    Cluster(usize),
}

/// A discovered cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    /// Arithmetic mean of the member coordinates.
    pub centroid: GeoPoint,
    pub size: usize,
}

/// DBSCAN output: a label per input point and a summary per cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub labels: Vec<ClusterLabel>,
    /// Ordered by cluster id.
    pub clusters: Vec<Cluster>,
}

impl Clustering {
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|label| matches!(label, ClusterLabel::Noise))
            .count()
    }
}

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighbourhood radius in degrees (inclusive).
    pub eps: f64,
    /// Points within `eps`, counting the point itself, needed for a core
    /// point.
    pub min_points: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Clusters points with DBSCAN.
///
/// Euclidean distance is taken directly on degrees. Clusters are numbered in
/// the order their first core point appears in `points`; a border point
/// reachable from several clusters joins the first one that reaches it.
///
/// # Errors
///
/// Returns [`ClusterError`] for invalid parameters or non-finite points.
pub fn dbscan(points: &[GeoPoint], params: DbscanParams) -> Result<Clustering, ClusterError> {
    if !(params.eps.is_finite() && params.eps > 0.0) || params.min_points == 0 {
        return Err(ClusterError::InvalidParameters {
            eps: params.eps,
            min_points: params.min_points,
        });
    }
    if let Some(index) = points
        .iter()
        .position(|p| !(p.latitude.is_finite() && p.longitude.is_finite()))
    {
        return Err(ClusterError::NonFinitePoint { index });
    }

    let tree: RTree<IndexedPoint> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(p.as_array(), i))
            .collect(),
    );
    let eps_squared = params.eps * params.eps;

    let neighbours: Vec<Vec<usize>> = points
        .iter()
        .map(|p| {
            let mut found: Vec<usize> = tree
                .locate_within_distance(p.as_array(), eps_squared)
                .map(|entry| entry.data)
                .collect();
            found.sort_unstable();
            found
        })
        .collect();
    let is_core: Vec<bool> = neighbours
        .iter()
        .map(|n| n.len() >= params.min_points)
        .collect();

    let mut assigned: Vec<Option<usize>> = vec![None; points.len()];
    let mut next_id = 0;
    let mut queue = VecDeque::new();

    for seed in 0..points.len() {
        if !is_core[seed] || assigned[seed].is_some() {
            continue;
        }
        let id = next_id;
        next_id += 1;
        assigned[seed] = Some(id);
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            for &neighbour in &neighbours[current] {
                if assigned[neighbour].is_none() {
                    assigned[neighbour] = Some(id);
                    if is_core[neighbour] {
                        queue.push_back(neighbour);
                    }
                }
            }
        }
    }

    let mut sums = vec![(0.0, 0.0, 0_usize); next_id];
    for (point, label) in points.iter().zip(&assigned) {
        if let Some(id) = label {
            let entry = &mut sums[*id];
            entry.0 += point.latitude;
            entry.1 += point.longitude;
            entry.2 += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let clusters: Vec<Cluster> = sums
        .into_iter()
        .enumerate()
        .map(|(id, (lat, lon, size))| Cluster {
            id,
            centroid: GeoPoint::new(lat / size as f64, lon / size as f64),
            size,
        })
        .collect();

    let labels: Vec<ClusterLabel> = assigned
        .into_iter()
        .map(|label| label.map_or(ClusterLabel::Noise, ClusterLabel::Cluster))
        .collect();

    let clustering = Clustering { labels, clusters };
    log::info!(
        "DBSCAN found {} clusters ({} noise points of {})",
        clustering.clusters.len(),
        clustering.noise_count(),
        points.len()
    );
    Ok(clustering)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn tight_group(lat: f64, lon: f64, n: usize) -> Vec<GeoPoint> {
        (0..n)
            .map(|i| GeoPoint::new(lat + 0.0008 * i as f64, lon))
            .collect()
    }

    #[test]
    fn six_close_points_form_one_cluster() {
        let points = tight_group(41.88, -87.63, 6);
        let clustering = dbscan(&points, DbscanParams::default()).unwrap();
        assert_eq!(clustering.clusters.len(), 1);
        assert_eq!(clustering.clusters[0].size, 6);
        assert!(clustering.labels.iter().all(|l| *l == ClusterLabel::Cluster(0)));
    }

    #[test]
    fn isolated_point_is_noise() {
        let mut points = tight_group(41.88, -87.63, 6);
        points.push(GeoPoint::new(42.5, -88.0));
        let clustering = dbscan(&points, DbscanParams::default()).unwrap();
        assert_eq!(clustering.labels[6], ClusterLabel::Noise);
        assert_eq!(clustering.noise_count(), 1);
        assert_eq!(clustering.clusters[0].size, 6);
    }

    #[test]
    fn centroid_is_member_mean() {
        let points = tight_group(41.0, -87.0, 5);
        let clustering = dbscan(&points, DbscanParams::default()).unwrap();
        let centroid = clustering.clusters[0].centroid;
        assert!((centroid.latitude - (41.0 + 0.0016)).abs() < 1e-12);
        assert!((centroid.longitude + 87.0).abs() < 1e-12);
    }

    #[test]
    fn clusters_numbered_by_first_core_point() {
        let mut points = tight_group(40.0, -80.0, 5);
        points.splice(0..0, tight_group(45.0, -85.0, 5));
        let clustering = dbscan(&points, DbscanParams::default()).unwrap();
        assert_eq!(clustering.labels[0], ClusterLabel::Cluster(0));
        assert_eq!(clustering.labels[5], ClusterLabel::Cluster(1));
        assert!((clustering.clusters[1].centroid.latitude - 40.0016).abs() < 1e-9);
    }

    #[test]
    fn eps_is_inclusive() {
        // Exactly representable spacing: two points 0.5 apart with eps 0.5.
        let points = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.5, 0.0)];
        let params = DbscanParams {
            eps: 0.5,
            min_points: 2,
        };
        let clustering = dbscan(&points, params).unwrap();
        assert_eq!(clustering.clusters.len(), 1);
    }

    #[test]
    fn border_point_joins_first_cluster() {
        // Cores at x=0 and x=2 both reach the non-core point at x=1.
        let points = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.1),
            GeoPoint::new(0.0, -0.1),
            GeoPoint::new(1.0, 0.0),
            GeoPoint::new(2.0, 0.0),
            GeoPoint::new(2.0, 0.1),
            GeoPoint::new(2.0, -0.1),
        ];
        let params = DbscanParams {
            eps: 1.0,
            min_points: 4,
        };
        let clustering = dbscan(&points, params).unwrap();
        assert_eq!(clustering.clusters.len(), 2);
        assert_eq!(clustering.labels[3], ClusterLabel::Cluster(0));
        assert_eq!(clustering.clusters[0].size, 4);
        assert_eq!(clustering.clusters[1].size, 3);
    }

    #[test]
    fn shared_core_point_links_groups() {
        let points = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.1),
            GeoPoint::new(1.0, 0.0),
            GeoPoint::new(2.0, 0.0),
            GeoPoint::new(2.0, 0.1),
        ];
        let params = DbscanParams {
            eps: 1.0,
            min_points: 3,
        };
        assert_eq!(dbscan(&points, params).unwrap().clusters.len(), 1);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(dbscan(&[], DbscanParams { eps: 0.0, min_points: 5 }).is_err());
        assert_eq!(
            dbscan(&[GeoPoint::new(f64::NAN, 0.0)], DbscanParams::default()).unwrap_err(),
            ClusterError::NonFinitePoint { index: 0 }
        );
    }

    #[test]
    fn empty_input_has_no_clusters() {
        let clustering = dbscan(&[], DbscanParams::default()).unwrap();
        assert!(clustering.labels.is_empty());
        assert!(clustering.clusters.is_empty());
    }
}
