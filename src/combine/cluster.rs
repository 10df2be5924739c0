//! Names observation coordinates after known measurement sites.
//!
//! The reference sites are clustered together with the observations so that
//! each cluster can be identified by the site it contains.

use crate::types::location_label::LocationLabel;
use crate::types::observation::LatLon;
use crate::types::rows::MISSING_LOCATION;
use haversine::{distance, Location as HaversineLocation, Units};
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Label given to located points when no reference sites exist.
pub const UNLABELED_LOCATION: &str = "Unlabeled";

const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Assigns a location name to each coordinate.
pub trait LocationClusterer {
    /// Returns exactly one label per entry of `coordinates`, in order.
    ///
    /// Absent coordinates must be labelled [`MISSING_LOCATION`]. Every other
    /// label is the name of one of `references`, unless `references` is empty.
    fn label(&self, coordinates: &[Option<LatLon>], references: &[LocationLabel]) -> Vec<String>;
}

/// K-means over latitude/longitude with one cluster per reference site.
///
/// Centroids start on the reference coordinates, which makes the result
/// deterministic and keeps each cluster near the site that names it. Point to
/// centroid assignment goes through an R-tree of the current centroids.
#[derive(Debug, Clone)]
pub struct AnchoredKMeans {
    max_iterations: usize,
}

impl Default for AnchoredKMeans {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl AnchoredKMeans {
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }
}

// One centroid in the assignment R-tree.
struct Centroid {
    cluster: usize,
    position: [f64; 2],
}

impl RTreeObject for Centroid {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for Centroid {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

// NaN or infinite coordinates would break nearest-neighbour search.
fn is_usable(location: &LatLon) -> bool {
    location.0.is_finite()
        && location.1.is_finite()
        && (-90.0..=90.0).contains(&location.0)
        && (-180.0..=180.0).contains(&location.1)
}

fn to_point(location: LatLon) -> [f64; 2] {
    [location.0, location.1]
}

fn haversine_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    distance(
        HaversineLocation {
            latitude: a[0],
            longitude: a[1],
        },
        HaversineLocation {
            latitude: b[0],
            longitude: b[1],
        },
        Units::Kilometers,
    )
}

/// Index of the reference closest to `point` on the sphere.
fn nearest_reference(point: [f64; 2], references: &[LocationLabel]) -> Option<usize> {
    references
        .iter()
        .enumerate()
        .min_by_key(|(_, reference)| OrderedFloat(haversine_km(point, to_point(reference.location))))
        .map(|(index, _)| index)
}

impl AnchoredKMeans {
    /// Runs Lloyd iterations and returns the cluster of every point together
    /// with the final centroids.
    fn cluster(&self, points: &[[f64; 2]], initial: Vec<[f64; 2]>) -> (Vec<usize>, Vec<[f64; 2]>) {
        let mut centroids = initial;
        let mut assignment = vec![usize::MAX; points.len()];

        for iteration in 0..self.max_iterations {
            let tree = RTree::bulk_load(
                centroids
                    .iter()
                    .enumerate()
                    .map(|(cluster, &position)| Centroid { cluster, position })
                    .collect(),
            );
            let mut changed = false;
            for (point, assigned) in points.iter().zip(assignment.iter_mut()) {
                let nearest = tree
                    .nearest_neighbor(point)
                    .map(|centroid| centroid.cluster)
                    .unwrap_or(0);
                if *assigned != nearest {
                    *assigned = nearest;
                    changed = true;
                }
            }
            if !changed {
                debug!("Clustering converged after {} iterations", iteration);
                break;
            }

            let mut sums = vec![(0.0, 0.0, 0usize); centroids.len()];
            for (point, &cluster) in points.iter().zip(&assignment) {
                let sum = &mut sums[cluster];
                sum.0 += point[0];
                sum.1 += point[1];
                sum.2 += 1;
            }
            for (centroid, (lat, lon, count)) in centroids.iter_mut().zip(sums) {
                // An emptied cluster keeps its last position.
                if count > 0 {
                    *centroid = [lat / count as f64, lon / count as f64];
                }
            }
        }
        (assignment, centroids)
    }
}

impl LocationClusterer for AnchoredKMeans {
    fn label(&self, coordinates: &[Option<LatLon>], references: &[LocationLabel]) -> Vec<String> {
        let references: Vec<LocationLabel> = references
            .iter()
            .filter(|reference| {
                let usable = is_usable(&reference.location);
                if !usable {
                    warn!(
                        "Ignoring reference site '{}' with invalid coordinates {:?}",
                        reference.name, reference.location
                    );
                }
                usable
            })
            .cloned()
            .collect();
        let references = references.as_slice();
        let coordinates: Vec<Option<LatLon>> = coordinates
            .iter()
            .map(|coordinate| coordinate.filter(is_usable))
            .collect();

        if references.is_empty() {
            warn!("No reference locations supplied; located rows stay unlabeled");
            return coordinates
                .iter()
                .map(|c| match c {
                    Some(_) => UNLABELED_LOCATION.to_string(),
                    None => MISSING_LOCATION.to_string(),
                })
                .collect();
        }

        let points: Vec<[f64; 2]> = coordinates
            .iter()
            .flatten()
            .copied()
            .chain(references.iter().map(|reference| reference.location))
            .map(to_point)
            .collect();
        let anchors: Vec<[f64; 2]> = references
            .iter()
            .map(|reference| to_point(reference.location))
            .collect();
        let (assignment, centroids) = self.cluster(&points, anchors);

        // A cluster is named after the reference it contains (the last one if
        // several ended up together).
        let first_reference = points.len() - references.len();
        let mut cluster_names: Vec<Option<&str>> = vec![None; centroids.len()];
        for (index, reference) in references.iter().enumerate() {
            cluster_names[assignment[first_reference + index]] = Some(reference.name.as_str());
        }
        for (cluster, name) in cluster_names.iter_mut().enumerate() {
            if name.is_none() {
                *name = nearest_reference(centroids[cluster], references)
                    .map(|index| references[index].name.as_str());
                debug!("Cluster {} holds no reference site, named {:?}", cluster, name);
            }
        }

        let mut point_index = 0;
        coordinates
            .iter()
            .map(|coordinate| {
                let Some(coordinate) = coordinate else {
                    return MISSING_LOCATION.to_string();
                };
                let cluster = assignment[point_index];
                point_index += 1;
                references
                    .iter()
                    .find(|reference| reference.location == *coordinate)
                    .map(|reference| reference.name.as_str())
                    .or(cluster_names[cluster])
                    .unwrap_or(UNLABELED_LOCATION)
                    .to_string()
            })
            .collect()
    }
}
