// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nearest-amenity ranking shared by the in-process store and the benchmark.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One (building, amenity) pair inside the search radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub building_id: Uuid,
    pub amenity_id: Uuid,
    pub amenity_osm_id: i64,
    pub distance_meters: f64,
}

impl Candidate {
    /// Total order used for ranking: distance, then amenity OSM ID, then amenity ID.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance_meters
            .total_cmp(&other.distance_meters)
            .then(self.amenity_osm_id.cmp(&other.amenity_osm_id))
            .then(self.amenity_id.cmp(&other.amenity_id))
    }
}

/// Best-ranked candidate of an iterator, or `None` when it is empty.
pub fn pick_nearest<I>(candidates: I) -> Option<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    candidates.into_iter().min_by(|a, b| a.rank_cmp(b))
}

/// Winner per building. Buildings with no candidate are absent from the map.
///
/// The result does not depend on candidate order.
pub fn select_nearest<I>(candidates: I) -> HashMap<Uuid, Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut winners: HashMap<Uuid, Candidate> = HashMap::new();
    for candidate in candidates {
        winners
            .entry(candidate.building_id)
            .and_modify(|current| {
                if candidate.rank_cmp(current) == Ordering::Less {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    winners
}

/// Outcome of a batch assignment run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AssignmentReport {
    /// Buildings whose assignment was written (unchanged winners are not counted)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub updated: u64,
    pub radius_meters: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(building: Uuid, osm_id: i64, distance: f64) -> Candidate {
        Candidate {
            building_id: building,
            amenity_id: Uuid::new_v4(),
            amenity_osm_id: osm_id,
            distance_meters: distance,
        }
    }

    #[test]
    fn test_closest_wins() {
        let b = Uuid::new_v4();
        let near = candidate(b, 9, 1.0);
        let far = candidate(b, 1, 4.0);
        let winners = select_nearest([far, near]);
        assert_eq!(winners[&b], near);
    }

    #[test]
    fn test_tie_broken_by_osm_id_regardless_of_order() {
        let b = Uuid::new_v4();
        let low = candidate(b, 100, 2.5);
        let high = candidate(b, 200, 2.5);

        assert_eq!(select_nearest([low, high])[&b], low);
        assert_eq!(select_nearest([high, low])[&b], low);
        assert_eq!(pick_nearest([high, low]), Some(low));
    }

    #[test]
    fn test_tie_on_osm_id_broken_by_amenity_id() {
        let b = Uuid::new_v4();
        let mut x = candidate(b, 5, 0.0);
        let mut y = candidate(b, 5, 0.0);
        if y.amenity_id < x.amenity_id {
            std::mem::swap(&mut x, &mut y);
        }
        assert_eq!(pick_nearest([y, x]), Some(x));
    }

    #[test]
    fn test_partitioned_per_building() {
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let winners = select_nearest([candidate(b1, 1, 3.0), candidate(b2, 2, 1.0)]);
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[&b1].amenity_osm_id, 1);
        assert_eq!(winners[&b2].amenity_osm_id, 2);
    }

    #[test]
    fn test_empty() {
        assert!(select_nearest(Vec::new()).is_empty());
        assert!(pick_nearest(Vec::new()).is_none());
    }
}
