//! Incident-density lookups around points and along paths.
//!
//! Both lookups count incidents inside an axis-aligned box of
//! `±`[`BOX_HALF_SIDE`] degrees around a query point. The box is open: an
//! incident exactly on the edge does not count.

use std::collections::BTreeMap;

use crime_risk_crime_models::IncidentRecord;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::GeoPoint;

/// Half the side length of the lookup box, in degrees.
pub const BOX_HALF_SIDE: f64 = 0.01;

/// Average counts below this are [`RiskLevel::Low`].
pub const LOW_RISK_BELOW: f64 = 3.0;

/// Average counts below this (and not low) are [`RiskLevel::Medium`].
pub const MEDIUM_RISK_BELOW: f64 = 10.0;

#[derive(Debug, Clone)]
struct IndexedIncident {
    hour: u32,
    primary_type: Option<String>,
}

/// An R-tree over incident coordinates with the attributes the lookups need.
pub struct IncidentIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
    incidents: Vec<IndexedIncident>,
}

/// Incidents near a location at a given hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaAdvice {
    pub hour: u32,
    pub total: usize,
    /// Most frequent primary type, ties going to the alphabetically first.
    pub top_type: Option<String>,
}

/// Coarse risk bucket for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Buckets an average incident count.
    #[must_use]
    pub fn from_average(average: f64) -> Self {
        if average < LOW_RISK_BELOW {
            Self::Low
        } else if average < MEDIUM_RISK_BELOW {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Risk summary for a sequence of waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRisk {
    /// Incident count near each waypoint, in order.
    pub counts: Vec<usize>,
    pub average: f64,
    pub level: RiskLevel,
}

impl IncidentIndex {
    /// Indexes every record that has coordinates.
    #[must_use]
    pub fn build(records: &[IncidentRecord]) -> Self {
        use chrono::Timelike as _;

        let mut entries = Vec::new();
        let mut incidents = Vec::new();
        for record in records {
            if let Some((lat, lon)) = record.coordinates() {
                entries.push(GeomWithData::new([lat, lon], incidents.len()));
                incidents.push(IndexedIncident {
                    hour: record.occurred_at.hour(),
                    primary_type: record.primary_type.clone(),
                });
            }
        }
        log::debug!("Indexed {} incidents for risk lookups", incidents.len());
        Self {
            tree: RTree::bulk_load(entries),
            incidents,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    fn near(&self, point: GeoPoint) -> impl Iterator<Item = &IndexedIncident> + '_ {
        let envelope = AABB::from_corners(
            [point.latitude - BOX_HALF_SIDE, point.longitude - BOX_HALF_SIDE],
            [point.latitude + BOX_HALF_SIDE, point.longitude + BOX_HALF_SIDE],
        );
        self.tree
            .locate_in_envelope(&envelope)
            .filter(move |entry| {
                let [lat, lon] = *entry.geom();
                (lat - point.latitude).abs() < BOX_HALF_SIDE
                    && (lon - point.longitude).abs() < BOX_HALF_SIDE
            })
            .map(|entry| &self.incidents[entry.data])
    }

    /// Number of incidents near a point.
    #[must_use]
    pub fn count_near(&self, point: GeoPoint) -> usize {
        self.near(point).count()
    }

    /// Incidents near a point that occurred during `hour`.
    #[must_use]
    pub fn area_advice(&self, point: GeoPoint, hour: u32) -> AreaAdvice {
        let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
        let mut total = 0;
        for incident in self.near(point).filter(|i| i.hour == hour) {
            total += 1;
            if let Some(primary_type) = &incident.primary_type {
                *by_type.entry(primary_type).or_default() += 1;
            }
        }

        let mut top: Option<(&str, usize)> = None;
        for (name, count) in by_type {
            if top.is_none_or(|(_, best)| count > best) {
                top = Some((name, count));
            }
        }

        AreaAdvice {
            hour,
            total,
            top_type: top.map(|(name, _)| name.to_string()),
        }
    }

    /// Average nearby-incident count over caller-supplied waypoints.
    ///
    /// Returns `None` for an empty path.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn path_risk(&self, waypoints: &[GeoPoint]) -> Option<PathRisk> {
        if waypoints.is_empty() {
            return None;
        }
        let counts: Vec<usize> = waypoints.iter().map(|&p| self.count_near(p)).collect();
        let average = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        Some(PathRisk {
            counts,
            average,
            level: RiskLevel::from_average(average),
        })
    }
}
