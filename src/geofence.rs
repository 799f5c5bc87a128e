//! Monitoring region
//!
//! A geofence here is a closed polygon over (lat, lon) vertices. Containment is
//! boundary-inclusive: a vessel exactly on an edge or vertex counts as inside.

use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Area, Coord, Intersects, Line, LineString, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a proposed region was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("region needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),
    #[error("vertex {index} is not a valid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        index: usize,
        latitude: f64,
        longitude: f64,
    },
    #[error("region boundary crosses itself between edges {0} and {1}")]
    SelfIntersecting(usize, usize),
    #[error("region encloses no area (vertices are collinear)")]
    Degenerate,
}

/// Smallest enclosed area accepted, in square degrees (roughly a square metre)
const MIN_REGION_AREA: f64 = 1e-10;

/// A closed, simple polygon being monitored
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRegion {
    /// Closed ring of (lat, lon) pairs, first == last
    vertices: Vec<(f64, f64)>,
    polygon: Polygon<f64>,
}

impl GeoRegion {
    /// Build a region from (lat, lon) vertices
    ///
    /// The ring is closed automatically if the last vertex differs from the first.
    pub fn new(vertices: &[(f64, f64)]) -> Result<Self, RegionError> {
        for (index, &(latitude, longitude)) in vertices.iter().enumerate() {
            let valid = latitude.is_finite()
                && longitude.is_finite()
                && (-90.0..=90.0).contains(&latitude)
                && (-180.0..=180.0).contains(&longitude);
            if !valid {
                return Err(RegionError::InvalidCoordinate {
                    index,
                    latitude,
                    longitude,
                });
            }
        }

        let mut ring: Vec<(f64, f64)> = Vec::with_capacity(vertices.len() + 1);
        for &vertex in vertices {
            // Consecutive repeats add nothing to the boundary
            if ring.last() != Some(&vertex) {
                ring.push(vertex);
            }
        }
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        let mut distinct = ring.clone();
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(RegionError::TooFewVertices(distinct.len()));
        }

        ring.push(ring[0]);
        check_simple(&ring)?;

        let exterior: LineString<f64> = ring
            .iter()
            .map(|&(lat, lon)| Coord { x: lon, y: lat })
            .collect();
        let polygon = Polygon::new(exterior, vec![]);
        if polygon.unsigned_area() < MIN_REGION_AREA {
            return Err(RegionError::Degenerate);
        }

        Ok(Self {
            vertices: ring,
            polygon,
        })
    }

    /// Whether (lat, lon) is inside the region; points on the boundary count as inside
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        let coord = Coord {
            x: longitude,
            y: latitude,
        };
        matches!(
            self.polygon.coordinate_position(&coord),
            CoordPos::Inside | CoordPos::OnBoundary
        )
    }

    /// The closed ring as (lat, lon) pairs
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }
}

/// Reject rings whose non-adjacent edges touch or cross
fn check_simple(ring: &[(f64, f64)]) -> Result<(), RegionError> {
    let edges: Vec<Line<f64>> = ring
        .windows(2)
        .map(|w| {
            Line::new(
                Coord {
                    x: w[0].1,
                    y: w[0].0,
                },
                Coord {
                    x: w[1].1,
                    y: w[1].0,
                },
            )
        })
        .collect();

    let n = edges.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // First and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return Err(RegionError::SelfIntersecting(i, j));
            }
        }
    }
    Ok(())
}

/// Region as stored in configuration and returned to operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    /// `[lat, lon]` pairs
    pub vertices: Vec<[f64; 2]>,
}

impl RegionDefinition {
    pub fn to_region(&self) -> Result<GeoRegion, RegionError> {
        let vertices: Vec<(f64, f64)> = self.vertices.iter().map(|v| (v[0], v[1])).collect();
        GeoRegion::new(&vertices)
    }
}

impl From<&GeoRegion> for RegionDefinition {
    fn from(region: &GeoRegion) -> Self {
        Self {
            vertices: region.vertices.iter().map(|&(lat, lon)| [lat, lon]).collect(),
        }
    }
}

/// Default watch area: the Chesapeake and the mid-Atlantic coast
pub fn default_region_vertices() -> Vec<[f64; 2]> {
    vec![
        [37.5, -78.5],
        [40.5, -77.5],
        [40.5, -74.5],
        [37.0, -75.0],
        [37.5, -78.5],
    ]
}
