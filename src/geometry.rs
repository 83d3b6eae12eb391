//! Minimal planar geometry for search hits.
//!
//! Hits arrive either as ready-made coordinate pairs (geocoders) or as
//! nested ring arrays decoded from GML (WFS backends, vector features on
//! the map). This module reconstructs typed geometry from those arrays
//! and derives a representative coordinate for marker placement.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Geometry kinds understood by the search hit payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    /// Parse a kind tag as it appears in wire payloads (`"Polygon"`, …).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Point" => Some(Self::Point),
            "LineString" => Some(Self::LineString),
            "Polygon" => Some(Self::Polygon),
            "MultiPolygon" => Some(Self::MultiPolygon),
            _ => None,
        }
    }
}

/// Typed geometry with GeoJSON-style nesting: positions are `[x, y]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Vec<f64>),
    LineString(Vec<Vec<f64>>),
    /// Rings of positions, outer ring first.
    Polygon(Vec<Vec<Vec<f64>>>),
    /// Polygon parts, each rings of positions, outer ring first.
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

/// Geometry descriptor as carried inside a hit payload: a kind tag plus
/// flat coordinate runs, grouped part → ring → `x y x y …`.
///
/// A point is one part with one single-pair run; a polygon is one part
/// whose runs are its rings (outer first); a multi-polygon has one part
/// per member polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitGeometry {
    pub kind: GeometryKind,
    pub parts: Vec<Vec<Vec<f64>>>,
}

impl HitGeometry {
    /// Reconstruct typed geometry from the flat coordinate runs.
    ///
    /// Returns `None` when the runs do not carry enough coordinates for
    /// the declared kind (odd-length runs lose their trailing value).
    pub fn reconstruct(&self) -> Option<Geometry> {
        match self.kind {
            GeometryKind::Point => {
                let run = self.parts.first()?.first()?;
                let pos = pairs(run).into_iter().next()?;
                Some(Geometry::Point(pos))
            }
            GeometryKind::LineString => {
                let run = self.parts.first()?.first()?;
                let line = pairs(run);
                if line.len() < 2 {
                    return None;
                }
                Some(Geometry::LineString(line))
            }
            GeometryKind::Polygon => {
                let part = self.parts.first()?;
                let rings: Vec<Vec<Vec<f64>>> = part.iter().map(|run| pairs(run)).collect();
                if rings.is_empty() || rings[0].len() < 3 {
                    return None;
                }
                Some(Geometry::Polygon(rings))
            }
            GeometryKind::MultiPolygon => {
                let polygons: Vec<Vec<Vec<Vec<f64>>>> = self
                    .parts
                    .iter()
                    .map(|part| part.iter().map(|run| pairs(run)).collect())
                    .collect();
                if polygons.is_empty() {
                    return None;
                }
                Some(Geometry::MultiPolygon(polygons))
            }
        }
    }
}

/// Split a flat `x y x y …` run into positions. A trailing unpaired
/// value is dropped.
fn pairs(run: &[f64]) -> Vec<Vec<f64>> {
    run.chunks_exact(2).map(|c| vec![c[0], c[1]]).collect()
}

/// Vertex-average centroid over every position of the geometry.
pub fn centroid(geometry: &Geometry) -> Option<Vec<f64>> {
    let mut sum = [0.0, 0.0];
    let mut count = 0usize;
    let mut add = |pos: &[f64]| {
        if pos.len() >= 2 {
            sum[0] += pos[0];
            sum[1] += pos[1];
            count += 1;
        }
    };
    match geometry {
        Geometry::Point(pos) => add(pos),
        Geometry::LineString(line) => line.iter().for_each(|p| add(p)),
        Geometry::Polygon(rings) => {
            // Outer ring only: holes must not drag the centroid.
            if let Some(outer) = rings.first() {
                outer.iter().for_each(|p| add(p));
            }
        }
        Geometry::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(outer) = rings.first() {
                    outer.iter().for_each(|p| add(p));
                }
            }
        }
    }
    if count == 0 {
        return None;
    }
    Some(vec![sum[0] / count as f64, sum[1] / count as f64])
}

/// Ray-cast test: is the point inside the ring (boundary excluded)?
fn point_in_ring(point: &[f64], ring: &[Vec<f64>]) -> bool {
    let (x, y) = (point[0], point[1]);
    let mut inside = false;
    let n = ring.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Inside the outer ring and outside every interior ring.
fn point_in_polygon(point: &[f64], rings: &[Vec<Vec<f64>>]) -> bool {
    let Some(outer) = rings.first() else {
        return false;
    };
    if !point_in_ring(point, outer) {
        return false;
    }
    !rings[1..].iter().any(|hole| point_in_ring(point, hole))
}

/// Inside any member polygon.
pub fn point_in_multi_polygon(point: &[f64], polygons: &[Vec<Vec<Vec<f64>>>]) -> bool {
    polygons.iter().any(|rings| point_in_polygon(point, rings))
}

/// A coordinate guaranteed to be usable as a marker position for the
/// geometry.
///
/// Points and lines are deterministic (the position itself, the middle
/// vertex). For polygons the vertex centroid is used whenever it lies
/// inside the geometry — no randomness is invoked in that case. Only
/// when the centroid falls outside (concave or ring-shaped geometry)
/// does the sampler descend randomly through the nested ring arrays
/// until it reaches a leaf coordinate pair, which is always a vertex of
/// the geometry.
pub fn interior_point(geometry: &Geometry) -> Option<Vec<f64>> {
    interior_point_with(geometry, &mut rand::thread_rng())
}

/// [`interior_point`] with an injectable random source.
pub fn interior_point_with<R: Rng>(geometry: &Geometry, rng: &mut R) -> Option<Vec<f64>> {
    match geometry {
        Geometry::Point(pos) => Some(pos.clone()),
        Geometry::LineString(line) => line.get(line.len() / 2).cloned(),
        Geometry::Polygon(rings) => {
            let center = centroid(geometry)?;
            if point_in_polygon(&center, rings) {
                return Some(center);
            }
            random_vertex(&[rings.clone()], rng)
        }
        Geometry::MultiPolygon(polygons) => {
            let center = centroid(geometry)?;
            if point_in_multi_polygon(&center, polygons) {
                return Some(center);
            }
            random_vertex(polygons, rng)
        }
    }
}

/// Recursive random descent into nested ring arrays, terminating at a
/// leaf coordinate pair.
fn random_vertex<R: Rng>(polygons: &[Vec<Vec<Vec<f64>>>], rng: &mut R) -> Option<Vec<f64>> {
    if polygons.is_empty() {
        return None;
    }
    let rings = &polygons[rng.gen_range(0..polygons.len())];
    if rings.is_empty() {
        return None;
    }
    let ring = &rings[rng.gen_range(0..rings.len())];
    if ring.is_empty() {
        return None;
    }
    let pos = &ring[rng.gen_range(0..ring.len())];
    Some(pos.clone())
}
