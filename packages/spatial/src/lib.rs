#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for crash attribution.
//!
//! Builds an R-tree over census tract polygons and resolves points to the
//! containing tract with an exact point-in-polygon test. The R-tree only
//! narrows candidates by bounding box; containment is always checked
//! against the real polygon.

use equity_audit_tract_models::CensusTract;
use geo::{BoundingRect, Contains, Intersects, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// A tract polygon stored in the R-tree with its identifier.
struct TractEntry {
    tract_id: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for TractEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over a set of census tracts.
///
/// Constructed once per analysis run. The index owns copies of the tract
/// polygons, so it holds no reference back into the caller's tract table.
pub struct TractGeometryIndex {
    tracts: RTree<TractEntry>,
}

impl std::fmt::Debug for TractGeometryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractGeometryIndex")
            .field("tracts", &self.len())
            .finish()
    }
}

impl TractGeometryIndex {
    /// Builds the index from a tract collection.
    ///
    /// Tracts with an empty geometry are skipped with a warning since no
    /// point can ever resolve to them.
    #[must_use]
    pub fn build(tracts: &[CensusTract]) -> Self {
        let mut entries = Vec::with_capacity(tracts.len());

        for tract in tracts {
            let Some(envelope) = compute_envelope(&tract.geometry) else {
                log::warn!("Tract {} has an empty geometry, skipping", tract.tract_id);
                continue;
            };

            entries.push(TractEntry {
                tract_id: tract.tract_id.clone(),
                envelope,
                polygon: tract.geometry.clone(),
            });
        }

        let tracts = RTree::bulk_load(entries);
        log::info!("Loaded {} census tracts into spatial index", tracts.size());

        Self { tracts }
    }

    /// Number of tracts in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracts.size()
    }

    /// Whether the index contains no tracts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracts.size() == 0
    }

    /// Look up the tract containing a point.
    ///
    /// Tracts form an administrative partition, so the first polygon whose
    /// interior contains the point wins. A point on a tract edge lies in no
    /// interior; it resolves to the touching tract with the lowest id.
    #[must_use]
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<&str> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);
        let mut on_boundary: Option<&str> = None;

        for entry in self.tracts.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&point) {
                return Some(&entry.tract_id);
            }
            if entry.polygon.intersects(&point)
                && on_boundary.is_none_or(|id| entry.tract_id.as_str() < id)
            {
                on_boundary = Some(&entry.tract_id);
            }
        }

        on_boundary
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
