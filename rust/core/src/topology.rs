// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface boundary assembly from curve references.
//!
//! Surfaces do not carry their own boundary coordinates; they reference
//! curves by id. The curve table is populated incrementally as curves are
//! finalized, so a reference to a curve appearing later in the file will
//! not resolve. That ordering contract comes with the format and is not a
//! bug to repair here.

use tracing::debug;

use crate::model::{Coord, CurveTable, Geometry};

/// Assemble a surface's geometry from its ordered curve references.
///
/// Referenced chains are concatenated in listed order; ids missing from
/// the table (including forward references) are skipped without error and
/// the resulting ring may be open or self-intersecting. When nothing
/// resolves, the surface degrades to a point at its own first captured
/// coordinate, if it has one.
pub fn resolve_surface_boundary(
    refs: &[String],
    table: &CurveTable,
    own_coords: &[Coord],
) -> Option<Geometry> {
    let mut ring: Vec<Coord> = Vec::new();
    for curve_id in refs {
        match table.get(curve_id.as_str()) {
            Some(chain) => ring.extend_from_slice(chain),
            None => debug!(curve_id = %curve_id, "unresolved curve reference, skipping"),
        }
    }

    if !ring.is_empty() {
        return Some(Geometry::Surface(ring));
    }
    own_coords.first().map(|c| Geometry::Point(*c))
}
