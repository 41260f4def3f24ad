// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit scaling of parsed geometry.
//!
//! SOSI coordinates are stored in file units; the header's `...ENHET`
//! factor converts them to ground units. The scaler runs exactly once per
//! parse, after the scan, over every emitted geometry. Heights are metric
//! already and stay untouched. Zero or negative factors pass through
//! unvalidated, matching the source format's behavior.

use tracing::debug;

use crate::model::Document;

/// Apply the document's unit scale to all object geometry, origin-anchored
/// at (0, 0). A factor of exactly 1.0 is a no-op.
pub fn apply_unit_scale(document: &mut Document) {
    let factor = document.header.enhet;
    if factor == 1.0 {
        return;
    }
    debug!(factor, objects = document.objects.len(), "applying unit scale");
    for object in &mut document.objects {
        for coord in object.geometry.coords_mut() {
            coord.east *= factor;
            coord.north *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttributeMap, Coord, CurveTable, Extent, Geometry, HeaderMetadata, ObjectKind,
        SpatialObject,
    };
    use rustc_hash::{FxHashMap, FxHashSet};

    fn document_with(enhet: f64, geometry: Geometry) -> Document {
        Document {
            header: HeaderMetadata {
                enhet,
                ..HeaderMetadata::default()
            },
            objects: vec![SpatialObject {
                object_id: 0,
                kind: ObjectKind::Curve,
                serial: None,
                attributes: AttributeMap::new(),
                geometry,
                raw_lines: String::new(),
                curve_id: None,
            }],
            extent: Extent::new(),
            curve_table: CurveTable::default(),
            raw_index: FxHashMap::default(),
            attribute_names: FxHashSet::default(),
            record_count: 1,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_planar_axes_scaled_height_untouched() {
        let mut doc = document_with(
            0.01,
            Geometry::Curve(vec![Coord::with_height(100.0, 200.0, 12.5)]),
        );
        apply_unit_scale(&mut doc);
        let coords = doc.objects[0].geometry.coords();
        assert_eq!(coords[0], Coord::with_height(1.0, 2.0, 12.5));
    }

    #[test]
    fn test_unity_factor_is_noop() {
        let mut doc = document_with(1.0, Geometry::Point(Coord::new(100.0, 200.0)));
        apply_unit_scale(&mut doc);
        assert_eq!(
            doc.objects[0].geometry,
            Geometry::Point(Coord::new(100.0, 200.0))
        );
    }

    #[test]
    fn test_negative_factor_passes_through() {
        let mut doc = document_with(-2.0, Geometry::Point(Coord::new(1.0, 2.0)));
        apply_unit_scale(&mut doc);
        assert_eq!(
            doc.objects[0].geometry,
            Geometry::Point(Coord::new(-2.0, -4.0))
        );
    }
}
