// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Round-trip writer for SOSI documents.
//!
//! Two modes. Replay emits the verbatim raw-line blocks captured at parse
//! time, giving byte-identical reproduction of unedited objects; in-memory
//! edits that did not also update the raw buffer are silently ignored.
//! Canonical regeneration derives fresh lines from the in-memory records
//! instead. Both modes write the header and extent blocks from the
//! supplied metadata.

use std::io::Write;

use rustc_hash::FxHashSet;
use tracing::{info, warn};

use crate::model::{
    Document, Extent, Geometry, HeaderMetadata, RawLineIndex, SpatialObject, Warning,
};
use crate::Result;

/// Writer over a (possibly edited) record collection.
///
/// Borrows the header metadata and raw-line index the parse produced;
/// callers hand back their edited records at write time.
pub struct SosiWriter<'a> {
    header: &'a HeaderMetadata,
    extent: Option<Extent>,
    raw_index: Option<&'a RawLineIndex>,
}

impl<'a> SosiWriter<'a> {
    pub fn new(header: &'a HeaderMetadata) -> Self {
        Self {
            header,
            extent: None,
            raw_index: None,
        }
    }

    /// Writer preloaded with a parsed document's metadata, extent and index.
    pub fn for_document(document: &'a Document) -> Self {
        Self {
            header: &document.header,
            extent: document.extent.is_valid().then_some(document.extent),
            raw_index: Some(&document.raw_index),
        }
    }

    /// Use a declared extent instead of computing one from the records.
    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Attach the raw-line index required by replay mode.
    pub fn with_raw_index(mut self, raw_index: &'a RawLineIndex) -> Self {
        self.raw_index = Some(raw_index);
        self
    }

    /// Replay mode: emit each record's captured raw lines verbatim.
    ///
    /// Records without an index entry, and ids already written, are
    /// skipped with a warning, never an error.
    pub fn write_replay<W: Write>(
        &self,
        records: &[SpatialObject],
        out: &mut W,
    ) -> Result<Vec<Warning>> {
        let mut warnings = Vec::new();
        self.write_header(records, out)?;

        let mut written: FxHashSet<u64> = FxHashSet::default();
        let mut ends_with_newline = true;
        for record in records {
            if written.contains(&record.object_id) {
                warn!(object_id = record.object_id, "duplicate object id, skipping");
                warnings.push(Warning::DuplicateObjectId {
                    object_id: record.object_id,
                });
                continue;
            }
            let raw = self
                .raw_index
                .and_then(|index| index.get(&record.object_id));
            match raw {
                Some(block) => {
                    out.write_all(block.as_bytes())?;
                    ends_with_newline = block.ends_with('\n');
                    written.insert(record.object_id);
                }
                None => {
                    warn!(object_id = record.object_id, "no raw lines captured, skipping");
                    warnings.push(Warning::MissingRawLines {
                        object_id: record.object_id,
                    });
                }
            }
        }

        if !ends_with_newline {
            out.write_all(b"\n")?;
        }
        out.write_all(b".SLUTT\n")?;
        info!(
            records = records.len(),
            written = written.len(),
            skipped = warnings.len(),
            "replay write complete"
        );
        Ok(warnings)
    }

    /// Regeneration mode: derive canonical lines from the in-memory records.
    ///
    /// Coordinates are rounded to two decimal places and written back in
    /// the file's (northing, easting) axis order.
    pub fn write_canonical<W: Write>(
        &self,
        records: &[SpatialObject],
        out: &mut W,
    ) -> Result<Vec<Warning>> {
        self.write_header(records, out)?;

        for record in records {
            match &record.serial {
                Some(serial) => writeln!(out, "{} {serial}:", record.kind.marker())?,
                None => writeln!(out, "{} {}:", record.kind.marker(), record.object_id + 1)?,
            }
            for (key, value) in record.attributes.iter() {
                match value {
                    Some(value) => writeln!(out, "..{key} {value}")?,
                    None => writeln!(out, "..{key}")?,
                }
            }
            write_geometry(&record.geometry, out)?;
        }

        out.write_all(b".SLUTT\n")?;
        info!(records = records.len(), "canonical write complete");
        Ok(Vec::new())
    }

    /// Header and extent blocks, always regenerated from metadata.
    fn write_header<W: Write>(&self, records: &[SpatialObject], out: &mut W) -> Result<()> {
        let header = self.header;
        writeln!(out, ".HODE")?;
        writeln!(out, "..TEGNSETT UTF-8")?;
        writeln!(out, "..TRANSPAR")?;
        writeln!(out, "...ENHET {}", header.enhet)?;
        if let Some(vert_datum) = &header.vert_datum {
            writeln!(out, "...VERT-DATUM {vert_datum}")?;
        }
        if let Some(koordsys) = &header.koordsys {
            writeln!(out, "...KOORDSYS {koordsys}")?;
        }
        writeln!(out, "...ORIGO-NØ {}", header.origo_ne.as_deref().unwrap_or("0 0"))?;

        let extent = match self.extent {
            Some(extent) => extent,
            None => Extent::from_objects(records),
        };
        writeln!(out, "..OMRÅDE")?;
        if extent.is_valid() {
            writeln!(out, "...MIN-NØ {:.2} {:.2}", extent.min_north, extent.min_east)?;
            writeln!(out, "...MAX-NØ {:.2} {:.2}", extent.max_north, extent.max_east)?;
        } else {
            writeln!(out, "...MIN-NØ 0.00 0.00")?;
            writeln!(out, "...MAX-NØ 0.00 0.00")?;
        }

        if let Some(version) = &header.sosi_versjon {
            writeln!(out, "..SOSI-VERSJON {version}")?;
        }
        if let Some(level) = &header.sosi_niva {
            writeln!(out, "..SOSI-NIVÅ {level}")?;
        }
        if let Some(catalog) = &header.objektkatalog {
            writeln!(out, "..OBJEKTKATALOG {catalog}")?;
        }
        Ok(())
    }
}

/// Geometry block in canonical form, keyed by kind.
fn write_geometry<W: Write>(geometry: &Geometry, out: &mut W) -> Result<()> {
    let coords = geometry.coords();
    let has_height = coords.iter().any(|c| c.height.is_some());
    writeln!(out, "{}", if has_height { "..NØH" } else { "..NØ" })?;
    for coord in coords {
        match coord.height {
            Some(height) => writeln!(
                out,
                "{:.2} {:.2} {:.2}",
                coord.north, coord.east, height
            )?,
            None => writeln!(out, "{:.2} {:.2}", coord.north, coord.east)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeMap, Coord, ObjectKind};
    use rustc_hash::FxHashMap;

    fn point_record(object_id: u64) -> SpatialObject {
        let mut attributes = AttributeMap::new();
        attributes.insert("OBJTYPE", Some("Mast".to_string()));
        SpatialObject {
            object_id,
            kind: ObjectKind::Point,
            serial: Some((object_id + 1).to_string()),
            attributes,
            geometry: Geometry::Point(Coord::new(2.0, 1.0)),
            raw_lines: String::new(),
            curve_id: None,
        }
    }

    fn header() -> HeaderMetadata {
        HeaderMetadata {
            enhet: 0.01,
            koordsys: Some("22".to_string()),
            sosi_versjon: Some("4.5".to_string()),
            ..HeaderMetadata::default()
        }
    }

    #[test]
    fn test_replay_writes_raw_blocks_verbatim() {
        let block = ".PUNKT 1:\n..OBJTYPE Mast\n..NØ\n100 200\n";
        let mut index: RawLineIndex = FxHashMap::default();
        index.insert(0, block.to_string());

        let header = header();
        let mut out = Vec::new();
        let warnings = SosiWriter::new(&header)
            .with_raw_index(&index)
            .write_replay(&[point_record(0)], &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(warnings.is_empty());
        assert!(text.contains(block));
        assert!(text.ends_with(".SLUTT\n"));
    }

    #[test]
    fn test_replay_skips_missing_and_duplicate_ids() {
        let block = ".PUNKT 1:\n..NØ\n100 200\n";
        let mut index: RawLineIndex = FxHashMap::default();
        index.insert(0, block.to_string());

        let header = header();
        let records = vec![point_record(0), point_record(0), point_record(7)];
        let mut out = Vec::new();
        let warnings = SosiWriter::new(&header)
            .with_raw_index(&index)
            .write_replay(&records, &mut out)
            .unwrap();

        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], Warning::DuplicateObjectId { object_id: 0 }));
        assert!(matches!(warnings[1], Warning::MissingRawLines { object_id: 7 }));

        // The block was written exactly once
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("..NØ\n100 200").count(), 1);
    }

    #[test]
    fn test_header_block_from_metadata() {
        let header = header();
        let mut out = Vec::new();
        SosiWriter::new(&header)
            .write_canonical(&[], &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(".HODE\n..TEGNSETT UTF-8\n..TRANSPAR\n...ENHET 0.01\n"));
        assert!(text.contains("...KOORDSYS 22\n"));
        assert!(text.contains("...ORIGO-NØ 0 0\n"));
        assert!(text.contains("..SOSI-VERSJON 4.5\n"));
        assert!(text.ends_with(".SLUTT\n"));
    }

    #[test]
    fn test_extent_computed_from_records_when_not_supplied() {
        let header = header();
        let mut out = Vec::new();
        SosiWriter::new(&header)
            .write_canonical(&[point_record(0)], &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("...MIN-NØ 1.00 2.00\n"));
        assert!(text.contains("...MAX-NØ 1.00 2.00\n"));
    }

    #[test]
    fn test_canonical_axis_order_and_rounding() {
        let header = header();
        let mut record = point_record(0);
        record.geometry = Geometry::Point(Coord::new(2.555, 1.004));

        let mut out = Vec::new();
        SosiWriter::new(&header)
            .write_canonical(&[record], &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        // Written back as (northing, easting), two decimals
        assert!(text.contains(".PUNKT 1:\n..OBJTYPE Mast\n..NØ\n1.00 2.56\n"));
    }

    #[test]
    fn test_canonical_curve_with_heights() {
        let header = header();
        let mut record = point_record(0);
        record.kind = ObjectKind::Curve;
        record.serial = None;
        record.geometry = Geometry::Curve(vec![
            Coord::with_height(2.0, 1.0, 10.0),
            Coord::with_height(4.0, 3.0, 11.5),
        ]);

        let mut out = Vec::new();
        SosiWriter::new(&header)
            .write_canonical(&[record], &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(".KURVE 1:\n..OBJTYPE Mast\n..NØH\n1.00 2.00 10.00\n3.00 4.00 11.50\n"));
    }
}
