// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end parse and round-trip tests over realistic SOSI content.

use std::io::Write;

use sosi_lite_core::{parse_bytes, parse_file, Geometry, ObjectKind, SosiWriter};

const SAMPLE: &str = "\
.HODE
..TEGNSETT UTF-8
..TRANSPAR
...ENHET 0.01
...KOORDSYS 22
...ORIGO-NØ 0 0
..OMRÅDE
...MIN-NØ 6550000.00 590000.00
...MAX-NØ 6560000.00 600000.00
..SOSI-VERSJON 4.5
.KURVE 1:
..OBJTYPE Takkant 101
..DATAFANGSTDATO 20240115
..NØ
655000000 59000000
655000100 59000100
.KURVE 2:
..OBJTYPE Takkant 102
..NØ
655000100 59000100
655000000 59000000
.FLATE 3:
..OBJTYPE Bygning
KP 101 102
..NØ
655000050 59000050
.PUNKT 4:
..OBJTYPE Hydrant
..NØ
655000200 59000200
.SLUTT
";

#[test]
fn parses_all_record_kinds() {
    let doc = parse_bytes(SAMPLE.as_bytes()).unwrap();

    assert_eq!(doc.record_count, 4);
    assert_eq!(doc.objects.len(), 4);
    assert_eq!(doc.header.enhet, 0.01);

    let kinds: Vec<ObjectKind> = doc.objects.iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ObjectKind::Curve,
            ObjectKind::Curve,
            ObjectKind::Surface,
            ObjectKind::Point
        ]
    );

    // The surface ring concatenates both referenced curves
    let Geometry::Surface(ring) = &doc.objects[2].geometry else {
        panic!("expected surface");
    };
    assert_eq!(ring.len(), 4);
}

#[test]
fn scaling_applied_exactly_once_per_parse() {
    let doc = parse_bytes(SAMPLE.as_bytes()).unwrap();

    // 655000200 file units at ENHET 0.01 is 6550002.00 ground units
    let Geometry::Point(point) = &doc.objects[3].geometry else {
        panic!("expected point");
    };
    assert_eq!(point.north, 6_550_002.0);
    assert_eq!(point.east, 590_002.0);

    // A second parse of the same bytes yields the same values; scaling is
    // part of the pipeline, not a repeatable public operation
    let again = parse_bytes(SAMPLE.as_bytes()).unwrap();
    assert_eq!(again.objects[3].geometry, doc.objects[3].geometry);
}

#[test]
fn replay_reproduces_object_blocks_byte_for_byte() {
    let doc = parse_bytes(SAMPLE.as_bytes()).unwrap();

    let mut out = Vec::new();
    let warnings = SosiWriter::for_document(&doc)
        .write_replay(&doc.objects, &mut out)
        .unwrap();
    assert!(warnings.is_empty());

    let text = String::from_utf8(out).unwrap();
    // Every object block from the source appears verbatim, in order
    let body_start = SAMPLE.find(".KURVE 1:").unwrap();
    let body = &SAMPLE[body_start..];
    assert!(text.ends_with(body));
}

#[test]
fn replayed_output_reparses_identically() {
    let doc = parse_bytes(SAMPLE.as_bytes()).unwrap();

    let mut out = Vec::new();
    SosiWriter::for_document(&doc)
        .write_replay(&doc.objects, &mut out)
        .unwrap();

    let reparsed = parse_bytes(&out).unwrap();
    assert_eq!(reparsed.record_count, doc.record_count);
    for (a, b) in doc.objects.iter().zip(reparsed.objects.iter()) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.geometry, b.geometry);
        assert_eq!(a.attributes, b.attributes);
        assert_eq!(a.raw_lines, b.raw_lines);
    }
}

#[test]
fn canonical_output_reparses_with_same_geometry() {
    let doc = parse_bytes(SAMPLE.as_bytes()).unwrap();

    let mut out = Vec::new();
    SosiWriter::for_document(&doc)
        .write_canonical(&doc.objects, &mut out)
        .unwrap();

    // Canonical output is a valid SOSI document in its own right. Its
    // ENHET matches the original, so coordinates scale again to the same
    // ground values within rounding.
    let reparsed = parse_bytes(&out).unwrap();
    assert_eq!(reparsed.objects.len(), doc.objects.len());
    let Geometry::Point(original) = &doc.objects[3].geometry else {
        panic!("expected point");
    };
    let Geometry::Point(roundtripped) = &reparsed.objects[3].geometry else {
        panic!("expected point");
    };
    // Canonical lines carry ground units rounded to two decimals, which
    // the re-parse scales by ENHET again
    assert!((roundtripped.north - original.north * doc.header.enhet).abs() < 0.01);
    assert!((roundtripped.east - original.east * doc.header.enhet).abs() < 0.01);
}

#[test]
fn parse_file_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.sos");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
    }

    let doc = parse_file(&path).unwrap();
    assert_eq!(doc.record_count, 4);
    assert_eq!(doc.header.encoding, "UTF-8");
}

#[test]
fn latin1_file_decodes_via_declaration() {
    // Header declares ISO8859-1 and carries a Latin-1 Å byte (0xC5)
    let mut data = Vec::new();
    data.extend_from_slice(b".HODE\n..TEGNSETT ISO8859-1\n..TRANSPAR\n...ENHET 1\n..OMR\xC5DE\n");
    data.extend_from_slice(b".PUNKT 1:\n..OBJTYPE M\xC5L\n..N\xD8\n5 5\n.SLUTT\n");

    let doc = parse_bytes(&data).unwrap();
    assert_eq!(doc.header.encoding, "windows-1252");
    assert_eq!(doc.objects.len(), 1);
    assert_eq!(doc.objects[0].attributes.value("OBJTYPE"), Some("MÅL"));
    assert!(doc.warnings.is_empty());
}

#[test]
fn edited_attributes_replay_original_bytes() {
    // Replay intentionally ignores in-memory edits that did not update
    // the raw buffer: the original block wins
    let doc = parse_bytes(SAMPLE.as_bytes()).unwrap();
    let mut edited = doc.objects.clone();
    edited[3]
        .attributes
        .insert("OBJTYPE", Some("Endret".to_string()));

    let mut out = Vec::new();
    SosiWriter::for_document(&doc)
        .write_replay(&edited, &mut out)
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("..OBJTYPE Hydrant"));
    assert!(!text.contains("Endret"));
}
