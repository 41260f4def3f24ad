// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Record scanner: the single-pass SOSI state machine.
//!
//! Drives one strictly sequential pass over the decoded lines with no
//! lookahead and no backtracking. Header parsing runs inline while the
//! machine is in header mode; object capture accumulates attributes,
//! coordinates and curve references until the next marker finalizes the
//! block. File order is load-bearing: the curve table grows as curves are
//! finalized, so surfaces can only resolve curves that came before them.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    AttributeMap, Coord, CurveTable, Document, Extent, Geometry, HeaderMetadata, ObjectKind,
    RawLineIndex, SpatialObject, Warning,
};
use crate::topology::resolve_surface_boundary;
use crate::{encoding, scale};

/// End-of-file marker line.
const MARKER_SLUTT: &str = ".SLUTT";
/// Header block marker line.
const MARKER_HODE: &str = ".HODE";

/// Parse a SOSI file from disk.
///
/// Runs the whole pipeline: encoding detection, decode, record scan and
/// unit scaling. Fatal errors abort with no partial document.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Document> {
    let buffer = std::fs::read(path.as_ref())?;
    info!(path = %path.as_ref().display(), bytes = buffer.len(), "parsing SOSI file");
    parse_bytes(&buffer)
}

/// Parse a SOSI document from raw bytes.
pub fn parse_bytes(buffer: &[u8]) -> Result<Document> {
    let (text, resolved, warnings) = encoding::decode(buffer);
    let mut document = RecordScanner::new(&text, resolved.name(), warnings).scan()?;
    scale::apply_unit_scale(&mut document);
    Ok(document)
}

/// Scanner mode, advanced per physical line.
enum ScanState {
    BeforeHeader,
    Header,
    Capturing,
}

/// Working state for the object block currently being captured.
struct Capture {
    kind: ObjectKind,
    /// Serial token from the marker line, trailing `:` stripped.
    serial: Option<String>,
    attributes: AttributeMap,
    coords: Vec<Coord>,
    /// Ordered curve references collected for surfaces.
    refs: Vec<String>,
    /// Dimension of the open coordinate block, if one is open.
    expecting: Option<usize>,
    /// Last declared coordinate dimension; sticky across block breaks.
    dim: Option<usize>,
    /// Trailing `...KP` annotation from a coordinate line.
    kp: Option<String>,
    /// Verbatim text of the block, line terminators included.
    raw: String,
}

impl Capture {
    fn open(kind: ObjectKind, marker_line: &str, raw_line: &str) -> Self {
        // `.KURVE 123:` carries the object serial after the marker
        let serial = marker_line
            .split_whitespace()
            .nth(1)
            .map(|token| token.trim_end_matches(':').to_string())
            .filter(|token| !token.is_empty());
        Self {
            kind,
            serial,
            attributes: AttributeMap::new(),
            coords: Vec::new(),
            refs: Vec::new(),
            expecting: None,
            dim: None,
            kp: None,
            raw: raw_line.to_string(),
        }
    }
}

/// The state machine over decoded lines.
pub struct RecordScanner<'a> {
    content: &'a str,
    encoding_name: &'a str,
    warnings: Vec<Warning>,
}

impl<'a> RecordScanner<'a> {
    pub fn new(content: &'a str, encoding_name: &'a str, warnings: Vec<Warning>) -> Self {
        Self {
            content,
            encoding_name,
            warnings,
        }
    }

    /// Run the scan to completion, producing an unscaled document.
    pub fn scan(self) -> Result<Document> {
        let mut state = ScanState::BeforeHeader;
        let mut capture: Option<Capture> = None;

        let mut enhet: Option<f64> = None;
        let mut header = HeaderMetadata {
            encoding: self.encoding_name.to_string(),
            ..HeaderMetadata::default()
        };
        let mut current_section: Option<String> = None;
        let mut extent = Extent::new();

        let mut objects: Vec<SpatialObject> = Vec::new();
        let mut curve_table = CurveTable::default();
        let mut raw_index: RawLineIndex = FxHashMap::default();
        let mut attribute_names: FxHashSet<String> = FxHashSet::default();
        let mut next_object_id: u64 = 0;

        for (line_index, raw_line) in self.content.split_inclusive('\n').enumerate() {
            let line_number = line_index + 1;
            let line = raw_line.trim();

            // Comments are ignored in every state
            if line.starts_with('!') {
                continue;
            }

            if line == MARKER_HODE {
                state = ScanState::Header;
                continue;
            }

            if let Some(kind) = marker_kind(line) {
                if let Some(open) = capture.take() {
                    finalize_object(
                        open,
                        line_number,
                        &mut next_object_id,
                        &mut objects,
                        &mut curve_table,
                        &mut raw_index,
                        &mut attribute_names,
                    )?;
                }
                match kind {
                    None => break, // .SLUTT ends the scan
                    Some(kind) => {
                        capture = Some(Capture::open(kind, line, raw_line));
                        state = ScanState::Capturing;
                    }
                }
                continue;
            }

            match state {
                ScanState::BeforeHeader => {}
                ScanState::Header => {
                    parse_header_line(
                        line,
                        &mut current_section,
                        &mut enhet,
                        &mut header,
                        &mut extent,
                    );
                }
                ScanState::Capturing => {
                    let open = capture.as_mut().expect("capture open in Capturing state");
                    open.raw.push_str(raw_line);
                    parse_object_line(open, line, line_number, &mut attribute_names)?;
                }
            }
        }

        // Trailing block before EOF without .SLUTT still counts
        if let Some(open) = capture.take() {
            let last_line = self.content.lines().count();
            finalize_object(
                open,
                last_line,
                &mut next_object_id,
                &mut objects,
                &mut curve_table,
                &mut raw_index,
                &mut attribute_names,
            )?;
        }

        match enhet {
            Some(scale) => header.enhet = scale,
            None => return Err(Error::MissingRequiredField { field: "ENHET" }),
        }

        info!(
            records = next_object_id,
            geometries = objects.len(),
            enhet = header.enhet,
            "scan complete"
        );

        Ok(Document {
            header,
            objects,
            extent,
            curve_table,
            raw_index,
            attribute_names,
            record_count: next_object_id,
            warnings: self.warnings,
        })
    }
}

/// Classify a marker line. `Some(None)` is the terminator.
#[allow(clippy::option_option)]
fn marker_kind(line: &str) -> Option<Option<ObjectKind>> {
    if line.starts_with(".KURVE") {
        Some(Some(ObjectKind::Curve))
    } else if line.starts_with(".PUNKT") {
        Some(Some(ObjectKind::Point))
    } else if line.starts_with(".FLATE") {
        Some(Some(ObjectKind::Surface))
    } else if line.starts_with(MARKER_SLUTT) {
        Some(None)
    } else {
        None
    }
}

/// One line of the `.HODE` block.
///
/// Two-dot lines select the current subsection (and may carry a top-level
/// value); three-dot lines are key/value pairs scoped to that subsection.
/// Unrecognized subsections and keys are ignored.
fn parse_header_line(
    line: &str,
    current_section: &mut Option<String>,
    enhet: &mut Option<f64>,
    header: &mut HeaderMetadata,
    extent: &mut Extent,
) {
    if let Some(rest) = line.strip_prefix("...") {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let key = parts.next().unwrap_or("");
        let value = parts.next().map(str::trim).unwrap_or("");

        match current_section.as_deref() {
            Some("TRANSPAR") => match key {
                "ENHET" => {
                    if let Ok(scale) = fast_float::parse::<f64, _>(value) {
                        debug!(enhet = scale, "found unit scale");
                        *enhet = Some(scale);
                    }
                }
                "VERT-DATUM" => header.vert_datum = Some(value.to_string()),
                "KOORDSYS" => header.koordsys = Some(value.to_string()),
                "ORIGO-NØ" => header.origo_ne = Some(value.to_string()),
                _ => {}
            },
            Some("OMRÅDE") => {
                if key == "MIN-NØ" || key == "MAX-NØ" {
                    let mut fields = value.split_whitespace();
                    let north = fields.next().and_then(|t| fast_float::parse::<f64, _>(t).ok());
                    let east = fields.next().and_then(|t| fast_float::parse::<f64, _>(t).ok());
                    if let (Some(north), Some(east)) = (north, east) {
                        extent.expand(north, east);
                    }
                }
            }
            _ => {}
        }
    } else if let Some(rest) = line.strip_prefix("..") {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let key = parts.next().unwrap_or("");
        let value = parts.next().map(str::trim);

        match key {
            "SOSI-VERSJON" => header.sosi_versjon = value.map(String::from),
            "SOSI-NIVÅ" => header.sosi_niva = value.map(String::from),
            "OBJEKTKATALOG" => header.objektkatalog = value.map(String::from),
            _ => {}
        }
        *current_section = Some(key.to_string());
    }
}

/// One line inside an object capture, after the raw append.
fn parse_object_line(
    capture: &mut Capture,
    line: &str,
    line_number: usize,
    attribute_names: &mut FxHashSet<String>,
) -> Result<()> {
    if let Some(rest) = line.strip_prefix("..") {
        // Strip any extra leading dots so `...KP` keys as `KP`
        let rest = rest.trim_start_matches('.');
        let mut parts = rest.splitn(2, char::is_whitespace);
        let key = parts.next().unwrap_or("");
        let value = parts.next().map(str::trim);

        match key {
            "NØ" => {
                capture.expecting = Some(2);
                capture.dim = Some(2);
            }
            "NØH" => {
                capture.expecting = Some(3);
                capture.dim = Some(3);
            }
            _ => {
                capture.expecting = None;
                attribute_names.insert(key.to_string());
                capture
                    .attributes
                    .insert(key, value.filter(|v| !v.is_empty()).map(String::from));
            }
        }
        return Ok(());
    }

    if !line.starts_with('.') {
        if let Some(dim) = capture.expecting {
            parse_coordinate_line(capture, line, line_number, dim)?;
        } else if capture.kind == ObjectKind::Surface {
            // Boundary reference line: `KP <id> [<id> ...]`
            let mut tokens = line.split_whitespace();
            if tokens.next() == Some("KP") {
                capture.refs.extend(tokens.map(String::from));
            }
        }
        return Ok(());
    }

    // Single-dot line other than a marker closes an open coordinate block
    capture.expecting = None;
    Ok(())
}

/// A coordinate line under an open `..NØ`/`..NØH` block.
///
/// File order is (northing, easting[, height]); storage order is
/// (easting, northing) = (x, y). Tokens beyond `dim` are ignored for
/// geometry but may carry a `...KP` annotation.
fn parse_coordinate_line(
    capture: &mut Capture,
    line: &str,
    line_number: usize,
    dim: usize,
) -> Result<()> {
    let mut fields: SmallVec<[f64; 3]> = SmallVec::new();
    for token in line.split_whitespace().take(dim) {
        let value = fast_float::parse::<f64, _>(token).map_err(|_| Error::MalformedCoordinate {
            line: line_number,
            text: line.to_string(),
        })?;
        fields.push(value);
    }
    if fields.len() < dim {
        return Err(Error::MalformedCoordinate {
            line: line_number,
            text: line.to_string(),
        });
    }

    let coord = if dim == 3 {
        Coord::with_height(fields[1], fields[0], fields[2])
    } else {
        Coord::new(fields[1], fields[0])
    };
    capture.coords.push(coord);

    if let Some(pos) = line.find("...KP") {
        let annotation = line[pos + 5..].trim();
        if !annotation.is_empty() {
            capture.kp = Some(annotation.to_string());
        }
    }
    Ok(())
}

/// Make an object's coordinate list dimensionally uniform.
///
/// Any 2D entry forces the whole list to 2D; otherwise a declared 3D block
/// keeps its heights. Values stay in raw file units.
fn normalize_coordinates(coords: &mut [Coord], declared_dim: Option<usize>) {
    let has_2d = coords.iter().any(|c| c.height.is_none());
    if has_2d || declared_dim != Some(3) {
        for coord in coords.iter_mut() {
            coord.height = None;
        }
    }
}

/// Finalize a captured object block.
///
/// Records the raw-line buffer under the next object id unconditionally,
/// then emits a geometry record when the kind-specific conditions hold.
fn finalize_object(
    mut capture: Capture,
    line_number: usize,
    next_object_id: &mut u64,
    objects: &mut Vec<SpatialObject>,
    curve_table: &mut CurveTable,
    raw_index: &mut RawLineIndex,
    attribute_names: &mut FxHashSet<String>,
) -> Result<()> {
    let object_id = *next_object_id;
    *next_object_id += 1;

    normalize_coordinates(&mut capture.coords, capture.dim);

    if let Some(kp) = capture.kp.take() {
        attribute_names.insert("KP".to_string());
        capture.attributes.insert("KP", Some(kp));
    }

    raw_index.insert(object_id, capture.raw.clone());

    let geometry = match capture.kind {
        ObjectKind::Curve => {
            if capture.coords.is_empty() || capture.attributes.is_empty() {
                return Ok(());
            }
            let curve_id = derive_curve_id(&capture.attributes, object_id, line_number)?;
            curve_table.insert(curve_id.clone(), capture.coords.clone());
            objects.push(SpatialObject {
                object_id,
                kind: ObjectKind::Curve,
                serial: capture.serial,
                attributes: capture.attributes,
                geometry: Geometry::Curve(capture.coords),
                raw_lines: capture.raw,
                curve_id: Some(curve_id),
            });
            return Ok(());
        }
        ObjectKind::Point => {
            if capture.coords.len() != 1 {
                debug!(
                    object_id,
                    coords = capture.coords.len(),
                    "point without exactly one coordinate, no geometry emitted"
                );
                return Ok(());
            }
            Geometry::Point(capture.coords[0])
        }
        ObjectKind::Surface => {
            if capture.attributes.is_empty() {
                return Ok(());
            }
            match resolve_surface_boundary(&capture.refs, curve_table, &capture.coords) {
                Some(geometry) => geometry,
                None => return Ok(()),
            }
        }
    };

    objects.push(SpatialObject {
        object_id,
        kind: capture.kind,
        serial: capture.serial,
        attributes: capture.attributes,
        geometry,
        raw_lines: capture.raw,
        curve_id: None,
    });
    Ok(())
}

/// Curve identifier: last whitespace token of `OBJTYPE`, or a synthetic id
/// for records explicitly marked historical with `..ENDRET H`.
fn derive_curve_id(
    attributes: &AttributeMap,
    object_id: u64,
    line_number: usize,
) -> Result<String> {
    if let Some(objtype) = attributes.value("OBJTYPE") {
        if let Some(token) = objtype.split_whitespace().last() {
            return Ok(token.to_string());
        }
    }
    if attributes.value("ENDRET") == Some("H") {
        return Ok(format!("curve_{object_id}"));
    }
    Err(Error::MissingCurveIdentifier { line: line_number })
}
