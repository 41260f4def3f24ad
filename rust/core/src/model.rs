// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model for parsed SOSI documents.
//!
//! A [`Document`] is built once by a single forward pass over a file and is
//! read-only thereafter. Callers that want to write edited data derive a new
//! record collection and hand it to [`crate::writer::SosiWriter`] together
//! with the original header metadata and raw-line index.

use rustc_hash::{FxHashMap, FxHashSet};

/// A planar coordinate, stored as (easting, northing) = (x, y).
///
/// SOSI files carry northing first; the scanner applies the axis swap on
/// capture. After normalization `height` is uniformly `Some` or `None`
/// within one object.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub east: f64,
    pub north: f64,
    pub height: Option<f64>,
}

impl Coord {
    pub fn new(east: f64, north: f64) -> Self {
        Self {
            east,
            north,
            height: None,
        }
    }

    pub fn with_height(east: f64, north: f64, height: f64) -> Self {
        Self {
            east,
            north,
            height: Some(height),
        }
    }
}

/// Kind of spatial object, per geometry marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectKind {
    Point,
    Curve,
    Surface,
}

impl ObjectKind {
    /// The marker token that opens a record of this kind.
    pub fn marker(&self) -> &'static str {
        match self {
            ObjectKind::Point => ".PUNKT",
            ObjectKind::Curve => ".KURVE",
            ObjectKind::Surface => ".FLATE",
        }
    }
}

/// Resolved geometry of a spatial object.
///
/// A `Surface` holds its assembled boundary ring; closure is not verified
/// and unresolved curve references may leave it open or self-intersecting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    Point(Coord),
    Curve(Vec<Coord>),
    Surface(Vec<Coord>),
}

impl Geometry {
    /// All coordinates of this geometry, mutably. Used by the unit scaler.
    pub(crate) fn coords_mut(&mut self) -> &mut [Coord] {
        match self {
            Geometry::Point(c) => std::slice::from_mut(c),
            Geometry::Curve(cs) | Geometry::Surface(cs) => cs,
        }
    }

    /// All coordinates of this geometry.
    pub fn coords(&self) -> &[Coord] {
        match self {
            Geometry::Point(c) => std::slice::from_ref(c),
            Geometry::Curve(cs) | Geometry::Surface(cs) => cs,
        }
    }
}

/// Insertion-ordered attribute mapping with explicit absent values.
///
/// Keys are whatever was present in one object, not a global superset. A
/// key with no value on its line is stored as `None`, never as a sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeMap {
    entries: Vec<(String, Option<String>)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Value for `key`; outer `None` means the key is absent entirely.
    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Present value for `key`, flattening the absent-value case.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// One parsed spatial object that yielded usable geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpatialObject {
    /// Sequential id in file order, shared with the raw-line index.
    pub object_id: u64,
    pub kind: ObjectKind,
    /// Serial token from the marker line (`.KURVE 123:` yields `"123"`).
    pub serial: Option<String>,
    pub attributes: AttributeMap,
    pub geometry: Geometry,
    /// Verbatim original text block, including line terminators.
    pub raw_lines: String,
    /// Identifier other surfaces reference; curves only.
    pub curve_id: Option<String>,
}

/// Document-level metadata from the `.HODE` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderMetadata {
    /// Unit scale from `...ENHET`. Mandatory; parsing fails without it.
    pub enhet: f64,
    pub vert_datum: Option<String>,
    pub koordsys: Option<String>,
    pub origo_ne: Option<String>,
    pub sosi_versjon: Option<String>,
    pub sosi_niva: Option<String>,
    pub objektkatalog: Option<String>,
    /// Resolved character encoding name (e.g. "UTF-8", "windows-1252").
    pub encoding: String,
}

impl Default for HeaderMetadata {
    fn default() -> Self {
        Self {
            enhet: 1.0,
            vert_datum: None,
            koordsys: None,
            origo_ne: None,
            sosi_versjon: None,
            sosi_niva: None,
            objektkatalog: None,
            encoding: String::from("UTF-8"),
        }
    }
}

/// Planar extent in file axis order (northing, easting).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent {
    pub min_north: f64,
    pub min_east: f64,
    pub max_north: f64,
    pub max_east: f64,
}

impl Extent {
    /// Create new extent initialized to invalid state
    pub fn new() -> Self {
        Self {
            min_north: f64::MAX,
            min_east: f64::MAX,
            max_north: f64::MIN,
            max_east: f64::MIN,
        }
    }

    /// Check if the extent has been expanded at least once
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min_north <= self.max_north && self.min_east <= self.max_east
    }

    /// Expand to include a (northing, easting) pair
    #[inline]
    pub fn expand(&mut self, north: f64, east: f64) {
        self.min_north = self.min_north.min(north);
        self.min_east = self.min_east.min(east);
        self.max_north = self.max_north.max(north);
        self.max_east = self.max_east.max(east);
    }

    /// Smallest extent covering both operands
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_north: self.min_north.min(other.min_north),
            min_east: self.min_east.min(other.min_east),
            max_north: self.max_north.max(other.max_north),
            max_east: self.max_east.max(other.max_east),
        }
    }

    /// Extent of a record collection's geometry.
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a SpatialObject>) -> Extent {
        let mut extent = Extent::new();
        for object in objects {
            for coord in object.geometry.coords() {
                extent.expand(coord.north, coord.east);
            }
        }
        extent
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::new()
    }
}

/// Soft conditions accumulated during parse or write.
///
/// These never abort the pipeline; they are the return-side counterpart of
/// the `tracing` warnings emitted at the same points.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    /// Encoding detection fell back instead of honoring a declaration
    EncodingFallback { detail: String },
    /// Replay found no captured raw lines for a record
    MissingRawLines { object_id: u64 },
    /// Replay saw the same object id twice; later occurrences are skipped
    DuplicateObjectId { object_id: u64 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::EncodingFallback { detail } => {
                write!(f, "encoding fallback: {detail}")
            }
            Warning::MissingRawLines { object_id } => {
                write!(f, "no raw lines captured for object {object_id}")
            }
            Warning::DuplicateObjectId { object_id } => {
                write!(f, "object {object_id} already written, skipping")
            }
        }
    }
}

/// Mapping of curve identifier to its coordinate chain, built strictly in
/// encounter order during the scan.
pub type CurveTable = FxHashMap<String, Vec<Coord>>;

/// Per-object verbatim raw-line capture keyed by `object_id`.
pub type RawLineIndex = FxHashMap<u64, String>;

/// A fully parsed SOSI document. Immutable once parsing completes.
#[derive(Debug, Clone)]
pub struct Document {
    pub header: HeaderMetadata,
    /// Records that emitted usable geometry, in file order.
    pub objects: Vec<SpatialObject>,
    /// Declared extent from the `..OMRÅDE` header block.
    pub extent: Extent,
    /// Curve chains registered during the scan; later writes need them.
    pub curve_table: CurveTable,
    /// Raw-line capture for every record, geometry-bearing or not.
    pub raw_index: RawLineIndex,
    /// Every attribute key seen anywhere in the document.
    pub attribute_names: FxHashSet<String>,
    /// Number of object ids assigned; ids are dense `0..record_count`.
    pub record_count: u64,
    /// Soft conditions encountered during the parse.
    pub warnings: Vec<Warning>,
}
