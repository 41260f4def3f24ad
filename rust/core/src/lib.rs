// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # SOSI-Lite Core
//!
//! Parser and round-trip writer for the SOSI cadastral/map exchange
//! format, the line-oriented text format used for Norwegian geodata.
//!
//! ## Overview
//!
//! This crate provides the core pipeline:
//!
//! - **Encoding Detection**: resolves the declared `..TEGNSETT` character
//!   set before the real parse, with graceful fallbacks
//! - **Record Scanning**: a single-pass state machine over header and
//!   object blocks, with verbatim raw-line capture per object
//! - **Topology Assembly**: surface boundaries assembled from curve
//!   references in file order
//! - **Unit Scaling**: the header's `...ENHET` factor applied once to all
//!   parsed geometry
//! - **Round-trip Writing**: byte-exact replay of captured object blocks,
//!   or canonical regeneration from edited records
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sosi_lite_core::{parse_file, SosiWriter};
//!
//! let document = parse_file("data.sos")?;
//! for object in &document.objects {
//!     println!("#{} {:?}", object.object_id, object.kind);
//! }
//!
//! // Lossless round trip of the object blocks
//! let mut out = std::fs::File::create("out.sos")?;
//! let warnings = SosiWriter::for_document(&document)
//!     .write_replay(&document.objects, &mut out)?;
//! ```
//!
//! Downstream consumers (tabular assembly, CRS mapping, format export)
//! read the record collection, header metadata, extent and raw-line index
//! through the [`Document`] type; the core never calls into them.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for the parsed data model

pub mod encoding;
pub mod error;
pub mod model;
pub mod scale;
pub mod scanner;
pub mod topology;
pub mod writer;

pub use encoding::{decode, detect_encoding};
pub use error::{Error, Result};
pub use model::{
    AttributeMap, Coord, CurveTable, Document, Extent, Geometry, HeaderMetadata, ObjectKind,
    RawLineIndex, SpatialObject, Warning,
};
pub use scanner::{parse_bytes, parse_file, RecordScanner};
pub use topology::resolve_surface_boundary;
pub use writer::SosiWriter;
