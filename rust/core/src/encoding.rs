// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Character encoding detection for SOSI files.
//!
//! A SOSI file declares its own character set on a `..TEGNSETT` line inside
//! the header, but the declaration sits in a file whose encoding is exactly
//! what is still unknown. The sniff therefore runs before the real parse:
//! first as a UTF-8 scan (BOM tolerated), then as a Latin-1 retry if the
//! UTF-8 scan hits undecodable bytes. This phase degrades gracefully and
//! never fails the parse.

use encoding_rs::{Encoding, ISO_8859_10, UTF_8, WINDOWS_1252};
use tracing::{debug, warn};

use crate::model::Warning;

/// UTF-8 BOM: EF BB BF
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Header key carrying the declared character set.
const TEGNSETT_KEY: &str = "..TEGNSETT";

/// Map a declared TEGNSETT code to a decoder.
///
/// Unrecognized codes keep the UTF-8 default. The `iso-8859-1` label
/// resolves to windows-1252 per the Encoding Standard, which is a decoding
/// superset and matches how `ANSI` files are produced in practice.
fn encoding_for_code(code: &str) -> &'static Encoding {
    match code {
        "ISO8859-10" => ISO_8859_10,
        "ISO8859-1" => WINDOWS_1252,
        "UTF-8" => UTF_8,
        "ANSI" => WINDOWS_1252,
        _ => UTF_8,
    }
}

/// Split a buffer into lines without allocating, line terminators excluded.
fn lines(buffer: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = buffer;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match memchr::memchr(b'\n', rest) {
            Some(pos) => {
                let mut line = &rest[..pos];
                if line.ends_with(b"\r") {
                    line = &line[..line.len() - 1];
                }
                rest = &rest[pos + 1..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = &[];
                Some(line)
            }
        }
    })
}

/// Outcome of one scan attempt over the header lines.
enum Sniff {
    /// `..TEGNSETT <code>` found; holds the declared code
    Declared(String),
    /// A geometry marker was reached without any declaration
    NotDeclared,
    /// A line failed to decode under the attempted scheme
    DecodeFailed,
}

/// Scan decoded header lines for the TEGNSETT declaration.
///
/// `decode_line` turns raw bytes into text, or `None` if the bytes are not
/// valid under the attempted scheme.
fn sniff_declaration<'a>(
    buffer: &'a [u8],
    decode_line: impl Fn(&'a [u8]) -> Option<std::borrow::Cow<'a, str>>,
) -> Sniff {
    for (idx, mut raw) in lines(buffer).enumerate() {
        if idx == 0 && raw.starts_with(UTF8_BOM) {
            raw = &raw[UTF8_BOM.len()..];
        }
        let line = match decode_line(raw) {
            Some(text) => text,
            None => return Sniff::DecodeFailed,
        };
        let line = line.trim();

        if let Some(remainder) = line.strip_prefix(TEGNSETT_KEY) {
            if let Some(code) = remainder.split_whitespace().last() {
                return Sniff::Declared(code.to_string());
            }
        }
        // Once geometry starts there is no declaration to find
        if line.starts_with(".KURVE") || line.starts_with(".PUNKT") || line.starts_with(".FLATE") {
            return Sniff::NotDeclared;
        }
    }
    Sniff::NotDeclared
}

/// Resolve the decode scheme for a whole SOSI buffer.
///
/// Returns the resolved encoding and any soft warnings from fallbacks.
pub fn detect_encoding(buffer: &[u8]) -> (&'static Encoding, Vec<Warning>) {
    let mut warnings = Vec::new();

    let utf8_scan = sniff_declaration(buffer, |raw| match std::str::from_utf8(raw) {
        Ok(text) => Some(std::borrow::Cow::Borrowed(text)),
        Err(_) => None,
    });

    match utf8_scan {
        Sniff::Declared(code) => {
            let encoding = encoding_for_code(&code);
            debug!(declared = %code, resolved = encoding.name(), "TEGNSETT declaration found");
            (encoding, warnings)
        }
        Sniff::NotDeclared => (UTF_8, warnings),
        Sniff::DecodeFailed => {
            // Latin-1 compatible retry; a single-byte decode cannot fail
            let latin1_scan = sniff_declaration(buffer, |raw| {
                Some(WINDOWS_1252.decode_without_bom_handling(raw).0)
            });
            match latin1_scan {
                Sniff::Declared(code) => {
                    let encoding = encoding_for_code(&code);
                    let detail = format!(
                        "header not valid UTF-8, located TEGNSETT {} via Latin-1 scan",
                        code
                    );
                    warn!("{detail}");
                    warnings.push(Warning::EncodingFallback { detail });
                    (encoding, warnings)
                }
                _ => {
                    let detail =
                        "header not valid UTF-8 and no TEGNSETT found, defaulting to Latin-1"
                            .to_string();
                    warn!("{detail}");
                    warnings.push(Warning::EncodingFallback { detail });
                    (WINDOWS_1252, warnings)
                }
            }
        }
    }
}

/// Decode a whole buffer using the sniffed encoding.
///
/// Returns the decoded text, the resolved encoding and accumulated
/// warnings. Undecodable sequences become replacement characters rather
/// than errors.
pub fn decode(buffer: &[u8]) -> (String, &'static Encoding, Vec<Warning>) {
    let (encoding, warnings) = detect_encoding(buffer);
    let (text, _, _) = encoding.decode(buffer);
    (text.into_owned(), encoding, warnings)
}
