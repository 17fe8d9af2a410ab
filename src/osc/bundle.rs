//! Mapping between `FrameFeatureSet` and the `/cell/{row}/{col}/{feature}` address space.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::codec::{float_message_len, BundleWriter, OscPacket, BUNDLE_TAG, IMMEDIATELY};
use crate::analyze::{CellFeatures, FrameFeatureSet};
use crate::error::{Error, Result};
use crate::grid::GridShape;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Messages emitted per cell.
pub const MESSAGES_PER_CELL: usize = 4;

/// Per-cell feature names in emission order, with their argument counts.
pub const FEATURES: [(&str, usize); MESSAGES_PER_CELL] =
    [("rgb", 3), ("brightness", 1), ("contrast", 1), ("dominant", 3)];

fn digits(mut value: u32) -> usize {
    let mut count = 1;
    while value >= 10 {
        value /= 10;
        count += 1;
    }
    count
}

/// Exact encoded size of one frame's bundle for `shape`.
///
/// Depends only on the grid shape (address lengths and argument counts), so
/// it can be checked against the datagram limit before streaming starts.
pub fn bundle_size_for(shape: GridShape) -> usize {
    let mut total = BUNDLE_TAG.len() + 8;
    for row in 0..shape.rows() {
        for col in 0..shape.cols() {
            // "/cell/" + row + "/" + col + "/" + feature
            let base = 6 + digits(row) + 1 + digits(col) + 1;
            for (feature, args) in FEATURES {
                total += 4 + float_message_len(base + feature.len(), args);
            }
        }
    }
    total
}

/// Fails when a `shape` bundle would not fit a single datagram of `max_bytes`.
pub fn check_bundle_fits(shape: GridShape, max_bytes: usize) -> Result<usize> {
    let size = bundle_size_for(shape);
    if size > max_bytes {
        return Err(Error::config(format!(
            "{} grid encodes to {} bytes per frame, above the {} byte datagram limit",
            shape, size, max_bytes
        )));
    }
    Ok(size)
}

/// Encodes all cells of `features` as one bundle into `buf`. Returns the byte length.
pub fn encode_feature_set(features: &FrameFeatureSet, buf: &mut Vec<u8>) -> Result<usize> {
    let mut writer = BundleWriter::begin(buf, IMMEDIATELY);
    let mut address = String::with_capacity(32);

    for cell in features {
        let values: [&[f32]; MESSAGES_PER_CELL] = [
            &[cell.avg_red, cell.avg_green, cell.avg_blue],
            &[cell.brightness],
            &[cell.contrast],
            &cell.dominant_color,
        ];
        for ((feature, _), args) in FEATURES.iter().zip(values) {
            address.clear();
            // Writing to a String cannot fail.
            let _ = write!(address, "/cell/{}/{}/{}", cell.row, cell.col, feature);
            writer.push_floats(&address, args)?;
        }
    }

    Ok(writer.finish())
}

// ----------------------------------------------------------------------------
// Receiver side
// ----------------------------------------------------------------------------

#[derive(Default)]
struct PartialCell {
    rgb: Option<[f32; 3]>,
    brightness: Option<f32>,
    contrast: Option<f32>,
    dominant: Option<[f32; 3]>,
}

fn parse_address(address: &str) -> Result<(u32, u32, &str)> {
    let bad = || Error::Codec(format!("unexpected address '{}'", address));
    let rest = address.strip_prefix("/cell/").ok_or_else(bad)?;
    let mut parts = rest.splitn(3, '/');
    let row = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let col = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let feature = parts.next().ok_or_else(bad)?;
    Ok((row, col, feature))
}

fn triple(address: &str, values: &[f32]) -> Result<[f32; 3]> {
    match values {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(Error::Codec(format!(
            "{} carries {} arguments, expected 3",
            address,
            values.len()
        ))),
    }
}

fn single(address: &str, values: &[f32]) -> Result<f32> {
    match values {
        [v] => Ok(*v),
        _ => Err(Error::Codec(format!(
            "{} carries {} arguments, expected 1",
            address,
            values.len()
        ))),
    }
}

/// Rebuilds the grid snapshot carried by one received bundle.
///
/// The grid shape is inferred from the largest row/col seen; every cell of
/// that shape must carry all four features.
pub fn decode_feature_set(packet: &OscPacket) -> Result<FrameFeatureSet> {
    let mut cells: BTreeMap<(u32, u32), PartialCell> = BTreeMap::new();

    for message in packet.messages() {
        let (row, col, feature) = parse_address(&message.address)?;
        let values = message.floats().ok_or_else(|| {
            Error::Codec(format!("{} carries non-numeric arguments", message.address))
        })?;
        let cell = cells.entry((row, col)).or_default();
        match feature {
            "rgb" => cell.rgb = Some(triple(&message.address, &values)?),
            "brightness" => cell.brightness = Some(single(&message.address, &values)?),
            "contrast" => cell.contrast = Some(single(&message.address, &values)?),
            "dominant" => cell.dominant = Some(triple(&message.address, &values)?),
            other => {
                return Err(Error::Codec(format!(
                    "unknown feature '{}' in {}",
                    other, message.address
                )))
            }
        }
    }

    let rows = cells.keys().map(|(r, _)| r + 1).max().unwrap_or(0);
    let cols = cells.keys().map(|(_, c)| c + 1).max().unwrap_or(0);
    let shape = GridShape::new(rows, cols)
        .map_err(|_| Error::Codec("bundle carries no cell messages".to_string()))?;
    if cells.len() != shape.cell_count() {
        return Err(Error::Codec(format!(
            "bundle covers {} of {} cells in a {} grid",
            cells.len(),
            shape.cell_count(),
            shape
        )));
    }

    // BTreeMap iteration over (row, col) is row-major.
    let features = cells
        .into_iter()
        .map(|((row, col), cell)| -> Result<CellFeatures> {
            let missing = |name: &str| {
                Error::Codec(format!("cell ({}, {}) is missing '{}'", row, col, name))
            };
            let rgb = cell.rgb.ok_or_else(|| missing("rgb"))?;
            Ok(CellFeatures {
                row,
                col,
                avg_red: rgb[0],
                avg_green: rgb[1],
                avg_blue: rgb[2],
                brightness: cell.brightness.ok_or_else(|| missing("brightness"))?,
                contrast: cell.contrast.ok_or_else(|| missing("contrast"))?,
                dominant_color: cell.dominant.ok_or_else(|| missing("dominant"))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    FrameFeatureSet::new(shape, features)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::codec::{OscArg, OscBundle, OscMessage};

    fn sample_set(rows: u32, cols: u32) -> FrameFeatureSet {
        let shape = GridShape::new(rows, cols).unwrap();
        let cells = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .map(|(row, col)| {
                let base = (row * cols + col) as f32 / (rows * cols) as f32;
                CellFeatures {
                    row,
                    col,
                    avg_red: base,
                    avg_green: 1.0 - base,
                    avg_blue: 0.25,
                    brightness: (base + 1.0 - base + 0.25) / 3.0,
                    contrast: base * 0.1,
                    dominant_color: [0.1, base, 0.9],
                }
            })
            .collect();
        FrameFeatureSet::new(shape, cells).unwrap()
    }

    #[test]
    fn one_bundle_with_four_messages_per_cell() {
        let features = sample_set(3, 5);
        let mut buf = Vec::new();
        let len = encode_feature_set(&features, &mut buf).unwrap();
        assert_eq!(len, buf.len());

        let packet = OscPacket::decode(&buf).unwrap();
        let OscPacket::Bundle(bundle) = &packet else {
            panic!("expected a bundle");
        };
        assert_eq!(bundle.time_tag, IMMEDIATELY);
        assert_eq!(bundle.content.len(), 4 * 15);

        let first: Vec<&str> = packet
            .messages()
            .iter()
            .take(4)
            .map(|m| m.address.as_str())
            .collect();
        assert_eq!(
            first,
            vec![
                "/cell/0/0/rgb",
                "/cell/0/0/brightness",
                "/cell/0/0/contrast",
                "/cell/0/0/dominant"
            ]
        );
    }

    #[test]
    fn decoding_recovers_encoded_values() {
        let features = sample_set(4, 4);
        let mut buf = Vec::new();
        encode_feature_set(&features, &mut buf).unwrap();
        let decoded = decode_feature_set(&OscPacket::decode(&buf).unwrap()).unwrap();
        assert_eq!(decoded, features);
    }

    #[test]
    fn predicted_size_matches_encoding() {
        for (rows, cols) in [(1, 1), (4, 4), (3, 12), (11, 10), (12, 101)] {
            let features = sample_set(rows, cols);
            let mut buf = Vec::new();
            let len = encode_feature_set(&features, &mut buf).unwrap();
            assert_eq!(
                bundle_size_for(features.shape()),
                len,
                "{}x{} size mismatch",
                rows,
                cols
            );
        }
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let small = GridShape::new(4, 4).unwrap();
        assert!(check_bundle_fits(small, MAX_UDP_PAYLOAD).is_ok());

        let huge = GridShape::new(64, 64).unwrap();
        assert!(bundle_size_for(huge) > MAX_UDP_PAYLOAD);
        assert!(check_bundle_fits(huge, MAX_UDP_PAYLOAD).is_err());
    }

    #[test]
    fn decoding_rejects_incomplete_snapshots() {
        let only_rgb = OscPacket::Bundle(OscBundle {
            time_tag: IMMEDIATELY,
            content: vec![OscPacket::Message(OscMessage::new(
                "/cell/0/0/rgb",
                vec![OscArg::Float(0.1), OscArg::Float(0.2), OscArg::Float(0.3)],
            ))],
        });
        assert!(decode_feature_set(&only_rgb).is_err());

        let bad_address = OscPacket::Message(OscMessage::new("/red", vec![OscArg::Float(0.1)]));
        assert!(decode_feature_set(&bad_address).is_err());
    }
}
