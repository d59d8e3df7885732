use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{CountryIdCodec, EncodedColor};
use crate::raster::{RasterImage, RasterSize};

const MAGIC: [u8; 4] = *b"GIDM";
const VERSION_V1: u16 = 1;

#[derive(Debug)]
pub enum AssetError {
    UnexpectedEof,
    Io { source: String },
    InvalidMagic,
    UnsupportedVersion { found: u16 },
    InvalidDimensions { width: u32, height: u32 },
    SizeMismatch { expected: usize, found: usize },
    InvalidJson { reason: String },
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetError::UnexpectedEof => write!(f, "unexpected EOF"),
            AssetError::Io { source } => write!(f, "I/O error: {source}"),
            AssetError::InvalidMagic => write!(f, "invalid GIDM magic"),
            AssetError::UnsupportedVersion { found } => {
                write!(f, "unsupported GIDM version: {found}")
            }
            AssetError::InvalidDimensions { width, height } => {
                write!(f, "unreasonable raster dimensions: {width}x{height}")
            }
            AssetError::SizeMismatch { expected, found } => {
                write!(f, "pixel payload size mismatch: expected {expected}, found {found}")
            }
            AssetError::InvalidJson { reason } => write!(f, "invalid lookup JSON: {reason}"),
        }
    }
}

impl std::error::Error for AssetError {}

/// Frames the picking raster as a GIDM v1 asset: magic, version, reserved
/// flags, dimensions, then raw RGBA rows top to bottom.
pub fn encode_id_map(image: &RasterImage) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(16 + image.pixels().len());
    // Writes to a Vec cannot fail.
    let _ = encode_id_map_to_writer(image, &mut out);
    out
}

pub fn encode_id_map_to_writer<W: Write>(image: &RasterImage, w: &mut W) -> Result<(), AssetError> {
    w.write_all(&MAGIC).map_err(map_io_err)?;
    w.write_all(&VERSION_V1.to_le_bytes()).map_err(map_io_err)?;
    // flags (reserved)
    w.write_all(&0u16.to_le_bytes()).map_err(map_io_err)?;
    w.write_all(&image.width().to_le_bytes()).map_err(map_io_err)?;
    w.write_all(&image.height().to_le_bytes()).map_err(map_io_err)?;
    w.write_all(image.pixels()).map_err(map_io_err)?;
    Ok(())
}

pub fn decode_id_map(bytes: &[u8]) -> Result<RasterImage, AssetError> {
    let mut cursor = std::io::Cursor::new(bytes);
    decode_id_map_from_reader(&mut cursor)
}

pub fn decode_id_map_from_reader<R: Read>(r: &mut R) -> Result<RasterImage, AssetError> {
    let magic = read_exact::<4>(r)?;
    if magic != MAGIC {
        return Err(AssetError::InvalidMagic);
    }

    let version = u16::from_le_bytes(read_exact::<2>(r)?);
    if version != VERSION_V1 {
        return Err(AssetError::UnsupportedVersion { found: version });
    }

    let _flags = u16::from_le_bytes(read_exact::<2>(r)?);
    let width = u32::from_le_bytes(read_exact::<4>(r)?);
    let height = u32::from_le_bytes(read_exact::<4>(r)?);

    // Header fields are untrusted; a crafted file can claim dimensions
    // whose byte length overflows usize.
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or(AssetError::InvalidDimensions { width, height })?;
    let size = RasterSize::new(width, height);
    let mut pixels = vec![0u8; expected];
    r.read_exact(&mut pixels).map_err(map_io_err)?;

    RasterImage::from_pixels(size, pixels).ok_or(AssetError::SizeMismatch {
        expected,
        found: 0,
    })
}

fn map_io_err(e: std::io::Error) -> AssetError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        AssetError::UnexpectedEof
    } else {
        AssetError::Io {
            source: e.to_string(),
        }
    }
}

fn read_exact<const N: usize>(r: &mut impl Read) -> Result<[u8; N], AssetError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(map_io_err)?;
    Ok(buf)
}

/// Sidecar JSON shipped next to the GIDM asset so consumers can decode
/// picked colors without rebuilding the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupDocument {
    pub metadata: LookupMetadata,
    pub countries: BTreeMap<String, LookupEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupMetadata {
    pub generated_at: String,
    pub total_countries: usize,
    pub encoding: String,
    pub format: String,
    /// blake3 hex digest of the GIDM bytes this lookup was generated with.
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupEntry {
    pub name: String,
    pub index: u32,
    pub encoded_color: EncodedColor,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

impl LookupDocument {
    pub fn from_codec(codec: &CountryIdCodec, generated_at: &str) -> Self {
        let encoded = encode_id_map(codec.texture());
        let content_hash = blake3::hash(&encoded).to_hex().to_string();

        let mut countries = BTreeMap::new();
        for entry in codec.entries() {
            countries.insert(
                entry.country_id.clone(),
                LookupEntry {
                    name: entry.metadata.name.clone(),
                    index: entry.index,
                    encoded_color: entry.color.clone(),
                    properties: entry.properties.clone(),
                },
            );
        }

        Self {
            metadata: LookupMetadata {
                generated_at: generated_at.to_string(),
                total_countries: countries.len(),
                encoding: "24-bit RGB".to_string(),
                format: "equirectangular".to_string(),
                content_hash,
            },
            countries,
        }
    }

    pub fn to_json_string_pretty(&self) -> Result<String, AssetError> {
        serde_json::to_string_pretty(self).map_err(|e| AssetError::InvalidJson {
            reason: e.to_string(),
        })
    }

    pub fn from_json_str(payload: &str) -> Result<Self, AssetError> {
        serde_json::from_str(payload).map_err(|e| AssetError::InvalidJson {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{AssetError, LookupDocument, decode_id_map, encode_id_map};
    use crate::codec::CountryIdCodec;
    use crate::raster::{RasterImage, RasterSize};
    use topology::geojson::FeatureCollection;

    fn codec() -> CountryIdCodec {
        let fc = FeatureCollection::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"NAME":"Westral","ISO_A3":"WST"},
                 "geometry":{"type":"Polygon","coordinates":[[[-120,-30],[-60,-30],[-60,30],[-120,30],[-120,-30]]]}}]}"#,
        )
        .expect("parse fixture");
        CountryIdCodec::build(&fc.features, RasterSize::new(36, 18)).expect("build codec")
    }

    #[test]
    fn id_map_round_trips_through_gidm() {
        let codec = codec();
        let bytes = encode_id_map(codec.texture());
        let decoded = decode_id_map(&bytes).expect("decode");
        assert_eq!(&decoded, codec.texture());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = encode_id_map(&RasterImage::new(RasterSize::new(2, 2)));
        bytes[0] = b'X';
        assert!(matches!(
            decode_id_map(&bytes),
            Err(AssetError::InvalidMagic)
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = encode_id_map(&RasterImage::new(RasterSize::new(2, 2)));
        bytes[4] = 99;
        assert!(matches!(
            decode_id_map(&bytes),
            Err(AssetError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GIDM");
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0x8000_0000u32.to_le_bytes());
        bytes.extend_from_slice(&0x8000_0000u32.to_le_bytes());
        assert!(matches!(
            decode_id_map(&bytes),
            Err(AssetError::InvalidDimensions {
                width: 0x8000_0000,
                height: 0x8000_0000
            })
        ));
    }

    #[test]
    fn truncated_payload_is_an_eof() {
        let bytes = encode_id_map(&RasterImage::new(RasterSize::new(2, 2)));
        assert!(matches!(
            decode_id_map(&bytes[..bytes.len() - 1]),
            Err(AssetError::UnexpectedEof)
        ));
    }

    #[test]
    fn lookup_document_round_trips_as_json() {
        let codec = codec();
        let doc = LookupDocument::from_codec(&codec, "2026-08-26T00:00:00Z");
        assert_eq!(doc.metadata.total_countries, 1);
        assert_eq!(doc.metadata.encoding, "24-bit RGB");
        assert_eq!(doc.countries["WST"].index, 1);

        let json = doc.to_json_string_pretty().expect("serialize");
        assert!(json.contains("\"generatedAt\""));
        assert!(json.contains("\"encodedColor\""));
        assert!(json.contains("\"contentHash\""));
        let back = LookupDocument::from_json_str(&json).expect("parse");
        assert_eq!(back, doc);
    }

    #[test]
    fn content_hash_tracks_the_encoded_raster() {
        let codec = codec();
        let doc = LookupDocument::from_codec(&codec, "2026-08-26T00:00:00Z");
        let expected = blake3::hash(&encode_id_map(codec.texture())).to_hex().to_string();
        assert_eq!(doc.metadata.content_hash, expected);
    }
}
