use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use topology::geojson::GeoFeature;
use tracing::warn;

use crate::raster::{RasterImage, RasterSize};

/// Highest country index encodable in a 24-bit RGB color.
pub const MAX_INDEX: u32 = 0xFF_FFFF;

/// Index 0 renders as this background color; it never maps to a country.
pub const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug)]
pub enum PickingError {
    /// More countries than the 24-bit color space can address. Fatal: the
    /// build aborts before any pixel is rasterized.
    IndexSpaceExhausted { count: usize },
}

impl std::fmt::Display for PickingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickingError::IndexSpaceExhausted { count } => {
                write!(
                    f,
                    "{count} countries exceed the 24-bit index space ({MAX_INDEX} max)"
                )
            }
        }
    }
}

impl std::error::Error for PickingError {}

/// A country index encoded as an exact RGB color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hex: String,
    pub css: String,
}

/// `index -> (r, g, b)` by bit-shifting. Fails above [`MAX_INDEX`] rather
/// than silently truncating.
pub fn encode_index(index: u32) -> Result<EncodedColor, PickingError> {
    if index > MAX_INDEX {
        return Err(PickingError::IndexSpaceExhausted {
            count: index as usize,
        });
    }
    let r = ((index >> 16) & 0xFF) as u8;
    let g = ((index >> 8) & 0xFF) as u8;
    let b = (index & 0xFF) as u8;
    Ok(EncodedColor {
        r,
        g,
        b,
        hex: format!("#{index:06x}"),
        css: format!("rgb({r}, {g}, {b})"),
    })
}

/// Inverse of [`encode_index`].
pub fn decode_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Metadata snapshot taken at assignment time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryMetadata {
    pub name: String,
    pub iso2: Option<String>,
    pub iso3: Option<String>,
    pub continent: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryIndexEntry {
    /// Dense, 1-based. 0 is reserved for the background.
    pub index: u32,
    pub color: EncodedColor,
    pub country_id: String,
    pub metadata: CountryMetadata,
    pub properties: Map<String, Value>,
}

/// Owned picking state: the static ID texture plus the index lookup.
///
/// Built once per data load and read-only afterwards. Owns its raster; call
/// [`CountryIdCodec::dispose`] before replacing it so the GPU copy can be
/// released too.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryIdCodec {
    entries: Vec<CountryIndexEntry>,
    by_id: BTreeMap<String, usize>,
    texture: RasterImage,
    disposed: bool,
}

impl CountryIdCodec {
    /// Assigns indices in input order and rasterizes every accepted feature
    /// into the picking texture.
    ///
    /// Skips are non-fatal and logged: features without a name, without
    /// polygon geometry, duplicates of an already-accepted country code, and
    /// features whose rasterization paints nothing. Index-space exhaustion
    /// is fatal and produces no texture at all.
    pub fn build(features: &[GeoFeature], size: RasterSize) -> Result<Self, PickingError> {
        let mut accepted: Vec<&GeoFeature> = Vec::new();
        let mut seen: BTreeMap<&str, ()> = BTreeMap::new();

        for feature in features {
            if feature.name.is_empty() {
                warn!(feature = %feature.id, "feature has no name, skipping");
                continue;
            }
            if feature.polygons().is_empty() {
                warn!(feature = %feature.id, "feature has no polygon geometry, skipping");
                continue;
            }
            if seen.contains_key(feature.id.as_str()) {
                warn!(code = %feature.id, "duplicate country code, dropping later feature");
                continue;
            }
            seen.insert(&feature.id, ());
            accepted.push(feature);
        }

        // Hard ceiling check before any pixel is touched.
        if accepted.len() as u64 > MAX_INDEX as u64 {
            return Err(PickingError::IndexSpaceExhausted {
                count: accepted.len(),
            });
        }

        let mut texture = RasterImage::new(size);
        texture.fill(BACKGROUND);

        let mut entries = Vec::with_capacity(accepted.len());
        let mut by_id = BTreeMap::new();

        for (i, feature) in accepted.iter().enumerate() {
            let index = i as u32 + 1;
            let color = encode_index(index)?;

            let mut painted = false;
            for rings in feature.polygons() {
                painted |= texture.fill_polygon(rings, [color.r, color.g, color.b, 255]);
            }
            if !painted {
                warn!(
                    feature = %feature.id,
                    "feature rasterized to no pixels at this resolution"
                );
            }

            by_id.insert(feature.id.clone(), entries.len());
            entries.push(CountryIndexEntry {
                index,
                color,
                country_id: feature.id.clone(),
                metadata: CountryMetadata {
                    name: feature.name.clone(),
                    iso2: feature.iso2().map(str::to_string),
                    iso3: feature.iso3().map(str::to_string),
                    continent: feature.continent().map(str::to_string),
                    region: feature.region().map(str::to_string),
                },
                properties: feature.properties.clone(),
            });
        }

        Ok(Self {
            entries,
            by_id,
            texture,
            disposed: false,
        })
    }

    /// O(1) reverse lookup. `None` for the background color or any color
    /// that does not correspond to an assigned index.
    pub fn decode(&self, r: u8, g: u8, b: u8) -> Option<&CountryIndexEntry> {
        let index = decode_rgb(r, g, b);
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize - 1)
    }

    pub fn entry(&self, country_id: &str) -> Option<&CountryIndexEntry> {
        self.by_id.get(country_id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[CountryIndexEntry] {
        &self.entries
    }

    pub fn texture(&self) -> &RasterImage {
        &self.texture
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the raster and lookup tables. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.entries = Vec::new();
        self.by_id = BTreeMap::new();
        self.texture = RasterImage::new(RasterSize::new(0, 0));
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{CountryIdCodec, MAX_INDEX, PickingError, decode_rgb, encode_index};
    use crate::raster::RasterSize;
    use topology::geojson::FeatureCollection;

    fn features(payload: &str) -> FeatureCollection {
        FeatureCollection::from_geojson_str(payload).expect("parse fixture")
    }

    fn two_squares() -> FeatureCollection {
        features(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"NAME":"Westral","ISO_A3":"WST","CONTINENT":"Testia"},
                 "geometry":{"type":"Polygon","coordinates":[[[-120,-30],[-60,-30],[-60,30],[-120,30],[-120,-30]]]}},
                {"type":"Feature","properties":{"NAME":"Eastral","ISO_A3":"EST"},
                 "geometry":{"type":"Polygon","coordinates":[[[60,-30],[120,-30],[120,30],[60,30],[60,-30]]]}}]}"#,
        )
    }

    #[test]
    fn codec_round_trips_across_the_index_space() {
        for index in [0u32, 1, 2, 255, 256, 0x12_3456, MAX_INDEX] {
            let c = encode_index(index).expect("encode");
            assert_eq!(decode_rgb(c.r, c.g, c.b), index);
        }
    }

    #[test]
    fn encoding_above_the_ceiling_fails() {
        assert!(matches!(
            encode_index(MAX_INDEX + 1),
            Err(PickingError::IndexSpaceExhausted { .. })
        ));
    }

    #[test]
    fn color_strings_match_the_channels() {
        let c = encode_index(0x12_3456).expect("encode");
        assert_eq!((c.r, c.g, c.b), (0x12, 0x34, 0x56));
        assert_eq!(c.hex, "#123456");
        assert_eq!(c.css, "rgb(18, 52, 86)");
    }

    #[test]
    fn build_assigns_dense_one_based_indices() {
        let fc = two_squares();
        let codec = CountryIdCodec::build(&fc.features, RasterSize::new(36, 18)).expect("build");
        assert_eq!(codec.entries().len(), 2);
        assert_eq!(codec.entries()[0].index, 1);
        assert_eq!(codec.entries()[1].index, 2);
        assert_eq!(codec.entry("WST").map(|e| e.index), Some(1));
        assert_eq!(codec.entries()[0].metadata.continent.as_deref(), Some("Testia"));
    }

    #[test]
    fn texture_pixels_decode_to_their_country() {
        let fc = two_squares();
        let codec = CountryIdCodec::build(&fc.features, RasterSize::new(36, 18)).expect("build");

        // Pixel inside Westral: lon -90, lat 0 -> x 9, y 9.
        let p = codec.texture().pixel(9, 9);
        let entry = codec.decode(p[0], p[1], p[2]).expect("decode hit");
        assert_eq!(entry.country_id, "WST");

        // Background pixel decodes to nothing.
        let bg = codec.texture().pixel(17, 9); // lon -5: between the squares
        assert!(codec.decode(bg[0], bg[1], bg[2]).is_none());
    }

    #[test]
    fn duplicate_country_codes_drop_the_later_feature() {
        let fc = features(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"NAME":"First","ISO_A3":"DUP"},
                 "geometry":{"type":"Polygon","coordinates":[[[-10,-10],[10,-10],[10,10],[-10,10],[-10,-10]]]}},
                {"type":"Feature","properties":{"NAME":"Second","ISO_A3":"DUP"},
                 "geometry":{"type":"Polygon","coordinates":[[[20,-10],[40,-10],[40,10],[20,10],[20,-10]]]}}]}"#,
        );
        let codec = CountryIdCodec::build(&fc.features, RasterSize::new(36, 18)).expect("build");
        assert_eq!(codec.entries().len(), 1);
        assert_eq!(codec.entries()[0].metadata.name, "First");
    }

    #[test]
    fn features_without_polygons_are_skipped() {
        let fc = features(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"NAME":"Pointland"},
                 "geometry":{"type":"Point","coordinates":[0,0]}}]}"#,
        );
        let codec = CountryIdCodec::build(&fc.features, RasterSize::new(8, 4)).expect("build");
        assert!(codec.entries().is_empty());
        // Whole texture is background.
        assert!(
            codec
                .texture()
                .pixels()
                .chunks_exact(4)
                .all(|p| p == [0, 0, 0, 255])
        );
    }

    #[test]
    fn dispose_releases_texture_and_lookup() {
        let fc = two_squares();
        let mut codec = CountryIdCodec::build(&fc.features, RasterSize::new(8, 4)).expect("build");
        codec.dispose();
        assert!(codec.is_disposed());
        assert!(codec.entries().is_empty());
        assert!(codec.entry("WST").is_none());
        assert_eq!(codec.texture().pixels().len(), 0);
        codec.dispose();
    }
}
