use serde_json::{Map, Value};

/// One closed loop of `[lon, lat]` pairs in degrees.
pub type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
    /// Geometry types the pipeline cannot render. Preserved so the feature's
    /// metadata survives, but never converted to arcs or meshes.
    Other { kind: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    /// Stable identifier: ISO3 code when present, otherwise a key derived
    /// from the display name.
    pub id: String,
    pub name: String,
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<GeoFeature>,
}

#[derive(Debug)]
pub enum GeoJsonError {
    NotAFeatureCollection,
    MissingGeometry { index: usize },
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::MissingGeometry { index } => {
                write!(f, "feature at index {index} has no geometry")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

const ISO3_KEYS: &[&str] = &["ISO_A3", "ADM0_A3", "iso_a3", "ISO3"];
const ISO2_KEYS: &[&str] = &["ISO_A2", "iso_a2", "ISO2"];
const NAME_KEYS: &[&str] = &["NAME", "ADMIN", "name"];
const CONTINENT_KEYS: &[&str] = &["CONTINENT", "continent"];
const REGION_KEYS: &[&str] = &["REGION_UN", "SUBREGION", "region"];

impl GeoFeature {
    pub fn property_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.properties.get(*k).and_then(|v| v.as_str()))
    }

    pub fn iso3(&self) -> Option<&str> {
        // Natural Earth uses "-99" for territories without an assigned code.
        self.property_str(ISO3_KEYS).filter(|s| *s != "-99")
    }

    pub fn iso2(&self) -> Option<&str> {
        self.property_str(ISO2_KEYS).filter(|s| *s != "-99")
    }

    pub fn continent(&self) -> Option<&str> {
        self.property_str(CONTINENT_KEYS)
    }

    pub fn region(&self) -> Option<&str> {
        self.property_str(REGION_KEYS)
    }

    /// All polygon ring sets: one entry per polygon, each holding its
    /// exterior ring followed by any holes. Empty for unsupported geometry.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match &self.geometry {
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(|p| p.as_slice()).collect(),
            Geometry::Other { .. } => Vec::new(),
        }
    }
}

/// Lowercased, dash-delimited key for features without an ISO3 code.
pub fn name_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

impl FeatureCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GeoJsonError::InvalidFeature {
                index: 0,
                reason: format!("JSON parse error: {e}"),
            })?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        let obj = value
            .as_object()
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(GeoJsonError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            features.push(parse_feature(index, feat_val)?);
        }

        Ok(Self { features })
    }
}

fn parse_feature(index: usize, value: &Value) -> Result<GeoFeature, GeoJsonError> {
    let obj = value.as_object().ok_or(GeoJsonError::InvalidFeature {
        index,
        reason: "feature must be an object".to_string(),
    })?;

    let properties = obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let geometry_val = obj
        .get("geometry")
        .filter(|v| !v.is_null())
        .ok_or(GeoJsonError::MissingGeometry { index })?;
    let geometry = parse_geometry(geometry_val)
        .map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?;

    let name = NAME_KEYS
        .iter()
        .find_map(|k| properties.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
        .or_else(|| match obj.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("feature-{index}"));

    let id = ISO3_KEYS
        .iter()
        .find_map(|k| properties.get(*k).and_then(|v| v.as_str()))
        .filter(|s| *s != "-99")
        .map(str::to_string)
        .unwrap_or_else(|| name_key(&name));

    Ok(GeoFeature {
        id,
        name,
        properties,
        geometry,
    })
}

fn parse_geometry(value: &Value) -> Result<Geometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    match ty {
        "Polygon" => {
            let coords = obj
                .get("coordinates")
                .ok_or("geometry missing coordinates".to_string())?;
            Ok(Geometry::Polygon(parse_rings(coords)?))
        }
        "MultiPolygon" => {
            let coords = obj
                .get("coordinates")
                .ok_or("geometry missing coordinates".to_string())?;
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array".to_string())?;
            let mut out = Vec::with_capacity(polys.len());
            for poly in polys {
                out.push(parse_rings(poly)?);
            }
            Ok(Geometry::MultiPolygon(out))
        }
        other => Ok(Geometry::Other {
            kind: other.to_string(),
        }),
    }
}

fn parse_rings(coords: &Value) -> Result<Vec<Ring>, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        let pts = ring
            .as_array()
            .ok_or("ring must be an array of positions".to_string())?;
        let mut ring_out = Vec::with_capacity(pts.len());
        for pt in pts {
            let arr = pt
                .as_array()
                .ok_or("position must be an array".to_string())?;
            if arr.len() < 2 {
                return Err("position must have [lon, lat]".to_string());
            }
            let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
            let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
            ring_out.push([lon, lat]);
        }
        out.push(ring_out);
    }
    Ok(out)
}
