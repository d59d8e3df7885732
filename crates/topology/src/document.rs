use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the object every builder run emits.
pub const COUNTRIES_OBJECT: &str = "countries";

const TOPOLOGY_KIND: &str = "Topology";

/// Decodes quantized grid coordinates back to lon/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            scale: [1.0, 1.0],
            translate: [0.0, 0.0],
        }
    }

    pub fn decode(&self, grid: [i64; 2]) -> [f64; 2] {
        [
            grid[0] as f64 * self.scale[0] + self.translate[0],
            grid[1] as f64 * self.scale[1] + self.translate[1],
        ]
    }

    pub fn encode(&self, lon: f64, lat: f64) -> [i64; 2] {
        [
            ((lon - self.translate[0]) / self.scale[0]).round() as i64,
            ((lat - self.translate[1]) / self.scale[1]).round() as i64,
        ]
    }
}

/// TopoJSON-shaped document: deduplicated arcs plus named feature
/// collections that reference arcs by signed index.
///
/// Arcs are stored quantized and delta-encoded: the first position of an arc
/// is absolute in grid units, every following position is a delta from its
/// predecessor. `transform` maps grid units back to degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[min_lon, min_lat, max_lon, max_lat]` in degrees.
    pub bbox: [f64; 4],
    pub transform: Transform,
    pub arcs: Vec<Vec<[i64; 2]>>,
    pub objects: BTreeMap<String, TopoObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<TopoFeature>,
}

impl TopoObject {
    pub fn new() -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }
}

impl Default for TopoObject {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopoFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub geometry: TopoGeometry,
}

/// Feature geometry with coordinates replaced by signed arc indices.
///
/// A non-negative index `i` means arc `i` traversed forward; a negative
/// index `s` means arc `-1 - s` traversed in reverse (the TopoJSON `~i`
/// convention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TopoGeometry {
    Polygon { arcs: Vec<Vec<i32>> },
    MultiPolygon { arcs: Vec<Vec<Vec<i32>>> },
    /// Pass-through for geometry the pipeline does not convert.
    Unsupported { kind: String },
}

#[derive(Debug)]
pub enum TopologyError {
    NotATopology,
    Json { reason: String },
    ArcIndexOutOfBounds { index: i32, arcs: usize },
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyError::NotATopology => write!(f, "expected a Topology document"),
            TopologyError::Json { reason } => write!(f, "topology JSON error: {reason}"),
            TopologyError::ArcIndexOutOfBounds { index, arcs } => {
                write!(f, "arc index {index} out of bounds ({arcs} arcs)")
            }
        }
    }
}

impl std::error::Error for TopologyError {}

impl Topology {
    pub fn new(bbox: [f64; 4], transform: Transform) -> Self {
        Self {
            kind: TOPOLOGY_KIND.to_string(),
            bbox,
            transform,
            arcs: Vec::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn from_json_str(payload: &str) -> Result<Self, TopologyError> {
        let topo: Topology = serde_json::from_str(payload).map_err(|e| TopologyError::Json {
            reason: e.to_string(),
        })?;
        if topo.kind != TOPOLOGY_KIND {
            return Err(TopologyError::NotATopology);
        }
        Ok(topo)
    }

    pub fn to_json_string(&self) -> Result<String, TopologyError> {
        serde_json::to_string(self).map_err(|e| TopologyError::Json {
            reason: e.to_string(),
        })
    }

    pub fn to_json_string_pretty(&self) -> Result<String, TopologyError> {
        serde_json::to_string_pretty(self).map_err(|e| TopologyError::Json {
            reason: e.to_string(),
        })
    }

    /// De-quantizes one arc into absolute lon/lat degrees.
    pub fn decode_arc(&self, index: usize) -> Option<Vec<[f64; 2]>> {
        let arc = self.arcs.get(index)?;
        let mut out = Vec::with_capacity(arc.len());
        let mut x = 0i64;
        let mut y = 0i64;
        for (i, pos) in arc.iter().enumerate() {
            if i == 0 {
                x = pos[0];
                y = pos[1];
            } else {
                x += pos[0];
                y += pos[1];
            }
            out.push(self.transform.decode([x, y]));
        }
        Some(out)
    }

    /// Resolves a signed arc reference, reversing when negative.
    pub fn resolve_arc(&self, signed: i32) -> Result<Vec<[f64; 2]>, TopologyError> {
        let (index, reversed) = if signed >= 0 {
            (signed as usize, false)
        } else {
            ((-1 - signed) as usize, true)
        };
        let mut coords = self
            .decode_arc(index)
            .ok_or(TopologyError::ArcIndexOutOfBounds {
                index: signed,
                arcs: self.arcs.len(),
            })?;
        if reversed {
            coords.reverse();
        }
        Ok(coords)
    }

    /// Stitches a ring back together from its arc references.
    ///
    /// Adjacent arcs share their junction point; the duplicate is dropped at
    /// each seam so the result is one closed ring.
    pub fn resolve_ring(&self, refs: &[i32]) -> Result<Vec<[f64; 2]>, TopologyError> {
        let mut out: Vec<[f64; 2]> = Vec::new();
        for (i, &signed) in refs.iter().enumerate() {
            let coords = self.resolve_arc(signed)?;
            let skip = if i == 0 { 0 } else { 1 };
            out.extend(coords.into_iter().skip(skip));
        }
        Ok(out)
    }

    /// Checks that every arc reference in every object resolves.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let arcs = self.arcs.len();
        let check = |signed: i32| -> Result<(), TopologyError> {
            let index = if signed >= 0 {
                signed as usize
            } else {
                (-1 - signed) as usize
            };
            if index >= arcs {
                return Err(TopologyError::ArcIndexOutOfBounds {
                    index: signed,
                    arcs,
                });
            }
            Ok(())
        };

        for object in self.objects.values() {
            for feature in &object.features {
                match &feature.geometry {
                    TopoGeometry::Polygon { arcs } => {
                        for ring in arcs {
                            for &s in ring {
                                check(s)?;
                            }
                        }
                    }
                    TopoGeometry::MultiPolygon { arcs } => {
                        for poly in arcs {
                            for ring in poly {
                                for &s in ring {
                                    check(s)?;
                                }
                            }
                        }
                    }
                    TopoGeometry::Unsupported { .. } => {}
                }
            }
        }
        Ok(())
    }
}
