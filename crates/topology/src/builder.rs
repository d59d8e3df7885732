use std::collections::HashMap;

use foundation::bounds::LonLatBounds;
use tracing::warn;

use crate::document::{
    COUNTRIES_OBJECT, TopoFeature, TopoGeometry, TopoObject, Topology, Transform,
};
use crate::geojson::{FeatureCollection, GeoFeature, Geometry, Ring};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyOptions {
    /// Decimation stride source. Values above 1 drop ring points at a
    /// uniform stride (first and last point always kept). This is cheap
    /// decimation, not Douglas-Peucker line simplification, and can distort
    /// coastlines at high values; it matches the behavior the rendering
    /// pipeline was built around.
    pub simplify_tolerance: f64,
    /// Number of quantization grid steps per axis. Clamped to at least 2.
    pub quantization: f64,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.0,
            quantization: 10_000.0,
        }
    }
}

/// Converts a FeatureCollection into a shared-arc topology.
///
/// Rings are decimated, quantized, cut at junction points (points whose
/// neighborhood differs between rings), and deduplicated so that a boundary
/// shared by two countries is stored exactly once. Features reference arcs
/// by signed index; unsupported geometry passes through unconverted.
pub fn build_topology(collection: &FeatureCollection, options: &TopologyOptions) -> Topology {
    let stride = decimation_stride(options.simplify_tolerance);

    let mut bounds = LonLatBounds::empty();
    for feature in &collection.features {
        for rings in feature.polygons() {
            for ring in rings {
                for p in ring {
                    bounds.extend(p[0], p[1]);
                }
            }
        }
    }

    let transform = transform_for(&bounds, options.quantization.max(2.0));
    let bbox = if bounds.is_empty() {
        [0.0, 0.0, 0.0, 0.0]
    } else {
        bounds.to_array()
    };

    // Quantize every ring up front; junction detection needs the whole
    // dataset before any arc can be cut.
    let mut prepared: Vec<Vec<QuantizedRing>> = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let mut per_feature = Vec::new();
        for rings in feature.polygons() {
            for ring in rings {
                if let Some(q) = quantize_ring(ring, stride, &transform) {
                    per_feature.push(q);
                } else {
                    warn!(
                        feature = %feature.id,
                        "degenerate ring collapsed during quantization, skipping"
                    );
                    per_feature.push(QuantizedRing { points: Vec::new() });
                }
            }
        }
        prepared.push(per_feature);
    }

    let junctions = find_junctions(prepared.iter().flatten());

    let mut store = ArcStore::default();
    let mut topo = Topology::new(bbox, transform);
    let mut object = TopoObject::new();

    for (feature, rings) in collection.features.iter().zip(&prepared) {
        let mut ring_refs = rings
            .iter()
            .map(|ring| store.arcs_for_ring(ring, &junctions))
            .collect::<Vec<_>>()
            .into_iter();

        let geometry = match &feature.geometry {
            Geometry::Polygon(polygon) => TopoGeometry::Polygon {
                arcs: polygon.iter().map(|_| ring_refs.next().unwrap_or_default()).collect(),
            },
            Geometry::MultiPolygon(polys) => TopoGeometry::MultiPolygon {
                arcs: polys
                    .iter()
                    .map(|poly| {
                        poly.iter()
                            .map(|_| ring_refs.next().unwrap_or_default())
                            .collect()
                    })
                    .collect(),
            },
            Geometry::Other { kind } => {
                warn!(feature = %feature.id, kind = %kind, "unsupported geometry type, passing through");
                TopoGeometry::Unsupported { kind: kind.clone() }
            }
        };

        object.features.push(topo_feature(feature, geometry));
    }

    topo.arcs = store.arcs;
    topo.objects.insert(COUNTRIES_OBJECT.to_string(), object);
    topo
}

fn topo_feature(feature: &GeoFeature, geometry: TopoGeometry) -> TopoFeature {
    TopoFeature {
        kind: "Feature".to_string(),
        id: feature.id.clone(),
        name: feature.name.clone(),
        properties: feature.properties.clone(),
        geometry,
    }
}

fn decimation_stride(tolerance: f64) -> usize {
    if tolerance >= 2.0 {
        tolerance.round() as usize
    } else {
        1
    }
}

fn transform_for(bounds: &LonLatBounds, quantization: f64) -> Transform {
    if bounds.is_empty() {
        return Transform::identity();
    }
    let steps = quantization - 1.0;
    let scale_x = if bounds.width() > 0.0 {
        bounds.width() / steps
    } else {
        1.0
    };
    let scale_y = if bounds.height() > 0.0 {
        bounds.height() / steps
    } else {
        1.0
    };
    Transform {
        scale: [scale_x, scale_y],
        translate: [bounds.min[0], bounds.min[1]],
    }
}

#[derive(Debug, Clone, PartialEq)]
struct QuantizedRing {
    /// Open ring (no closing duplicate) on the quantization grid.
    points: Vec<[i64; 2]>,
}

/// Decimate, quantize, and clean one ring. Returns `None` if fewer than
/// three distinct grid points survive.
fn quantize_ring(ring: &Ring, stride: usize, transform: &Transform) -> Option<QuantizedRing> {
    if ring.len() < 4 {
        // A closed ring needs at least 4 positions (triangle + closing point).
        return None;
    }

    let last = ring.len() - 1;
    let mut points: Vec<[i64; 2]> = Vec::with_capacity(ring.len() / stride + 2);
    for (i, p) in ring.iter().enumerate() {
        // Stride decimation; endpoints always survive.
        if i != 0 && i != last && i % stride != 0 {
            continue;
        }
        let q = transform.encode(p[0], p[1]);
        if points.last() == Some(&q) {
            continue;
        }
        points.push(q);
    }

    // Drop the closing duplicate so the ring is open for cutting.
    if points.len() >= 2 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return None;
    }
    Some(QuantizedRing { points })
}

/// Junction detection: a grid point is a junction when it occurs with two
/// different neighbor pairs anywhere in the dataset. Points shared by
/// coordinate-identical rings keep identical neighborhoods and therefore do
/// not become junctions, which is what lets those rings stay whole arcs.
fn find_junctions<'a>(
    rings: impl Iterator<Item = &'a QuantizedRing>,
) -> HashMap<[i64; 2], bool> {
    // point -> Some(canonical neighbor pair) until contradicted, then junction.
    let mut seen: HashMap<[i64; 2], Option<([i64; 2], [i64; 2])>> = HashMap::new();

    for ring in rings {
        let n = ring.points.len();
        if n < 3 {
            continue;
        }
        for k in 0..n {
            let p = ring.points[k];
            let prev = ring.points[(k + n - 1) % n];
            let next = ring.points[(k + 1) % n];
            let pair = if prev <= next { (prev, next) } else { (next, prev) };

            match seen.get_mut(&p) {
                None => {
                    seen.insert(p, Some(pair));
                }
                Some(entry) => {
                    if *entry != Some(pair) {
                        *entry = None;
                    }
                }
            }
        }
    }

    seen.into_iter().map(|(p, v)| (p, v.is_none())).collect()
}

#[derive(Debug, Default)]
struct ArcStore {
    /// Delta-encoded arcs in emission order.
    arcs: Vec<Vec<[i64; 2]>>,
    /// Positional dedup key (first/middle/last of the oriented arc) -> index.
    by_key: HashMap<String, usize>,
}

impl ArcStore {
    /// Cuts one ring at its junctions and returns the signed arc references
    /// that reproduce it.
    fn arcs_for_ring(&mut self, ring: &QuantizedRing, junctions: &HashMap<[i64; 2], bool>) -> Vec<i32> {
        let n = ring.points.len();
        if n < 3 {
            return Vec::new();
        }

        let junction_positions: Vec<usize> = (0..n)
            .filter(|&k| junctions.get(&ring.points[k]).copied().unwrap_or(false))
            .collect();

        if junction_positions.is_empty() {
            // Whole ring is one closed arc. Rotate to the minimal point so
            // rotated copies of the same ring dedup to the same arc.
            let start = min_point_position(&ring.points);
            let mut seq: Vec<[i64; 2]> = Vec::with_capacity(n + 1);
            seq.extend(ring.points[start..].iter().copied());
            seq.extend(ring.points[..start].iter().copied());
            seq.push(ring.points[start]);
            return vec![self.add_arc(seq)];
        }

        // Rotate the ring to start at the first junction, then cut between
        // consecutive junctions.
        let offset = junction_positions[0];
        let rotated: Vec<[i64; 2]> = ring
            .points
            .iter()
            .cycle()
            .skip(offset)
            .take(n)
            .copied()
            .collect();
        let cuts: Vec<usize> = (0..n)
            .filter(|&k| junctions.get(&rotated[k]).copied().unwrap_or(false))
            .collect();

        let mut refs = Vec::with_capacity(cuts.len());
        for (i, &start) in cuts.iter().enumerate() {
            let mut seg: Vec<[i64; 2]> = if let Some(&end) = cuts.get(i + 1) {
                rotated[start..=end].to_vec()
            } else {
                // Final segment wraps back to the ring start.
                let mut s = rotated[start..].to_vec();
                s.push(rotated[0]);
                s
            };
            if seg.len() < 2 {
                continue;
            }
            if seg.len() == 2 && seg[0] == seg[1] {
                continue;
            }
            refs.push(self.add_arc(std::mem::take(&mut seg)));
        }
        refs
    }

    /// Stores an oriented segment, deduplicating against previously seen
    /// arcs (in either direction) by the positional first/middle/last key.
    fn add_arc(&mut self, seg: Vec<[i64; 2]>) -> i32 {
        let mut reversed = seg.clone();
        reversed.reverse();
        let (canonical, was_reversed) = if reversed < seg {
            (reversed, true)
        } else {
            (seg, false)
        };

        let key = dedup_key(&canonical);
        let index = match self.by_key.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.arcs.len();
                self.arcs.push(delta_encode(&canonical));
                self.by_key.insert(key, i);
                i
            }
        };

        if was_reversed {
            -1 - index as i32
        } else {
            index as i32
        }
    }
}

fn min_point_position(points: &[[i64; 2]]) -> usize {
    let mut best = 0;
    for (i, p) in points.iter().enumerate() {
        if *p < points[best] {
            best = i;
        }
    }
    best
}

fn dedup_key(points: &[[i64; 2]]) -> String {
    let first = points[0];
    let middle = points[points.len() / 2];
    let last = points[points.len() - 1];
    format!(
        "{}_{},{}_{},{}_{}",
        first[0], first[1], middle[0], middle[1], last[0], last[1]
    )
}

fn delta_encode(points: &[[i64; 2]]) -> Vec<[i64; 2]> {
    let mut out = Vec::with_capacity(points.len());
    let mut prev = [0i64, 0i64];
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            out.push(*p);
        } else {
            out.push([p[0] - prev[0], p[1] - prev[1]]);
        }
        prev = *p;
    }
    out
}
