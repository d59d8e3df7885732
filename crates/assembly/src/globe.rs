use std::collections::{BTreeMap, HashMap};

use foundation::math::lon_lat_to_sphere;
use mesh::mesh::TriangulatedMesh;
use mesh::worker::{RequestId, TriangulationJob, Triangulator};
use topology::document::{COUNTRIES_OBJECT, TopoGeometry, Topology, TopologyError};
use tracing::warn;

use crate::line::LineMesh;

#[derive(Debug)]
pub enum AssemblyError {
    /// The topology document carries no countries object.
    MissingCountriesObject,
    Topology { source: TopologyError },
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyError::MissingCountriesObject => {
                write!(f, "topology has no \"{COUNTRIES_OBJECT}\" object")
            }
            AssemblyError::Topology { source } => write!(f, "topology error: {source}"),
        }
    }
}

impl std::error::Error for AssemblyError {}

/// Everything the globe scene attaches: one border line mesh plus one fill
/// mesh per country, keyed by country id.
#[derive(Debug)]
pub struct GlobeAssembly {
    pub borders: LineMesh,
    pub fills: BTreeMap<String, TriangulatedMesh>,
}

impl GlobeAssembly {
    pub fn dispose(&mut self) {
        self.borders.dispose();
        for mesh in self.fills.values_mut() {
            mesh.dispose();
        }
    }
}

/// Builds the renderable globe from a topology document.
///
/// Borders come straight from the arc table: every deduplicated arc is
/// projected once, so a border shared by two countries is drawn once. Fills
/// are stitched back per country from arc references and triangulated
/// through `triangulator`; a country whose triangulation fails is logged
/// and skipped rather than failing the whole assembly. A dangling arc
/// reference is a document defect and fails hard.
pub fn assemble(
    topology: &Topology,
    triangulator: &mut dyn Triangulator,
    radius: f64,
) -> Result<GlobeAssembly, AssemblyError> {
    let object = topology
        .objects
        .get(COUNTRIES_OBJECT)
        .ok_or(AssemblyError::MissingCountriesObject)?;

    let borders = border_mesh(topology, radius);

    // Submit one job per polygon so a multi-part country triangulates part
    // by part; results correlate back through the request id.
    let mut pending: HashMap<RequestId, (String, usize)> = HashMap::new();
    for feature in &object.features {
        let polygons = match &feature.geometry {
            TopoGeometry::Polygon { arcs } => vec![arcs.clone()],
            TopoGeometry::MultiPolygon { arcs } => arcs.clone(),
            TopoGeometry::Unsupported { kind } => {
                warn!(country = %feature.id, kind = %kind, "unsupported geometry, skipping");
                continue;
            }
        };

        for (poly_i, ring_refs) in polygons.iter().enumerate() {
            let mut rings: Vec<Vec<[f64; 2]>> = Vec::with_capacity(ring_refs.len());
            for refs in ring_refs {
                rings.push(
                    topology
                        .resolve_ring(refs)
                        .map_err(|source| AssemblyError::Topology { source })?,
                );
            }
            let id = triangulator.submit(TriangulationJob {
                rings,
                radius,
                country: Some(feature.id.clone()),
            });
            pending.insert(id, (feature.id.clone(), poly_i));
        }
    }

    let mut parts: BTreeMap<String, Vec<(usize, TriangulatedMesh)>> = BTreeMap::new();
    for (id, result) in triangulator.drain() {
        let Some((country, poly_i)) = pending.remove(&id) else {
            continue;
        };
        match result {
            Ok(mesh) => parts.entry(country).or_default().push((poly_i, mesh)),
            Err(e) => {
                warn!(country = %country, error = %e, "triangulation failed, skipping polygon");
            }
        }
    }

    let mut fills = BTreeMap::new();
    for (country, mut meshes) in parts {
        meshes.sort_by_key(|(poly_i, _)| *poly_i);
        fills.insert(country, merge_meshes(meshes.into_iter().map(|(_, m)| m)));
    }

    Ok(GlobeAssembly { borders, fills })
}

/// Projects every arc once into a single indexed line mesh.
fn border_mesh(topology: &Topology, radius: f64) -> LineMesh {
    let mut positions: Vec<f32> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for index in 0..topology.arcs.len() {
        let Some(coords) = topology.decode_arc(index) else {
            continue;
        };
        if coords.len() < 2 {
            continue;
        }
        let base = (positions.len() / 3) as u32;
        for p in &coords {
            let v = lon_lat_to_sphere(p[0], p[1], radius);
            positions.push(v.x as f32);
            positions.push(v.y as f32);
            positions.push(v.z as f32);
        }
        for i in 0..coords.len() as u32 - 1 {
            indices.push(base + i);
            indices.push(base + i + 1);
        }
    }

    LineMesh::new(positions, indices)
}

/// Concatenates per-polygon meshes into one mesh with rebased indices.
fn merge_meshes(meshes: impl Iterator<Item = TriangulatedMesh>) -> TriangulatedMesh {
    let mut positions: Vec<f32> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut normals: Vec<f32> = Vec::new();

    for mesh in meshes {
        let base = (positions.len() / 3) as u32;
        positions.extend_from_slice(mesh.positions());
        normals.extend_from_slice(mesh.normals());
        indices.extend(mesh.indices().iter().map(|&i| base + i));
    }

    TriangulatedMesh::new(positions, indices, normals)
}

#[cfg(test)]
mod tests {
    use super::{AssemblyError, assemble};
    use foundation::math::Vec3;
    use mesh::worker::{SyncTriangulator, WorkerTriangulator};
    use topology::builder::{TopologyOptions, build_topology};
    use topology::document::Topology;
    use topology::geojson::FeatureCollection;

    fn squares_topology() -> Topology {
        let fc = FeatureCollection::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"NAME":"Westral","ISO_A3":"WST"},
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type":"Feature","properties":{"NAME":"Eastral","ISO_A3":"EST"},
                 "geometry":{"type":"Polygon","coordinates":[[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}]}"#,
        )
        .expect("parse fixture");
        build_topology(
            &fc,
            &TopologyOptions {
                simplify_tolerance: 0.0,
                quantization: 5.0,
            },
        )
    }

    #[test]
    fn assembles_fills_for_every_country() {
        let topo = squares_topology();
        let mut t = SyncTriangulator::new();
        let assembly = assemble(&topo, &mut t, 2.0).expect("assemble");

        assert_eq!(assembly.fills.len(), 2);
        for mesh in assembly.fills.values() {
            assert!(mesh.triangle_count() >= 2);
            for v in mesh.positions().chunks_exact(3) {
                let len = Vec3::new(v[0] as f64, v[1] as f64, v[2] as f64).length();
                assert!((len - 2.0).abs() < 1e-5, "fill vertex off the sphere: {len}");
            }
        }
    }

    #[test]
    fn borders_draw_each_shared_arc_once() {
        let topo = squares_topology();
        assert_eq!(topo.arcs.len(), 3);

        let mut t = SyncTriangulator::new();
        let assembly = assemble(&topo, &mut t, 1.0).expect("assemble");

        let expected_vertices: usize = (0..topo.arcs.len())
            .map(|i| topo.decode_arc(i).map(|a| a.len()).unwrap_or(0))
            .sum();
        assert_eq!(assembly.borders.vertex_count(), expected_vertices);

        let expected_segments: usize = (0..topo.arcs.len())
            .map(|i| topo.decode_arc(i).map(|a| a.len() - 1).unwrap_or(0))
            .sum();
        assert_eq!(assembly.borders.segment_count(), expected_segments);
    }

    #[test]
    fn multipolygon_parts_merge_into_one_mesh() {
        let fc = FeatureCollection::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"NAME":"Twin Isles","ISO_A3":"TWN"},
                 "geometry":{"type":"MultiPolygon","coordinates":[
                    [[[0,0],[1,0],[1,1],[0,1],[0,0]]],
                    [[[3,0],[4,0],[4,1],[3,1],[3,0]]]]}}]}"#,
        )
        .expect("parse fixture");
        let topo = build_topology(
            &fc,
            &TopologyOptions {
                simplify_tolerance: 0.0,
                quantization: 9.0,
            },
        );

        let mut t = SyncTriangulator::new();
        let assembly = assemble(&topo, &mut t, 1.0).expect("assemble");

        assert_eq!(assembly.fills.len(), 1);
        let mesh = &assembly.fills["TWN"];
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 4);
        let verts = mesh.vertex_count() as u32;
        assert!(mesh.indices().iter().all(|&i| i < verts));
    }

    #[test]
    fn works_against_the_background_worker() {
        let topo = squares_topology();
        let mut worker = WorkerTriangulator::spawn().expect("spawn worker");
        let assembly = assemble(&topo, &mut worker, 1.0).expect("assemble");
        assert_eq!(assembly.fills.len(), 2);
    }

    #[test]
    fn missing_countries_object_is_an_error() {
        let mut topo = squares_topology();
        topo.objects.clear();
        let mut t = SyncTriangulator::new();
        assert!(matches!(
            assemble(&topo, &mut t, 1.0),
            Err(AssemblyError::MissingCountriesObject)
        ));
    }

    #[test]
    fn dispose_releases_every_mesh() {
        let topo = squares_topology();
        let mut t = SyncTriangulator::new();
        let mut assembly = assemble(&topo, &mut t, 1.0).expect("assemble");
        assembly.dispose();
        assert!(assembly.borders.is_disposed());
        assert!(assembly.fills.values().all(|m| m.is_disposed()));
    }
}
