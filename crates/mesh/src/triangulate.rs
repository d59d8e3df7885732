use earcutr::earcut;
use foundation::math::{Vec3, lon_lat_to_sphere};

use crate::mesh::TriangulatedMesh;

#[derive(Debug)]
pub enum TriangulationError {
    /// Fewer than three usable points in the exterior ring, or the
    /// triangulator produced no triangles.
    DegenerateRing { country: Option<String> },
    Earcut {
        reason: String,
        country: Option<String>,
    },
    /// The background worker went away with this request still in flight.
    /// Retryable: re-issue against a fresh worker or a sync triangulator.
    WorkerTerminated,
}

impl TriangulationError {
    /// Attaches the originating country id when it is not already set.
    pub fn with_country(self, country: Option<&str>) -> Self {
        let Some(id) = country else {
            return self;
        };
        match self {
            TriangulationError::DegenerateRing { country: None } => {
                TriangulationError::DegenerateRing {
                    country: Some(id.to_string()),
                }
            }
            TriangulationError::Earcut {
                reason,
                country: None,
            } => TriangulationError::Earcut {
                reason,
                country: Some(id.to_string()),
            },
            other => other,
        }
    }

    pub fn country(&self) -> Option<&str> {
        match self {
            TriangulationError::DegenerateRing { country }
            | TriangulationError::Earcut { country, .. } => country.as_deref(),
            TriangulationError::WorkerTerminated => None,
        }
    }
}

impl std::fmt::Display for TriangulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let country = |c: &Option<String>| match c {
            Some(id) => format!(" for {id}"),
            None => String::new(),
        };
        match self {
            TriangulationError::DegenerateRing { country: c } => {
                write!(f, "degenerate ring{}", country(c))
            }
            TriangulationError::Earcut { reason, country: c } => {
                write!(f, "earcut failed{}: {reason}", country(c))
            }
            TriangulationError::WorkerTerminated => write!(f, "worker terminated"),
        }
    }
}

impl std::error::Error for TriangulationError {}

/// Triangulates a polygon (exterior ring + holes) and projects it onto a
/// sphere of the given radius.
///
/// Triangulation runs in 2D lon/lat space first and every vertex is
/// projected independently afterwards; triangulating on the curved surface
/// directly is not well-defined. Known limitation: rings that wrap the
/// antimeridian must be pre-split by the caller, otherwise their 2D footprint
/// spans the whole map and the fill is wrong.
///
/// Output guarantees: `indices.len()` is a multiple of 3, every index is in
/// bounds, and triangle winding is counter-clockwise seen from outside the
/// sphere (normals point outward).
pub fn triangulate_rings(
    rings: &[Vec<[f64; 2]>],
    radius: f64,
) -> Result<TriangulatedMesh, TriangulationError> {
    let (vertices_2d, triangles) = earcut_rings(rings)?;

    let mut positions: Vec<f32> = Vec::with_capacity(vertices_2d.len() * 3);
    let mut projected: Vec<Vec3> = Vec::with_capacity(vertices_2d.len());
    for p in &vertices_2d {
        let v = lon_lat_to_sphere(p[0], p[1], radius);
        projected.push(v);
        positions.push(v.x as f32);
        positions.push(v.y as f32);
        positions.push(v.z as f32);
    }

    let mut indices: Vec<u32> = triangles.iter().map(|&i| i as u32).collect();
    orient_outward(&projected, &mut indices);

    // On a sphere the outward normal at a vertex is just its direction.
    let mut normals: Vec<f32> = Vec::with_capacity(positions.len());
    for v in &projected {
        let n = v.normalized();
        normals.push(n.x as f32);
        normals.push(n.y as f32);
        normals.push(n.z as f32);
    }

    Ok(TriangulatedMesh::new(positions, indices, normals))
}

/// 2D stage: flatten rings, run earcut, return the surviving vertices and
/// the triangle index list over them.
pub(crate) fn earcut_rings(
    rings: &[Vec<[f64; 2]>],
) -> Result<(Vec<[f64; 2]>, Vec<usize>), TriangulationError> {
    let mut vertices: Vec<[f64; 2]> = Vec::new();
    let mut coords: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();

    for (ring_i, ring) in rings.iter().enumerate() {
        let mut pts = ring.clone();
        drop_closing_duplicate(&mut pts);
        if pts.len() < 3 {
            if ring_i == 0 {
                return Err(TriangulationError::DegenerateRing { country: None });
            }
            // A degenerate hole cannot punch anything out; skip it.
            continue;
        }

        if ring_i > 0 {
            hole_indices.push(vertices.len());
        }
        for p in pts {
            coords.push(p[0]);
            coords.push(p[1]);
            vertices.push(p);
        }
    }

    if vertices.len() < 3 {
        return Err(TriangulationError::DegenerateRing { country: None });
    }

    let triangles = earcut(&coords, &hole_indices, 2).map_err(|e| TriangulationError::Earcut {
        reason: format!("{e:?}"),
        country: None,
    })?;
    if triangles.is_empty() {
        return Err(TriangulationError::DegenerateRing { country: None });
    }

    Ok((vertices, triangles))
}

fn drop_closing_duplicate(points: &mut Vec<[f64; 2]>) {
    if points.len() >= 2 {
        let first = points[0];
        let last = points[points.len() - 1];
        if (first[0] - last[0]).abs() < 1e-9 && (first[1] - last[1]).abs() < 1e-9 {
            points.pop();
        }
    }
}

/// Flips any triangle whose face normal points into the sphere.
fn orient_outward(projected: &[Vec3], indices: &mut [u32]) {
    for tri in indices.chunks_exact_mut(3) {
        let a = projected[tri[0] as usize];
        let b = projected[tri[1] as usize];
        let c = projected[tri[2] as usize];
        let face = (b - a).cross(c - a);
        let centroid = Vec3::new(
            (a.x + b.x + c.x) / 3.0,
            (a.y + b.y + c.y) / 3.0,
            (a.z + b.z + c.z) / 3.0,
        );
        if face.dot(centroid) < 0.0 {
            tri.swap(1, 2);
        }
    }
}
