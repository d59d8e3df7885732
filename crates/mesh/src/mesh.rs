/// Indexed triangle mesh ready for GPU upload.
///
/// Positions are sphere-projected, 3 floats per vertex; indices reference
/// vertices, 3 per triangle; normals parallel the position buffer.
///
/// Ownership contract: whichever scene node attaches this mesh owns it and
/// must call [`TriangulatedMesh::dispose`] before dropping or replacing it,
/// otherwise the GPU-side copies of these buffers leak.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulatedMesh {
    positions: Vec<f32>,
    indices: Vec<u32>,
    normals: Vec<f32>,
    disposed: bool,
}

impl TriangulatedMesh {
    pub fn new(positions: Vec<f32>, indices: Vec<u32>, normals: Vec<f32>) -> Self {
        debug_assert_eq!(positions.len() % 3, 0);
        debug_assert_eq!(indices.len() % 3, 0);
        debug_assert_eq!(normals.len(), positions.len());
        Self {
            positions,
            indices,
            normals,
            disposed: false,
        }
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the buffers. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.positions = Vec::new();
        self.indices = Vec::new();
        self.normals = Vec::new();
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::TriangulatedMesh;

    #[test]
    fn counts_derive_from_buffer_lengths() {
        let mesh = TriangulatedMesh::new(
            vec![0.0; 12],
            vec![0, 1, 2, 0, 2, 3],
            vec![0.0; 12],
        );
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(!mesh.is_disposed());
    }

    #[test]
    fn dispose_releases_buffers_and_is_idempotent() {
        let mut mesh = TriangulatedMesh::new(vec![0.0; 9], vec![0, 1, 2], vec![0.0; 9]);
        mesh.dispose();
        assert!(mesh.is_disposed());
        assert!(mesh.positions().is_empty());
        assert!(mesh.indices().is_empty());
        mesh.dispose();
        assert!(mesh.is_disposed());
    }
}
