/// Indexed line-segment mesh for border rendering.
///
/// Positions are sphere-projected, 3 floats per vertex; indices come in
/// pairs, one pair per segment. Same ownership contract as the triangle
/// meshes: the owner calls [`LineMesh::dispose`] before dropping it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMesh {
    positions: Vec<f32>,
    indices: Vec<u32>,
    disposed: bool,
}

impl LineMesh {
    pub fn new(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        debug_assert_eq!(positions.len() % 3, 0);
        debug_assert_eq!(indices.len() % 2, 0);
        Self {
            positions,
            indices,
            disposed: false,
        }
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn segment_count(&self) -> usize {
        self.indices.len() / 2
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the buffers. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.positions = Vec::new();
        self.indices = Vec::new();
        self.disposed = true;
    }
}
