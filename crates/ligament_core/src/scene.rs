//! # Visual Nodes
//!
//! The seam towards the external scene graph. Entities hold a non-owning
//! [`NodeHandle`]; once per tick the entity layer writes a 4x4 matrix per
//! node through a [`VisualSink`].
//!
//! [`SceneNodes`] is a headless sink that keeps the matrices densely packed
//! so a renderer can upload them in one copy.

use glam::Mat4;

use crate::memory::{PoolAllocator, PoolHandle};

/// Opaque, non-owning handle to a visual node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeHandle(PoolHandle);

impl NodeHandle {
    /// Wraps a pool handle issued by a node table.
    #[inline]
    #[must_use]
    pub const fn from_pool(handle: PoolHandle) -> Self {
        Self(handle)
    }

    /// The underlying pool handle.
    #[inline]
    #[must_use]
    pub const fn pool_handle(self) -> PoolHandle {
        self.0
    }
}

/// Consumer of per-node world matrices.
pub trait VisualSink {
    /// Writes the world matrix of `node`.
    ///
    /// # Returns
    ///
    /// `false` if the node no longer exists.
    fn write_transform(&mut self, node: NodeHandle, matrix: Mat4) -> bool;
}

/// Headless node table.
#[derive(Debug)]
pub struct SceneNodes {
    nodes: PoolAllocator<Mat4>,
    writes: u64,
}

impl SceneNodes {
    /// Creates a table with room for `capacity` nodes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: PoolAllocator::new(capacity, Mat4::IDENTITY),
            writes: 0,
        }
    }

    /// Creates a node with an identity matrix.
    ///
    /// # Returns
    ///
    /// `None` when the table is full.
    pub fn create_node(&mut self) -> Option<NodeHandle> {
        self.nodes.allocate(Mat4::IDENTITY).map(NodeHandle)
    }

    /// Destroys a node. Handles to it stop resolving.
    pub fn destroy_node(&mut self, node: NodeHandle) -> bool {
        self.nodes.free(node.0).is_some()
    }

    /// Last matrix written to `node`.
    #[must_use]
    pub fn matrix(&self, node: NodeHandle) -> Option<Mat4> {
        self.nodes.get(node.0).copied()
    }

    /// Number of live nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.allocated_count()
    }

    /// Checks if no node is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total matrix writes since creation.
    #[inline]
    #[must_use]
    pub const fn write_count(&self) -> u64 {
        self.writes
    }

    /// Every slot's matrix as raw bytes, ready for upload.
    ///
    /// Freed slots read as identity matrices.
    #[must_use]
    pub fn matrix_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.nodes.as_slice())
    }
}

impl VisualSink for SceneNodes {
    fn write_transform(&mut self, node: NodeHandle, matrix: Mat4) -> bool {
        match self.nodes.get_mut(node.0) {
            Some(slot) => {
                *slot = matrix;
                self.writes += 1;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_write_and_read_back() {
        let mut nodes = SceneNodes::new(4);
        let node = nodes.create_node().unwrap();
        let matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        assert!(nodes.write_transform(node, matrix));
        assert_eq!(nodes.matrix(node), Some(matrix));
        assert_eq!(nodes.write_count(), 1);
    }

    #[test]
    fn test_stale_node_rejected() {
        let mut nodes = SceneNodes::new(1);
        let node = nodes.create_node().unwrap();
        assert!(nodes.destroy_node(node));

        let replacement = nodes.create_node().unwrap();
        assert!(!nodes.write_transform(node, Mat4::ZERO));
        assert_eq!(nodes.matrix(replacement), Some(Mat4::IDENTITY));
    }

    #[test]
    fn test_matrix_bytes_cover_capacity() {
        let nodes = SceneNodes::new(3);
        assert_eq!(nodes.matrix_bytes().len(), 3 * 64);
        assert!(nodes.is_empty());
    }
}
