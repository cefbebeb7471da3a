//! Per-layer geometry batches.
//!
//! A batch holds the triangulated mesh for *all* member elements of one
//! layer plus a pooled GPU buffer set. It is rebuilt only when its member
//! list changes (scene rebuild); pan and zoom touch the view uniform and
//! never the batch, which is the key performance invariant of this
//! backend.

use maskview_core::{Element, LayerKey, SceneGraph};

use super::pool::{BatchBuffers, BufferPool};
use crate::tess::MeshBuffer;

/// Node markers in the batched backend are fixed world-unit quads; a
/// zoom-independent pixel size would need per-frame geometry.
const NODE_MARKER_HALF: f64 = 0.5;

pub(crate) struct LayerBatch {
    pub key: LayerKey,
    members: Vec<u32>,
    mesh: MeshBuffer,
    buffers: Option<BatchBuffers>,
    index_count: u32,
    dirty: bool,
}

impl LayerBatch {
    pub fn new(key: LayerKey, members: Vec<u32>) -> Self {
        Self {
            key,
            members,
            mesh: MeshBuffer::new(),
            buffers: None,
            index_count: 0,
            dirty: true,
        }
    }

    /// Reconcile membership; the batch only goes dirty when the member
    /// list actually changed.
    pub fn set_members(&mut self, members: Vec<u32>) {
        if self.members != members {
            self.members = members;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force a rebuild regardless of membership, used when the scene's
    /// source library changed and cached geometry cannot be trusted.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn buffers(&self) -> Option<&BatchBuffers> {
        self.buffers.as_ref()
    }

    /// Re-triangulate the mesh from the scene and upload it into pooled
    /// buffers. Degenerate members are skipped by the triangulator; text
    /// geometry belongs to the direct backend and is not batched.
    pub fn rebuild(
        &mut self,
        scene: &SceneGraph,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pool: &mut BufferPool,
        layer_bgl: &wgpu::BindGroupLayout,
    ) {
        self.mesh.clear();
        let mut skipped_text = 0usize;
        for &id in &self.members {
            let Some(el) = scene.element_by_id(id) else {
                continue;
            };
            match &el.element {
                Element::Boundary(b) => {
                    self.mesh.push_polygon(&b.points);
                }
                Element::Box(b) => {
                    self.mesh.push_polygon(&b.points);
                }
                Element::Path(p) => {
                    self.mesh.push_stroked_path(&p.points, p.width);
                }
                Element::Node(n) => {
                    for pt in &n.points {
                        self.mesh.push_marker(pt, NODE_MARKER_HALF);
                    }
                }
                Element::Text(_) => skipped_text += 1,
                Element::SingleRef(_) | Element::GridRef(_) => {}
            }
        }
        if skipped_text > 0 {
            log::debug!(
                "layer {}: {} text elements not batched",
                self.key,
                skipped_text
            );
        }

        self.index_count = self.mesh.indices.len() as u32;
        if self.mesh.is_empty() {
            self.dirty = false;
            return;
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.mesh.indices);

        let needs_new = match self.buffers.as_ref() {
            Some(b) => !b.fits(vertex_bytes.len() as u64, index_bytes.len() as u64),
            None => true,
        };
        if needs_new {
            if let Some(old) = self.buffers.take() {
                pool.release(old);
            }
            self.buffers = Some(pool.acquire(
                device,
                layer_bgl,
                vertex_bytes.len() as u64,
                index_bytes.len() as u64,
            ));
        }
        if let Some(buffers) = self.buffers.as_ref() {
            queue.write_buffer(&buffers.vertex, 0, vertex_bytes);
            queue.write_buffer(&buffers.index, 0, index_bytes);
        }
        self.dirty = false;
    }

    /// Hand the GPU residency back to the pool.
    pub fn release_into(&mut self, pool: &mut BufferPool) {
        if let Some(buffers) = self.buffers.take() {
            pool.release(buffers);
        }
        self.index_count = 0;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_members_stay_clean() {
        let mut batch = LayerBatch::new(LayerKey::new(1, 0), vec![0, 1, 2]);
        batch.dirty = false;
        batch.set_members(vec![0, 1, 2]);
        assert!(!batch.is_dirty());
        batch.set_members(vec![0, 1]);
        assert!(batch.is_dirty());
    }
}
