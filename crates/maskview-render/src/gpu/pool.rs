//! Reusable GPU buffer handles for layer batches.
//!
//! Batches acquire a handle set on first upload and release it when their
//! layer disappears or the backend is disposed; pooled buffers are
//! recreated only when a batch outgrows them, which keeps GPU memory
//! bounded and allocation churn low.

use super::pipeline::LayerUniform;

/// One batch's GPU residency: vertex + index buffers, the per-layer
/// uniform, and its bind group.
pub(crate) struct BatchBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub uniform: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    vertex_capacity: u64,
    index_capacity: u64,
}

impl BatchBuffers {
    pub fn fits(&self, vertex_bytes: u64, index_bytes: u64) -> bool {
        vertex_bytes <= self.vertex_capacity && index_bytes <= self.index_capacity
    }

    /// Write the per-layer color uniform (premultiplied RGBA).
    pub fn write_style(&self, queue: &wgpu::Queue, rgba: [f32; 4]) {
        let u = LayerUniform { color: rgba };
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&u));
    }

    fn destroy(&self) {
        self.vertex.destroy();
        self.index.destroy();
        self.uniform.destroy();
    }
}

/// Pool statistics for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub reused: usize,
    pub free: usize,
}

/// A small pool of reusable [`BatchBuffers`].
#[derive(Default)]
pub(crate) struct BufferPool {
    free: Vec<BatchBuffers>,
    created: usize,
    reused: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a buffer set with at least the requested capacities,
    /// reusing a free set when one fits.
    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        layer_bgl: &wgpu::BindGroupLayout,
        vertex_bytes: u64,
        index_bytes: u64,
    ) -> BatchBuffers {
        if let Some(pos) = self
            .free
            .iter()
            .position(|b| b.fits(vertex_bytes, index_bytes))
        {
            self.reused += 1;
            return self.free.swap_remove(pos);
        }

        // Nothing fits: recycle the geometry buffers of a free set if one
        // exists, otherwise build from scratch.
        if let Some(mut old) = self.free.pop() {
            old.vertex.destroy();
            old.index.destroy();
            let (vertex, index, vcap, icap) =
                Self::create_geometry(device, vertex_bytes, index_bytes);
            old.vertex = vertex;
            old.index = index;
            old.vertex_capacity = vcap;
            old.index_capacity = icap;
            self.reused += 1;
            return old;
        }

        self.created += 1;
        let (vertex, index, vertex_capacity, index_capacity) =
            Self::create_geometry(device, vertex_bytes, index_bytes);

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("maskview layer ubo"),
            size: std::mem::size_of::<LayerUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("maskview layer bind group"),
            layout: layer_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        BatchBuffers {
            vertex,
            index,
            uniform,
            bind_group,
            vertex_capacity,
            index_capacity,
        }
    }

    fn create_geometry(
        device: &wgpu::Device,
        vertex_bytes: u64,
        index_bytes: u64,
    ) -> (wgpu::Buffer, wgpu::Buffer, u64, u64) {
        let vcap = vertex_bytes.next_power_of_two().max(256);
        let icap = index_bytes.next_power_of_two().max(256);
        let vertex = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("maskview batch vbo"),
            size: vcap,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("maskview batch ibo"),
            size: icap,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        (vertex, index, vcap, icap)
    }

    pub fn release(&mut self, buffers: BatchBuffers) {
        self.free.push(buffers);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            free: self.free.len(),
        }
    }

    /// Destroy every pooled buffer. Called on backend disposal after all
    /// batches have released their handles.
    pub fn dispose(&mut self) {
        for buffers in self.free.drain(..) {
            buffers.destroy();
        }
    }
}
