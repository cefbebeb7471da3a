//! GPU-batched backend: one cached geometry buffer per layer, one draw
//! call per visible layer.
//!
//! Draw-call count scales with layer count instead of element count. The
//! cost is a triangulation + upload whenever a layer's membership changes;
//! pure pan/zoom reuses every batch untouched.

mod batch;
mod pipeline;
mod pool;

pub use pool::PoolStats;

use std::collections::BTreeMap;
use std::sync::Arc;

use maskview_core::{LayerKey, SceneGraph};
use uuid::Uuid;

use crate::backend::{DrawSummary, FrameTarget, LayerDraw, RenderBackend, RenderError};
use crate::viewport::Viewport;

use batch::LayerBatch;
use pipeline::LayerPipeline;
use pool::BufferPool;

/// The GPU-batched backend. Owns the device handle, the compiled pipeline,
/// the buffer pool, and one batch per layer key.
pub struct GpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    format: wgpu::TextureFormat,
    pipeline: Option<LayerPipeline>,
    pool: BufferPool,
    batches: BTreeMap<LayerKey, LayerBatch>,
    bound_source: Option<Uuid>,
}

impl GpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            format,
            pipeline: None,
            pool: BufferPool::new(),
            batches: BTreeMap::new(),
            bound_source: None,
        }
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl RenderBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn initialize(&mut self) -> Result<(), RenderError> {
        if self.pipeline.is_none() {
            self.pipeline = Some(LayerPipeline::new(&self.device, self.format));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    fn bind_scene(&mut self, scene: &SceneGraph) {
        // Member-id lists only identify elements within one source library;
        // a different library invalidates every cached mesh.
        let source_changed = self.bound_source != Some(scene.source_id());
        self.bound_source = Some(scene.source_id());

        // Reconcile batch membership; untouched layers keep their buffers.
        for (key, group) in scene.layers() {
            match self.batches.get_mut(key) {
                Some(batch) => {
                    batch.set_members(group.member_ids().to_vec());
                    if source_changed {
                        batch.mark_dirty();
                    }
                }
                None => {
                    self.batches
                        .insert(*key, LayerBatch::new(*key, group.member_ids().to_vec()));
                }
            }
        }
        let live: Vec<LayerKey> = self.batches.keys().copied().collect();
        for key in live {
            if scene.layer_group(&key).is_none() {
                if let Some(mut batch) = self.batches.remove(&key) {
                    batch.release_into(&mut self.pool);
                }
            }
        }
    }

    fn draw(
        &mut self,
        frame: &mut FrameTarget<'_>,
        layers: &[LayerDraw<'_>],
        viewport: &Viewport,
        scene: &SceneGraph,
        background: [f32; 4],
    ) -> Result<DrawSummary, RenderError> {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(RenderError::NotInitialized(self.name()));
        };
        let FrameTarget::Gpu(gpu) = frame else {
            return Err(RenderError::TargetMismatch {
                backend: self.name(),
            });
        };

        // Rebuild only batches whose membership changed since their last
        // upload; pan/zoom leaves every batch clean.
        let mut batches_rebuilt = 0;
        for ld in layers {
            if let Some(batch) = self.batches.get_mut(&ld.key) {
                if batch.is_dirty() {
                    batch.rebuild(
                        scene,
                        &self.device,
                        &self.queue,
                        &mut self.pool,
                        pipeline.layer_bgl(),
                    );
                    batches_rebuilt += 1;
                }
            }
        }

        pipeline.write_view(&self.queue, viewport);
        for ld in layers {
            let batch = self.batches.get(&ld.key);
            if let Some(buffers) = batch.and_then(|b| b.buffers()) {
                let [r, g, b, a] = ld.style.rgba();
                buffers.write_style(&self.queue, [r * a, g * a, b * a, a]);
            }
        }

        let mut rpass = gpu.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("maskview layer pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: gpu.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: background[0] as f64,
                        g: background[1] as f64,
                        b: background[2] as f64,
                        a: background[3] as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(pipeline.pipeline());
        rpass.set_bind_group(0, pipeline.frame_bind_group(), &[]);

        let mut draw_calls = 0;
        for ld in layers {
            let Some(batch) = self.batches.get(&ld.key) else {
                continue;
            };
            if batch.index_count() == 0 {
                continue;
            }
            let Some(buffers) = batch.buffers() else {
                continue;
            };
            rpass.set_bind_group(1, &buffers.bind_group, &[]);
            rpass.set_vertex_buffer(0, buffers.vertex.slice(..));
            rpass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..batch.index_count(), 0, 0..1);
            draw_calls += 1;
        }

        Ok(DrawSummary {
            draw_calls,
            batches_rebuilt,
        })
    }

    fn dispose(&mut self) {
        for (_, mut batch) in std::mem::take(&mut self.batches) {
            batch.release_into(&mut self.pool);
        }
        self.pool.dispose();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy();
        }
    }
}
