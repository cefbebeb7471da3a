//! Backend-independent renderer contract.
//!
//! The engine resolves what is visible and in which order; backends only
//! draw. Frame targets are a closed enum over the supported surfaces; a
//! backend handed the wrong variant reports a mismatch instead of drawing.

use maskview_core::{LayerKey, SceneGraph, SpatialElement};
use thiserror::Error;

use crate::raster::Pixmap;
use crate::style::LayerStyle;
use crate::viewport::Viewport;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("backend '{0}' is not initialized")]
    NotInitialized(&'static str),

    #[error("backend '{backend}' cannot draw to this frame target")]
    TargetMismatch { backend: &'static str },

    #[error("render failed: {0}")]
    Backend(String),
}

/// One visible layer, in stacking order, with its resolved style and the
/// deduplicated viewport-visible elements on it.
pub struct LayerDraw<'a> {
    pub key: LayerKey,
    pub style: LayerStyle,
    pub elements: Vec<&'a SpatialElement>,
}

/// What a backend reports back after drawing a frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawSummary {
    pub draw_calls: usize,
    pub batches_rebuilt: usize,
}

/// Per-frame drawing surface for the GPU backend; the device and queue are
/// owned by the backend itself.
pub struct GpuFrame<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
}

/// The surface a frame is drawn into.
pub enum FrameTarget<'a> {
    /// CPU pixel buffer for the direct rasterization backend.
    Pixmap(&'a mut Pixmap),
    /// Encoder + color view for the GPU-batched backend.
    Gpu(GpuFrame<'a>),
}

/// Core backend interface.
///
/// Lifecycle: `initialize` before first draw, `dispose` releases every
/// backend-owned resource. Switching backends means disposing the old one
/// first; scene graph and styles re-attach to the new backend unchanged.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    fn initialize(&mut self) -> Result<(), RenderError>;

    fn is_ready(&self) -> bool;

    /// Called whenever the scene graph is (re)built or cleared. Backends
    /// that cache per-layer geometry reconcile membership here; pan/zoom
    /// never routes through this.
    fn bind_scene(&mut self, scene: &SceneGraph);

    /// Draw one frame: the visible layers in ascending key order.
    fn draw(
        &mut self,
        frame: &mut FrameTarget<'_>,
        layers: &[LayerDraw<'_>],
        viewport: &Viewport,
        scene: &SceneGraph,
        background: [f32; 4],
    ) -> Result<DrawSummary, RenderError>;

    /// Release all backend resources. The backend may be re-initialized
    /// afterwards.
    fn dispose(&mut self);
}
