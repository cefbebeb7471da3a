//! # MaskView Render
//!
//! Rendering engine for the MaskView layout canvas: viewport/camera math,
//! per-layer styling, statistics, and two interchangeable backends behind
//! one contract. The direct backend rasterizes each element on the CPU;
//! the GPU-batched backend triangulates each layer once and redraws it
//! with a single draw call.

pub mod backend;
pub mod engine;
pub mod gpu;
pub mod raster;
pub mod stats;
pub mod style;
pub mod tess;
pub mod viewport;

pub use backend::{DrawSummary, FrameTarget, GpuFrame, LayerDraw, RenderBackend, RenderError};
pub use engine::LayoutView;
pub use gpu::GpuBackend;
pub use raster::{Pixmap, RasterBackend};
pub use stats::{FrameClock, RenderStats};
pub use style::{LayerColor, LayerStyle, StyleRegistry};
pub use tess::{triangulate, MeshBuffer, TriangulateError};
pub use viewport::{DetailLevel, Viewport};
