//! Direct rasterization backend: draws visible elements one at a time into
//! a CPU pixel buffer.
//!
//! One fill per element (scanline, even-odd) and one stroke pass per path;
//! draw-call count scales with visible element count. No GPU, no setup
//! cost; this is the universally available fallback backend.

use maskview_core::{Element, SceneGraph, SpatialElement};

use crate::backend::{DrawSummary, FrameTarget, LayerDraw, RenderBackend, RenderError};
use crate::viewport::Viewport;

/// Owned RGBA8 pixel surface.
#[derive(Debug, Clone)]
pub struct Pixmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Pixmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Fill the whole surface with an opaque color.
    pub fn fill(&mut self, color: [f32; 4]) {
        let rgba = [
            (color[0] * 255.0) as u8,
            (color[1] * 255.0) as u8,
            (color[2] * 255.0) as u8,
            (color[3] * 255.0) as u8,
        ];
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Source-over blend of one pixel; out-of-bounds coordinates are
    /// clipped.
    fn blend_pixel(&mut self, x: i64, y: i64, color: [f32; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = ((y as u32 * self.width + x as u32) * 4) as usize;
        let a = color[3].clamp(0.0, 1.0);
        for c in 0..3 {
            let src = color[c] * 255.0;
            let dst = self.pixels[i + c] as f32;
            self.pixels[i + c] = (src * a + dst * (1.0 - a)).round() as u8;
        }
        let dst_a = self.pixels[i + 3] as f32 / 255.0;
        self.pixels[i + 3] = ((a + dst_a * (1.0 - a)) * 255.0).round() as u8;
    }

    /// Even-odd scanline fill of a polygon given in screen coordinates.
    fn fill_polygon(&mut self, pts: &[(f64, f64)], color: [f32; 4]) {
        if pts.len() < 3 {
            return;
        }
        let min_y = pts.iter().map(|p| p.1).fold(f64::MAX, f64::min).floor() as i64;
        let max_y = pts.iter().map(|p| p.1).fold(f64::MIN, f64::max).ceil() as i64;
        let y0 = min_y.max(0);
        let y1 = max_y.min(self.height as i64 - 1);

        let mut xs: Vec<f64> = Vec::with_capacity(8);
        for py in y0..=y1 {
            let sy = py as f64 + 0.5;
            xs.clear();
            for i in 0..pts.len() {
                let (x0e, y0e) = pts[i];
                let (x1e, y1e) = pts[(i + 1) % pts.len()];
                if (y0e <= sy && sy < y1e) || (y1e <= sy && sy < y0e) {
                    xs.push(x0e + (sy - y0e) * (x1e - x0e) / (y1e - y0e));
                }
            }
            xs.sort_by(|a, b| a.total_cmp(b));
            for span in xs.chunks_exact(2) {
                let sx0 = span[0].round().max(0.0) as i64;
                let sx1 = (span[1].round() as i64).min(self.width as i64 - 1);
                for px in sx0..sx1 {
                    self.blend_pixel(px, py, color);
                }
            }
        }
    }

    /// Stroke a polyline by filling one quad per segment.
    fn stroke_polyline(&mut self, pts: &[(f64, f64)], width: f64, color: [f32; 4]) {
        let half = (width.max(1.0)) / 2.0;
        for seg in pts.windows(2) {
            let (x0, y0) = seg[0];
            let (x1, y1) = seg[1];
            let (dx, dy) = (x1 - x0, y1 - y0);
            let len = (dx * dx + dy * dy).sqrt();
            if len <= 0.0 || !len.is_finite() {
                continue;
            }
            let (nx, ny) = (-dy / len * half, dx / len * half);
            self.fill_polygon(
                &[
                    (x0 + nx, y0 + ny),
                    (x1 + nx, y1 + ny),
                    (x1 - nx, y1 - ny),
                    (x0 - nx, y0 - ny),
                ],
                color,
            );
        }
    }

    /// Small screen-space square marker.
    fn fill_marker(&mut self, x: f64, y: f64, half: i64, color: [f32; 4]) {
        let (cx, cy) = (x.round() as i64, y.round() as i64);
        for py in (cy - half)..=(cy + half) {
            for px in (cx - half)..=(cx + half) {
                self.blend_pixel(px, py, color);
            }
        }
    }
}

/// Marker half-extent in pixels for nodes and text anchors.
const MARKER_HALF_PX: i64 = 2;

/// The direct rasterization backend.
#[derive(Debug, Default)]
pub struct RasterBackend {
    ready: bool,
}

impl RasterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw_element(
        &self,
        pixmap: &mut Pixmap,
        el: &SpatialElement,
        viewport: &Viewport,
        color: [f32; 4],
    ) -> usize {
        let to_screen =
            |pts: &[maskview_core::Point]| -> Vec<(f64, f64)> {
                pts.iter().map(|p| viewport.world_to_screen(p)).collect()
            };
        match &el.element {
            Element::Boundary(b) => {
                pixmap.fill_polygon(&to_screen(&b.points), color);
                1
            }
            Element::Box(b) => {
                pixmap.fill_polygon(&to_screen(&b.points), color);
                1
            }
            Element::Path(p) => {
                let width_px = p.width * viewport.zoom;
                pixmap.stroke_polyline(&to_screen(&p.points), width_px, color);
                1
            }
            Element::Node(n) => {
                for (x, y) in to_screen(&n.points) {
                    pixmap.fill_marker(x, y, MARKER_HALF_PX, color);
                }
                1
            }
            Element::Text(t) => {
                let (x, y) = viewport.world_to_screen(&t.anchor);
                pixmap.fill_marker(x, y, MARKER_HALF_PX, color);
                1
            }
            // References never survive resolution.
            Element::SingleRef(_) | Element::GridRef(_) => 0,
        }
    }
}

impl RenderBackend for RasterBackend {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn initialize(&mut self) -> Result<(), RenderError> {
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn bind_scene(&mut self, _scene: &SceneGraph) {}

    fn draw(
        &mut self,
        frame: &mut FrameTarget<'_>,
        layers: &[LayerDraw<'_>],
        viewport: &Viewport,
        _scene: &SceneGraph,
        background: [f32; 4],
    ) -> Result<DrawSummary, RenderError> {
        if !self.ready {
            return Err(RenderError::NotInitialized(self.name()));
        }
        let FrameTarget::Pixmap(pixmap) = frame else {
            return Err(RenderError::TargetMismatch {
                backend: self.name(),
            });
        };

        pixmap.fill(background);
        let mut draw_calls = 0;
        for layer in layers {
            let color = layer.style.rgba();
            for el in &layer.elements {
                draw_calls += self.draw_element(pixmap, el, viewport, color);
            }
        }
        Ok(DrawSummary {
            draw_calls,
            batches_rebuilt: 0,
        })
    }

    fn dispose(&mut self) {
        self.ready = false;
    }
}
