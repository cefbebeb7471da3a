//! The `LayoutView` facade: the surface the embedding application talks to.
//!
//! Owns the scene graph, layer styles, statistics, and the active render
//! backend. A render pass queries the scene for the viewport, groups the
//! deduplicated result by layer key in ascending order, and hands the
//! ordered set to the backend.

use std::collections::BTreeMap;
use std::time::Instant;

use maskview_core::{
    BBox, LayerKey, Library, Point, QuadTreeConfig, SceneError, SceneGraph, SpatialElement,
};

use crate::backend::{FrameTarget, LayerDraw, RenderBackend, RenderError};
use crate::stats::{FrameClock, RenderStats};
use crate::style::{LayerStyle, StyleRegistry};
use crate::viewport::Viewport;

/// Default canvas background, a dark neutral.
pub const DEFAULT_BACKGROUND: [f32; 4] = [0.08, 0.08, 0.10, 1.0];

pub struct LayoutView {
    library: Option<Library>,
    scene: SceneGraph,
    styles: StyleRegistry,
    backend: Box<dyn RenderBackend>,
    clock: FrameClock,
    stats: RenderStats,
    background: [f32; 4],
    start_structure: Option<String>,
    quad_config: QuadTreeConfig,
}

impl LayoutView {
    /// Wrap and initialize a backend.
    pub fn new(mut backend: Box<dyn RenderBackend>) -> Result<Self, RenderError> {
        backend.initialize()?;
        Ok(Self {
            library: None,
            scene: SceneGraph::empty(),
            styles: StyleRegistry::new(),
            backend,
            clock: FrameClock::new(),
            stats: RenderStats::default(),
            background: DEFAULT_BACKGROUND,
            start_structure: None,
            quad_config: QuadTreeConfig::default(),
        })
    }

    // ── Scene binding ────────────────────────────────────────────────

    /// Attach a decoded library. The scene graph is rebuilt on the next
    /// [`update_scene_graph`](Self::update_scene_graph).
    pub fn set_library(&mut self, library: Library) {
        self.library = Some(library);
    }

    pub fn library(&self) -> Option<&Library> {
        self.library.as_ref()
    }

    /// Resolve from this structure instead of the library's top.
    pub fn set_start_structure(&mut self, name: Option<String>) {
        self.start_structure = name;
    }

    /// Rebuild the scene graph from the attached library.
    pub fn update_scene_graph(&mut self) -> Result<(), SceneError> {
        let Some(library) = self.library.as_ref() else {
            self.scene = SceneGraph::empty();
            self.backend.bind_scene(&self.scene);
            return Ok(());
        };
        let start = match self.start_structure.clone() {
            Some(name) => name,
            None => library
                .top_structure()
                .map(|s| s.name.clone())
                .ok_or(SceneError::EmptyLibrary)?,
        };
        self.scene = SceneGraph::build_from_library(library, &start, self.quad_config)?;
        self.backend.bind_scene(&self.scene);
        Ok(())
    }

    pub fn clear_scene(&mut self) {
        self.library = None;
        self.scene = SceneGraph::empty();
        self.backend.bind_scene(&self.scene);
    }

    // ── Per-frame ────────────────────────────────────────────────────

    /// Draw one frame synchronously.
    pub fn render(
        &mut self,
        viewport: &Viewport,
        target: &mut FrameTarget<'_>,
    ) -> Result<RenderStats, RenderError> {
        let started = Instant::now();
        let fps = self.clock.tick();

        let region = viewport.visible_bounds();
        let visible = self.scene.query_region(&region);

        let mut groups: BTreeMap<LayerKey, Vec<&SpatialElement>> = BTreeMap::new();
        for el in visible {
            if let Some(key) = el.element.layer_key() {
                groups.entry(key).or_default().push(el);
            }
        }

        // Ascending layer-key order for deterministic stacking.
        let mut layers = Vec::with_capacity(groups.len());
        let mut rendered = 0;
        for (key, elements) in groups {
            if !self.scene.is_layer_visible(&key) {
                continue;
            }
            rendered += elements.len();
            layers.push(LayerDraw {
                key,
                style: self.styles.get(&key),
                elements,
            });
        }

        let summary =
            self.backend
                .draw(target, &layers, viewport, &self.scene, self.background)?;

        self.stats = RenderStats {
            fps,
            frame_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            elements_rendered: rendered,
            elements_culled: self.scene.total_elements() - rendered,
            draw_calls: summary.draw_calls,
            batches_rebuilt: summary.batches_rebuilt,
        };
        Ok(self.stats)
    }

    // ── Interaction ──────────────────────────────────────────────────

    /// Elements under a world-space point.
    pub fn pick(&self, point: &Point) -> Vec<&SpatialElement> {
        self.scene.query_point(point)
    }

    /// Elements intersecting a world-space region.
    pub fn elements_in_region(&self, region: &BBox) -> Vec<&SpatialElement> {
        self.scene.query_region(region)
    }

    // ── Layers & styling ─────────────────────────────────────────────

    pub fn set_layer_visible(&mut self, layer: u16, datatype: u16, visible: bool) {
        self.scene.set_layer_visible(layer, datatype, visible);
    }

    pub fn layer_style(&self, layer: u16, datatype: u16) -> LayerStyle {
        self.styles.get(&LayerKey::new(layer, datatype))
    }

    pub fn set_layer_style(&mut self, layer: u16, datatype: u16, style: LayerStyle) {
        self.styles.set(LayerKey::new(layer, datatype), style);
    }

    pub fn set_background(&mut self, background: [f32; 4]) {
        self.background = background;
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn statistics(&self) -> RenderStats {
        self.stats
    }

    pub fn scene_graph(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_ready()
    }

    /// Release all backend resources. Re-initialization requires a new
    /// backend instance; the scene graph itself is backend-agnostic and
    /// survives a backend swap.
    pub fn dispose(&mut self) {
        self.backend.dispose();
    }

    /// Swap the active backend: the old one is disposed, the new one is
    /// initialized and re-bound to the current scene.
    pub fn replace_backend(
        &mut self,
        mut backend: Box<dyn RenderBackend>,
    ) -> Result<(), RenderError> {
        self.backend.dispose();
        backend.initialize()?;
        backend.bind_scene(&self.scene);
        self.backend = backend;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Pixmap, RasterBackend};
    use maskview_core::element::{Boundary, SingleRef};
    use maskview_core::{Element, Structure};

    fn demo_library() -> Library {
        let mut lib = Library::new("demo");
        lib.add_structure(Structure::with_elements(
            "cell",
            vec![Element::Boundary(Boundary::new(
                LayerKey::new(1, 0),
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(10.0, 0.0),
                    Point::new(10.0, 10.0),
                    Point::new(0.0, 10.0),
                ],
            ))],
        ));
        lib.add_structure(Structure::with_elements(
            "top",
            vec![
                Element::SingleRef(SingleRef::new("cell", Point::new(0.0, 0.0))),
                Element::SingleRef(SingleRef::new("cell", Point::new(20.0, 0.0))),
            ],
        ));
        lib
    }

    fn view_with_demo() -> LayoutView {
        let mut view = LayoutView::new(Box::new(RasterBackend::new())).unwrap();
        view.set_library(demo_library());
        view.update_scene_graph().unwrap();
        view
    }

    #[test]
    fn test_render_to_pixmap() {
        let mut view = view_with_demo();
        let mut viewport = Viewport::new(100.0, 100.0);
        viewport.fit_bbox(&view.scene_graph().bounds());

        let mut pixmap = Pixmap::new(100, 100);
        let stats = view
            .render(&viewport, &mut FrameTarget::Pixmap(&mut pixmap))
            .unwrap();
        assert_eq!(stats.elements_rendered, 2);
        assert_eq!(stats.elements_culled, 0);
        assert_eq!(stats.draw_calls, 2);

        // Something landed on the canvas besides the background.
        let bg = pixmap.pixel(0, 0);
        let filled = (0..100)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .any(|(x, y)| pixmap.pixel(x, y) != bg);
        assert!(filled);
    }

    #[test]
    fn test_culling_never_negative() {
        let mut view = view_with_demo();
        // Viewport far away from the geometry: everything culled.
        let mut viewport = Viewport::new(100.0, 100.0);
        viewport.center = Point::new(1e6, 1e6);

        let mut pixmap = Pixmap::new(100, 100);
        let stats = view
            .render(&viewport, &mut FrameTarget::Pixmap(&mut pixmap))
            .unwrap();
        assert_eq!(stats.elements_rendered, 0);
        assert_eq!(stats.elements_culled, view.scene_graph().total_elements());
    }

    #[test]
    fn test_hidden_layer_not_rendered() {
        let mut view = view_with_demo();
        view.set_layer_visible(1, 0, false);
        let mut viewport = Viewport::new(100.0, 100.0);
        viewport.fit_bbox(&view.scene_graph().bounds());

        let mut pixmap = Pixmap::new(100, 100);
        let stats = view
            .render(&viewport, &mut FrameTarget::Pixmap(&mut pixmap))
            .unwrap();
        assert_eq!(stats.elements_rendered, 0);
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn test_pick() {
        let view = view_with_demo();
        let hits = view.pick(&Point::new(5.0, 5.0));
        assert_eq!(hits.len(), 1);
        assert!(view.pick(&Point::new(15.0, 5.0)).is_empty());
        // Second placement.
        assert_eq!(view.pick(&Point::new(25.0, 5.0)).len(), 1);
    }

    #[test]
    fn test_clear_scene() {
        let mut view = view_with_demo();
        view.clear_scene();
        assert_eq!(view.scene_graph().total_elements(), 0);
        assert_eq!(view.scene_graph().bounds(), BBox::ZERO);
    }

    #[test]
    fn test_missing_start_structure_errors() {
        let mut view = LayoutView::new(Box::new(RasterBackend::new())).unwrap();
        view.set_library(demo_library());
        view.set_start_structure(Some("absent".to_string()));
        assert!(matches!(
            view.update_scene_graph(),
            Err(SceneError::StructureNotFound(_))
        ));
    }
}
