//! Scene graph: resolved world-space geometry grouped by layer and indexed
//! for viewport queries.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::element::{Element, LayerKey};
use crate::error::SceneError;
use crate::geometry::{BBox, Point};
use crate::library::Library;
use crate::resolver::Resolver;
use crate::spatial::{QuadTree, QuadTreeConfig, QuadTreeStats, SpatialItem};
use crate::transform::Transform;

/// One resolved element plus its world bounding box and identity key.
///
/// The identity key `(structure, index)` is unique per scene build; the
/// index is the element's position in the flattened sequence. It exists
/// because the spatial index multi-inserts spanning elements, so query
/// results must be deduplicated by identity rather than by equality.
#[derive(Debug, Clone)]
pub struct SpatialElement {
    pub element: Element,
    pub bounds: BBox,
    /// Name of the structure this scene was resolved from.
    pub structure: Arc<str>,
    /// Position in the flattened element sequence.
    pub index: u32,
}

impl SpatialElement {
    pub fn identity(&self) -> (&str, u32) {
        (&self.structure, self.index)
    }
}

/// Lightweight index entry; the scene owns the elements, the tree holds
/// copies of these handles only.
#[derive(Debug, Clone, Copy)]
struct SpatialHandle {
    id: u32,
    bounds: BBox,
}

impl SpatialItem for SpatialHandle {
    fn bbox(&self) -> BBox {
        self.bounds
    }
}

/// Per-layer membership and visibility.
#[derive(Debug, Clone, Default)]
pub struct LayerGroup {
    pub visible: bool,
    members: Vec<u32>,
}

impl LayerGroup {
    pub fn member_ids(&self) -> &[u32] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The scene graph: one spatial index over all resolved elements plus a
/// layer-key → visibility/membership mapping.
pub struct SceneGraph {
    elements: Vec<SpatialElement>,
    index: QuadTree<SpatialHandle>,
    layers: BTreeMap<LayerKey, LayerGroup>,
    bounds: BBox,
    cycles: Vec<Vec<String>>,
    missing: Vec<String>,
    root: Arc<str>,
    source: Uuid,
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("elements", &self.elements.len())
            .field("layers", &self.layers.len())
            .field("bounds", &self.bounds)
            .field("cycles", &self.cycles)
            .field("missing", &self.missing)
            .field("root", &self.root)
            .field("source", &self.source)
            .finish()
    }
}

impl SceneGraph {
    /// Resolve `start` and build the index and layer groups.
    pub fn build_from_library(
        library: &Library,
        start: &str,
        config: QuadTreeConfig,
    ) -> Result<Self, SceneError> {
        if library.structure(start).is_none() {
            return Err(SceneError::StructureNotFound(start.to_string()));
        }

        let report = Resolver::new(library).resolve(start, &Transform::IDENTITY);
        let root: Arc<str> = Arc::from(start);

        let mut elements = Vec::with_capacity(report.elements.len());
        for element in report.elements {
            let Some(bounds) = element.bounds() else {
                log::debug!(
                    "dropping {} element with no coordinates from scene",
                    element.kind_name()
                );
                continue;
            };
            elements.push(SpatialElement {
                element,
                bounds,
                structure: root.clone(),
                index: elements.len() as u32,
            });
        }

        let bounds = BBox::union_all(elements.iter().map(|e| e.bounds)).unwrap_or(BBox::ZERO);

        let mut index = QuadTree::new(bounds, config);
        let mut layers: BTreeMap<LayerKey, LayerGroup> = BTreeMap::new();
        for el in &elements {
            index.insert(SpatialHandle {
                id: el.index,
                bounds: el.bounds,
            });
            if let Some(key) = el.element.layer_key() {
                let group = layers.entry(key).or_insert_with(|| LayerGroup {
                    visible: true,
                    members: Vec::new(),
                });
                group.members.push(el.index);
            }
        }

        Ok(Self {
            elements,
            index,
            layers,
            bounds,
            cycles: report.cycles,
            missing: report.missing,
            root,
            source: library.id,
        })
    }

    /// An empty scene; the result of clearing.
    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
            index: QuadTree::new(BBox::ZERO, QuadTreeConfig::default()),
            layers: BTreeMap::new(),
            bounds: BBox::ZERO,
            cycles: Vec::new(),
            missing: Vec::new(),
            root: Arc::from(""),
            source: Uuid::nil(),
        }
    }

    /// All elements intersecting `region`, deduplicated by identity key
    /// (first occurrence wins).
    pub fn query_region(&self, region: &BBox) -> Vec<&SpatialElement> {
        self.dedup(self.index.query(region))
    }

    /// All elements containing `point`, deduplicated by identity key.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialElement> {
        self.dedup(self.index.query_point(point))
    }

    fn dedup(&self, raw: Vec<&SpatialHandle>) -> Vec<&SpatialElement> {
        let mut seen: HashSet<(&str, u32)> = HashSet::with_capacity(raw.len());
        let mut out = Vec::with_capacity(raw.len());
        for handle in raw {
            let el = &self.elements[handle.id as usize];
            if seen.insert(el.identity()) {
                out.push(el);
            }
        }
        out
    }

    /// Toggle a layer without re-running the resolver.
    pub fn set_layer_visible(&mut self, layer: u16, datatype: u16, visible: bool) {
        if let Some(group) = self.layers.get_mut(&LayerKey::new(layer, datatype)) {
            group.visible = visible;
        }
    }

    pub fn is_layer_visible(&self, key: &LayerKey) -> bool {
        self.layers.get(key).map(|g| g.visible).unwrap_or(true)
    }

    /// Layer keys in ascending order, the deterministic stacking order.
    pub fn layer_keys(&self) -> impl Iterator<Item = &LayerKey> {
        self.layers.keys()
    }

    pub fn layer_group(&self, key: &LayerKey) -> Option<&LayerGroup> {
        self.layers.get(key)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerKey, &LayerGroup)> {
        self.layers.iter()
    }

    pub fn element_by_id(&self, id: u32) -> Option<&SpatialElement> {
        self.elements.get(id as usize)
    }

    /// Aggregate bounds over all member elements; [`BBox::ZERO`] when the
    /// scene has no valid geometry.
    pub fn bounds(&self) -> BBox {
        self.bounds
    }

    pub fn total_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn root_structure(&self) -> &str {
        &self.root
    }

    /// Id of the library this scene was built from; lets geometry caches
    /// distinguish "same library re-resolved" from "different library".
    pub fn source_id(&self) -> Uuid {
        self.source
    }

    /// Cycles reported by the resolve pass, e.g. `["A", "B", "A"]`.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Referenced structure names absent from the library.
    pub fn missing_references(&self) -> &[String] {
        &self.missing
    }

    pub fn index_statistics(&self) -> QuadTreeStats {
        self.index.statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Boundary, LayerKey, SingleRef};
    use crate::library::Structure;

    fn square(layer: LayerKey, x: f64, y: f64, size: f64) -> Element {
        Element::Boundary(Boundary::new(
            layer,
            vec![
                Point::new(x, y),
                Point::new(x + size, y),
                Point::new(x + size, y + size),
                Point::new(x, y + size),
            ],
        ))
    }

    fn small_library() -> Library {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements(
            "top",
            vec![square(LayerKey::new(1, 0), 0.0, 0.0, 10.0)],
        ));
        lib
    }

    #[test]
    fn test_library_bounds() {
        let scene =
            SceneGraph::build_from_library(&small_library(), "top", QuadTreeConfig::default())
                .unwrap();
        let bb = scene.bounds();
        assert_eq!(bb.min, Point::new(0.0, 0.0));
        assert_eq!(bb.max, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_unknown_start_structure() {
        let err =
            SceneGraph::build_from_library(&small_library(), "nope", QuadTreeConfig::default())
                .unwrap_err();
        assert!(matches!(err, SceneError::StructureNotFound(_)));
    }

    #[test]
    fn test_query_deduplicates_spanning_elements() {
        let mut lib = Library::new("lib");
        let mut elements = vec![square(LayerKey::new(1, 0), 0.0, 0.0, 100.0)];
        for i in 0..40 {
            let x = (i % 8) as f64 * 12.0;
            let y = (i / 8) as f64 * 12.0;
            elements.push(square(LayerKey::new(2, 0), x, y, 4.0));
        }
        lib.add_structure(Structure::with_elements("top", elements));

        let config = QuadTreeConfig {
            capacity: 4,
            max_depth: 5,
        };
        let scene = SceneGraph::build_from_library(&lib, "top", config).unwrap();

        // The raw index stores the spanning square in several leaves.
        assert!(scene.index_statistics().stored_entries > scene.total_elements());

        let hits = scene.query_region(&scene.bounds());
        // Deduplicated: every element exactly once.
        assert_eq!(hits.len(), scene.total_elements());
        let mut identities: Vec<(&str, u32)> = hits.iter().map(|e| e.identity()).collect();
        identities.sort();
        identities.dedup();
        assert_eq!(identities.len(), hits.len());

        // Every returned element intersects the query region.
        let region = BBox::new(Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        for el in scene.query_region(&region) {
            assert!(el.bounds.intersects(&region));
        }
    }

    #[test]
    fn test_layer_visibility_toggle() {
        let scene_lib = small_library();
        let mut scene =
            SceneGraph::build_from_library(&scene_lib, "top", QuadTreeConfig::default()).unwrap();
        let key = LayerKey::new(1, 0);
        assert!(scene.is_layer_visible(&key));
        scene.set_layer_visible(1, 0, false);
        assert!(!scene.is_layer_visible(&key));
        // Membership is untouched by visibility.
        assert_eq!(scene.layer_group(&key).unwrap().len(), 1);
    }

    #[test]
    fn test_hierarchical_build_groups_layers() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements(
            "leaf",
            vec![
                square(LayerKey::new(1, 0), 0.0, 0.0, 2.0),
                square(LayerKey::new(2, 0), 3.0, 0.0, 2.0),
            ],
        ));
        lib.add_structure(Structure::with_elements(
            "top",
            vec![
                Element::SingleRef(SingleRef::new("leaf", Point::new(0.0, 0.0))),
                Element::SingleRef(SingleRef::new("leaf", Point::new(10.0, 0.0))),
            ],
        ));
        let scene =
            SceneGraph::build_from_library(&lib, "top", QuadTreeConfig::default()).unwrap();
        assert_eq!(scene.total_elements(), 4);
        assert_eq!(scene.layer_group(&LayerKey::new(1, 0)).unwrap().len(), 2);
        assert_eq!(scene.layer_group(&LayerKey::new(2, 0)).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_scene_bounds_are_zero() {
        let scene = SceneGraph::empty();
        assert_eq!(scene.bounds(), BBox::ZERO);
        assert_eq!(scene.total_elements(), 0);
    }
}
