//! Region-subdividing spatial index for fast point queries and viewport
//! culling.
//!
//! An item whose box spans several child regions is inserted into **every**
//! overlapping child rather than split or clipped, so one item may sit at
//! multiple leaves and raw query results may contain duplicates. Callers
//! deduplicate by identity; the scene graph does this with the element
//! identity key.

use crate::geometry::{BBox, Point};

/// Anything the index can hold: an item with an axis-aligned bounding box.
pub trait SpatialItem {
    fn bbox(&self) -> BBox;
}

/// Tuning parameters: per-node entry capacity before subdivision and the
/// maximum tree depth.
#[derive(Debug, Clone, Copy)]
pub struct QuadTreeConfig {
    pub capacity: usize,
    pub max_depth: usize,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            max_depth: 8,
        }
    }
}

/// Diagnostics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadTreeStats {
    /// Distinct items inserted.
    pub items: usize,
    /// Stored entries including multi-insertion duplicates.
    pub stored_entries: usize,
    pub nodes: usize,
    pub leaf_nodes: usize,
    pub deepest_level: usize,
}

struct QuadNode<T> {
    region: BBox,
    depth: usize,
    entries: Vec<T>,
    children: Option<Box<[QuadNode<T>; 4]>>,
}

impl<T: SpatialItem + Clone> QuadNode<T> {
    fn new(region: BBox, depth: usize) -> Self {
        Self {
            region,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, item: T, config: &QuadTreeConfig) {
        if let Some(children) = self.children.as_mut() {
            let bb = item.bbox();
            let mut placed = false;
            for child in children.iter_mut() {
                if child.region.intersects(&bb) {
                    child.insert(item.clone(), config);
                    placed = true;
                }
            }
            // Numeric edge: a box that grazes no child stays on this node.
            if !placed {
                self.entries.push(item);
            }
            return;
        }

        self.entries.push(item);
        if self.entries.len() > config.capacity && self.depth < config.max_depth {
            self.subdivide(config);
        }
    }

    fn subdivide(&mut self, config: &QuadTreeConfig) {
        let c = self.region.center();
        let (min, max) = (self.region.min, self.region.max);
        let depth = self.depth + 1;
        let mut children = Box::new([
            QuadNode::new(BBox::new(min, c), depth),
            QuadNode::new(
                BBox::new(Point::new(c.x, min.y), Point::new(max.x, c.y)),
                depth,
            ),
            QuadNode::new(
                BBox::new(Point::new(min.x, c.y), Point::new(c.x, max.y)),
                depth,
            ),
            QuadNode::new(BBox::new(c, max), depth),
        ]);

        // Redistribute with the same overlap rule; entries overlapping no
        // child remain here.
        let mut kept = Vec::new();
        for item in self.entries.drain(..) {
            let bb = item.bbox();
            let mut placed = false;
            for child in children.iter_mut() {
                if child.region.intersects(&bb) {
                    child.insert(item.clone(), config);
                    placed = true;
                }
            }
            if !placed {
                kept.push(item);
            }
        }
        self.entries = kept;
        self.children = Some(children);
    }

    // Entries are always scanned (the root may hold items outside its
    // region); only child descent is pruned by region overlap.
    fn query<'a>(&'a self, region: &BBox, out: &mut Vec<&'a T>) {
        for item in &self.entries {
            if item.bbox().intersects(region) {
                out.push(item);
            }
        }
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                if child.region.intersects(region) {
                    child.query(region, out);
                }
            }
        }
    }

    fn query_point<'a>(&'a self, point: &Point, out: &mut Vec<&'a T>) {
        for item in &self.entries {
            if item.bbox().contains_point(point) {
                out.push(item);
            }
        }
        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                if child.region.contains_point(point) {
                    child.query_point(point, out);
                }
            }
        }
    }

    fn collect_stats(&self, stats: &mut QuadTreeStats) {
        stats.nodes += 1;
        stats.stored_entries += self.entries.len();
        stats.deepest_level = stats.deepest_level.max(self.depth);
        match self.children.as_ref() {
            Some(children) => {
                for child in children.iter() {
                    child.collect_stats(stats);
                }
            }
            None => stats.leaf_nodes += 1,
        }
    }
}

/// The spatial index: a quadtree over [`SpatialItem`]s.
pub struct QuadTree<T: SpatialItem + Clone> {
    root: QuadNode<T>,
    config: QuadTreeConfig,
    items: usize,
}

impl<T: SpatialItem + Clone> QuadTree<T> {
    /// `region` is the world extent the tree subdivides; items outside it
    /// are still stored (on the root node) but never accelerate queries.
    pub fn new(region: BBox, config: QuadTreeConfig) -> Self {
        Self {
            root: QuadNode::new(region, 0),
            config,
            items: 0,
        }
    }

    pub fn insert(&mut self, item: T) {
        self.items += 1;
        if self.root.region.intersects(&item.bbox()) {
            self.root.insert(item, &self.config);
        } else {
            self.root.entries.push(item);
        }
    }

    /// All items whose box intersects `region`.
    ///
    /// The raw result may contain duplicates of multi-inserted items;
    /// callers must deduplicate by identity.
    pub fn query(&self, region: &BBox) -> Vec<&T> {
        let mut out = Vec::new();
        self.root.query(region, &mut out);
        out
    }

    /// Point-containment variant of [`query`](Self::query); the same
    /// duplicate caveat applies.
    pub fn query_point(&self, point: &Point) -> Vec<&T> {
        let mut out = Vec::new();
        self.root.query_point(point, &mut out);
        out
    }

    pub fn statistics(&self) -> QuadTreeStats {
        let mut stats = QuadTreeStats {
            items: self.items,
            ..Default::default()
        };
        self.root.collect_stats(&mut stats);
        stats
    }

    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn clear(&mut self) {
        self.root = QuadNode::new(self.root.region, 0);
        self.items = 0;
    }
}
