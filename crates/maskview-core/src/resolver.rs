//! Hierarchy resolver: expands nested structure placements into a flat
//! sequence of world-space elements.
//!
//! Traversal uses an explicit frame stack rather than native recursion, so
//! pathological hierarchies are bounded by memory and a cyclic reference is
//! a reported data condition, not a stack overflow.
//!
//! Caching is transform-invariant: each structure's *locally* resolved
//! elements are cached once under the identity transform, and the caller's
//! accumulated transform is applied per use. Post-transform results are
//! never cached under the bare structure name, which would return wrong
//! geometry for a structure reached through two differently-placed
//! references.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::element::{Element, GridRef};
use crate::geometry::{BBox, Point};
use crate::library::Library;
use crate::transform::Transform;

/// Result of a resolve pass.
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Flat world-space non-reference elements.
    pub elements: Vec<Element>,
    /// Each detected cycle as the reference path that closed it,
    /// e.g. `["A", "B", "A"]`.
    pub cycles: Vec<Vec<String>>,
    /// Names of referenced structures absent from the library.
    pub missing: Vec<String>,
}

/// Resolves structures against one library, caching local results across
/// calls so repeated references do not repeat work.
pub struct Resolver<'a> {
    library: &'a Library,
    cache: HashMap<String, Rc<Vec<Element>>>,
    cycles: Vec<Vec<String>>,
    missing: Vec<String>,
}

struct PendingRef {
    child: String,
    instances: Vec<Transform>,
    next_instance: usize,
}

struct Frame {
    name: String,
    struct_index: usize,
    next_element: usize,
    pending: Option<PendingRef>,
    acc: Vec<Element>,
}

impl Frame {
    fn new(name: String, struct_index: usize) -> Self {
        Self {
            name,
            struct_index,
            next_element: 0,
            pending: None,
            acc: Vec::new(),
        }
    }
}

enum Step {
    Descend(String, usize),
    Cycle(String),
    Finished,
}

impl<'a> Resolver<'a> {
    pub fn new(library: &'a Library) -> Self {
        Self {
            library,
            cache: HashMap::new(),
            cycles: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Resolve `start` under an accumulated transform (identity at the root)
    /// into flat world-space elements.
    pub fn resolve(&mut self, start: &str, transform: &Transform) -> ResolveReport {
        let elements = match self.local_elements(start) {
            Some(local) if transform.is_identity() => local.as_ref().clone(),
            Some(local) => local
                .iter()
                .map(|e| transform_element(e, transform))
                .collect(),
            None => Vec::new(),
        };
        ResolveReport {
            elements,
            cycles: std::mem::take(&mut self.cycles),
            missing: std::mem::take(&mut self.missing),
        }
    }

    /// Locally resolved (identity-transform) elements of one structure,
    /// computed with an explicit worklist and cached by name.
    fn local_elements(&mut self, root: &str) -> Option<Rc<Vec<Element>>> {
        if let Some(cached) = self.cache.get(root) {
            return Some(cached.clone());
        }
        let library = self.library;
        let root_index = match library.structure_index(root) {
            Some(i) => i,
            None => {
                self.note_missing(root);
                return None;
            }
        };

        let mut stack = vec![Frame::new(root.to_string(), root_index)];
        let mut in_path: HashSet<String> = HashSet::new();
        in_path.insert(root.to_string());

        while !stack.is_empty() {
            let step = {
                let frame = stack.last_mut().expect("stack is non-empty");
                let structure = library
                    .structure_at(frame.struct_index)
                    .expect("frame indexes a library structure");
                let mut step = Step::Finished;
                'frame: loop {
                    if let Some(p) = frame.pending.as_mut() {
                        while p.next_instance < p.instances.len() {
                            if let Some(cached) = self.cache.get(p.child.as_str()) {
                                let t = &p.instances[p.next_instance];
                                frame
                                    .acc
                                    .extend(cached.iter().map(|e| transform_element(e, t)));
                                p.next_instance += 1;
                            } else if in_path.contains(p.child.as_str()) {
                                step = Step::Cycle(p.child.clone());
                                p.next_instance = p.instances.len();
                                break 'frame;
                            } else if let Some(idx) =
                                library.structure_index(p.child.as_str())
                            {
                                step = Step::Descend(p.child.clone(), idx);
                                break 'frame;
                            } else {
                                self.note_missing(&p.child);
                                p.next_instance = p.instances.len();
                            }
                        }
                        frame.pending = None;
                    }

                    let Some(element) = structure.elements.get(frame.next_element) else {
                        break 'frame;
                    };
                    frame.next_element += 1;
                    match element {
                        Element::SingleRef(r) => {
                            frame.pending = Some(PendingRef {
                                child: r.structure.clone(),
                                instances: r
                                    .positions
                                    .iter()
                                    .map(|pos| Transform::from_placement(&r.strans, *pos))
                                    .collect(),
                                next_instance: 0,
                            });
                        }
                        Element::GridRef(r) => {
                            frame.pending = Some(PendingRef {
                                child: r.structure.clone(),
                                instances: grid_instances(r),
                                next_instance: 0,
                            });
                        }
                        e => {
                            frame.acc.push(transform_element(e, &Transform::IDENTITY));
                        }
                    }
                }
                step
            };

            match step {
                Step::Descend(name, idx) => {
                    in_path.insert(name.clone());
                    stack.push(Frame::new(name, idx));
                }
                Step::Cycle(child) => {
                    let start = stack
                        .iter()
                        .position(|f| f.name == child)
                        .unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|f| f.name.clone()).collect();
                    cycle.push(child.clone());
                    log::warn!("cyclic structure reference: {}", cycle.join(" -> "));
                    self.cycles.push(cycle);
                }
                Step::Finished => {
                    let frame = stack.pop().expect("stack is non-empty");
                    in_path.remove(&frame.name);
                    self.cache.insert(frame.name, Rc::new(frame.acc));
                }
            }
        }

        self.cache.get(root).cloned()
    }

    fn note_missing(&mut self, name: &str) {
        if !self.missing.iter().any(|m| m == name) {
            log::warn!("reference to unknown structure '{}', skipping", name);
            self.missing.push(name.to_string());
        }
    }
}

/// One-shot resolve without keeping the resolver around.
pub fn resolve_structure(
    library: &Library,
    start: &str,
    transform: &Transform,
) -> ResolveReport {
    Resolver::new(library).resolve(start, transform)
}

/// Instance transforms for a grid reference: spacing vectors are the corner
/// offsets divided by the column/row counts, instances laid out row-major.
fn grid_instances(r: &GridRef) -> Vec<Transform> {
    let (cols, rows) = (r.columns as usize, r.rows as usize);
    if cols == 0 || rows == 0 {
        return Vec::new();
    }
    let col_spacing = (
        (r.col_corner.x - r.origin.x) / cols as f64,
        (r.col_corner.y - r.origin.y) / cols as f64,
    );
    let row_spacing = (
        (r.row_corner.x - r.origin.x) / rows as f64,
        (r.row_corner.y - r.origin.y) / rows as f64,
    );
    let mut instances = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let pos = Point::new(
                r.origin.x + col as f64 * col_spacing.0 + row as f64 * row_spacing.0,
                r.origin.y + col as f64 * col_spacing.1 + row as f64 * row_spacing.1,
            );
            instances.push(Transform::from_placement(&r.strans, pos));
        }
    }
    instances
}

/// Apply a transform to a non-reference element, producing a new copy with
/// recomputed bounds. Elements with no coordinates keep `bounds` unset so
/// downstream aggregation skips them.
pub fn transform_element(element: &Element, t: &Transform) -> Element {
    match element {
        Element::Boundary(b) => {
            let points = t.apply_all(&b.points);
            let bounds = BBox::from_points(&points);
            Element::Boundary(crate::element::Boundary {
                layer: b.layer,
                points,
                bounds,
            })
        }
        Element::Path(p) => {
            let points = t.apply_all(&p.points);
            let scale = t.scale_factor();
            let width = p.width * scale;
            let bounds = crate::element::Path::compute_bounds(&points, width);
            Element::Path(crate::element::Path {
                layer: p.layer,
                points,
                width,
                end_style: p.end_style,
                begin_ext: p.begin_ext * scale,
                end_ext: p.end_ext * scale,
                bounds,
            })
        }
        Element::Box(b) => {
            let points = t.apply_all(&b.points);
            let bounds = BBox::from_points(&points);
            Element::Box(crate::element::BoxElement {
                layer: b.layer,
                points,
                bounds,
            })
        }
        Element::Node(n) => {
            let points = t.apply_all(&n.points);
            let bounds = BBox::from_points(&points);
            Element::Node(crate::element::Node {
                layer: n.layer,
                points,
                bounds,
            })
        }
        Element::Text(txt) => {
            let anchor = t.apply(&txt.anchor);
            let mut strans = txt.strans;
            strans.mag *= t.scale_factor();
            Element::Text(crate::element::Text {
                layer: txt.layer,
                text: txt.text.clone(),
                anchor,
                presentation: txt.presentation,
                strans,
                bounds: Some(BBox::new(anchor, anchor)),
            })
        }
        // References never appear in locally resolved sets.
        Element::SingleRef(_) | Element::GridRef(_) => element.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Boundary, LayerKey, Node, SingleRef};
    use crate::library::Structure;
    use crate::transform::Strans;

    fn node_at(x: f64, y: f64) -> Element {
        Element::Node(Node::new(LayerKey::new(1, 0), vec![Point::new(x, y)]))
    }

    fn node_point(e: &Element) -> Point {
        match e {
            Element::Node(n) => n.points[0],
            other => panic!("expected node, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_identity_resolution_reproduces_child() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements(
            "leaf",
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
            vec![Element::SingleRef(SingleRef::new(
                "leaf",
                Point::new(0.0, 0.0),
            ))],
        ));

        let report = resolve_structure(&lib, "top", &Transform::IDENTITY);
        assert!(report.cycles.is_empty());
        assert!(report.missing.is_empty());
        assert_eq!(report.elements.len(), 1);
        let leaf = lib.structure("leaf").unwrap();
        assert_eq!(report.elements[0], leaf.elements[0]);
    }

    #[test]
    fn test_rotation_translation_composition() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements("pt", vec![node_at(1.0, 1.0)]));
        lib.add_structure(Structure::with_elements(
            "top",
            vec![Element::SingleRef(
                SingleRef::new("pt", Point::new(100.0, 100.0))
                    .with_strans(Strans::new(false, 90.0, 2.0)),
            )],
        ));

        let report = resolve_structure(&lib, "top", &Transform::IDENTITY);
        assert_eq!(report.elements.len(), 1);
        let p = node_point(&report.elements[0]);
        assert!((p.x - 98.0).abs() < 1e-9);
        assert!((p.y - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_expansion() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements("pt", vec![node_at(0.0, 0.0)]));
        lib.add_structure(Structure::with_elements(
            "top",
            vec![Element::GridRef(GridRef {
                structure: "pt".to_string(),
                origin: Point::new(0.0, 0.0),
                col_corner: Point::new(30.0, 0.0),
                row_corner: Point::new(0.0, 0.0),
                columns: 3,
                rows: 1,
                strans: Strans::default(),
            })],
        ));

        let report = resolve_structure(&lib, "top", &Transform::IDENTITY);
        assert_eq!(report.elements.len(), 3);
        let xs: Vec<f64> = report.elements.iter().map(|e| node_point(e).x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_cycle_terminates_and_reports() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements(
            "A",
            vec![
                node_at(1.0, 1.0),
                Element::SingleRef(SingleRef::new("B", Point::new(0.0, 0.0))),
            ],
        ));
        lib.add_structure(Structure::with_elements(
            "B",
            vec![Element::SingleRef(SingleRef::new("A", Point::new(0.0, 0.0)))],
        ));

        let report = resolve_structure(&lib, "A", &Transform::IDENTITY);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0], vec!["A", "B", "A"]);
        // The non-reference element still resolves.
        assert_eq!(report.elements.len(), 1);
    }

    #[test]
    fn test_missing_reference_skipped() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements(
            "top",
            vec![
                node_at(5.0, 5.0),
                Element::SingleRef(SingleRef::new("ghost", Point::new(0.0, 0.0))),
            ],
        ));

        let report = resolve_structure(&lib, "top", &Transform::IDENTITY);
        assert_eq!(report.elements.len(), 1);
        assert_eq!(report.missing, vec!["ghost"]);
    }

    #[test]
    fn test_multiple_placements_use_distinct_transforms() {
        // A structure referenced twice under different transforms must not
        // reuse post-transform geometry from the first placement.
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements("pt", vec![node_at(1.0, 0.0)]));
        lib.add_structure(Structure::with_elements(
            "top",
            vec![
                Element::SingleRef(SingleRef::new("pt", Point::new(0.0, 0.0))),
                Element::SingleRef(
                    SingleRef::new("pt", Point::new(10.0, 0.0))
                        .with_strans(Strans::new(false, 90.0, 1.0)),
                ),
            ],
        ));

        let report = resolve_structure(&lib, "top", &Transform::IDENTITY);
        assert_eq!(report.elements.len(), 2);
        let p0 = node_point(&report.elements[0]);
        let p1 = node_point(&report.elements[1]);
        assert!((p0.x - 1.0).abs() < 1e-9 && p0.y.abs() < 1e-9);
        assert!((p1.x - 10.0).abs() < 1e-9 && (p1.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sref_multiple_positions() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements("pt", vec![node_at(0.0, 0.0)]));
        lib.add_structure(Structure::with_elements(
            "top",
            vec![Element::SingleRef(SingleRef {
                structure: "pt".to_string(),
                positions: vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)],
                strans: Strans::default(),
            })],
        ));

        let report = resolve_structure(&lib, "top", &Transform::IDENTITY);
        assert_eq!(report.elements.len(), 2);
    }

    #[test]
    fn test_accumulated_transform_applies_to_output() {
        let mut lib = Library::new("lib");
        lib.add_structure(Structure::with_elements("pt", vec![node_at(1.0, 2.0)]));
        let report = resolve_structure(&lib, "pt", &Transform::translate(10.0, 20.0));
        let p = node_point(&report.elements[0]);
        assert!((p.x - 11.0).abs() < 1e-9);
        assert!((p.y - 22.0).abs() < 1e-9);
    }
}
