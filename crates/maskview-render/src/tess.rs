//! Polygon triangulation and mesh batching for the GPU backend.
//!
//! Ear clipping over the polygon's vertex list; concave outlines are
//! handled, curved primitives are not part of the model. Degenerate input
//! never reaches a draw call: the single-polygon form returns a typed
//! error, the batch form logs and skips.

use maskview_core::Point;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriangulateError {
    #[error("polygon needs at least 3 usable vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon contains non-finite coordinates")]
    NonFinite,
}

/// Triangulate a polygon into an index list over its vertices.
///
/// A duplicated closing vertex is stripped before triangulation, so the
/// returned indices never reference it.
pub fn triangulate(points: &[Point]) -> Result<Vec<u32>, TriangulateError> {
    let n = usable_vertex_count(points);
    if n < 3 {
        return Err(TriangulateError::TooFewVertices(n));
    }
    let points = &points[..n];
    if points.iter().any(|p| !p.is_finite()) {
        return Err(TriangulateError::NonFinite);
    }

    // Work on a CCW traversal; emitted indices still reference the original
    // vertex order.
    let mut remaining: Vec<u32> = if signed_area(points) < 0.0 {
        (0..n as u32).rev().collect()
    } else {
        (0..n as u32).collect()
    };

    let mut indices = Vec::with_capacity((n - 2) * 3);
    while remaining.len() > 3 {
        let len = remaining.len();
        let mut clipped = false;
        for i in 0..len {
            let prev = remaining[(i + len - 1) % len];
            let curr = remaining[i];
            let next = remaining[(i + 1) % len];
            if !is_ear(points, &remaining, prev, curr, next) {
                continue;
            }
            indices.extend_from_slice(&[prev, curr, next]);
            remaining.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // Self-intersecting or numerically degenerate outline: clip an
            // arbitrary vertex so the loop terminates with a usable fill.
            log::debug!("no ear found, force-clipping vertex of degenerate polygon");
            indices.extend_from_slice(&[remaining[0], remaining[1], remaining[2]]);
            remaining.remove(1);
        }
    }
    indices.extend_from_slice(&remaining);
    Ok(indices)
}

/// Vertex count with a duplicated closing vertex stripped.
fn usable_vertex_count(points: &[Point]) -> usize {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 && first == last => points.len() - 1,
        _ => points.len(),
    }
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn is_ear(points: &[Point], remaining: &[u32], prev: u32, curr: u32, next: u32) -> bool {
    let (a, b, c) = (
        &points[prev as usize],
        &points[curr as usize],
        &points[next as usize],
    );
    // Reflex corner: not an ear. Collinear corners clip as zero-area ears.
    if cross(a, b, c) < 0.0 {
        return false;
    }
    for &other in remaining {
        if other == prev || other == curr || other == next {
            continue;
        }
        if point_strictly_in_triangle(&points[other as usize], a, b, c) {
            return false;
        }
    }
    true
}

fn point_strictly_in_triangle(p: &Point, a: &Point, b: &Point, c: &Point) -> bool {
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    (d1 > 0.0 && d2 > 0.0 && d3 > 0.0) || (d1 < 0.0 && d2 < 0.0 && d3 < 0.0)
}

/// Concatenated vertex/index buffers for many polygons, with per-polygon
/// index offsets applied. This is what a layer batch uploads.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffer {
    pub vertices: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangulate and append one polygon. Returns `false` (after a debug
    /// log) when the polygon is degenerate and contributed nothing.
    pub fn push_polygon(&mut self, points: &[Point]) -> bool {
        match triangulate(points) {
            Ok(local) => {
                let n = usable_vertex_count(points);
                let base = self.vertices.len() as u32;
                self.vertices
                    .extend(points[..n].iter().map(|p| [p.x as f32, p.y as f32]));
                self.indices.extend(local.iter().map(|i| i + base));
                true
            }
            Err(err) => {
                log::debug!("skipping polygon: {}", err);
                false
            }
        }
    }

    /// Append a stroked polyline as one quad per segment. Zero-width and
    /// zero-length segments contribute nothing.
    pub fn push_stroked_path(&mut self, points: &[Point], width: f64) -> bool {
        if width <= 0.0 || points.len() < 2 {
            return false;
        }
        let half = width / 2.0;
        let mut pushed = false;
        for seg in points.windows(2) {
            let (p0, p1) = (&seg[0], &seg[1]);
            let (dx, dy) = (p1.x - p0.x, p1.y - p0.y);
            let len = (dx * dx + dy * dy).sqrt();
            if len <= 0.0 || !len.is_finite() {
                continue;
            }
            let (nx, ny) = (-dy / len * half, dx / len * half);
            let base = self.vertices.len() as u32;
            self.vertices.extend_from_slice(&[
                [(p0.x + nx) as f32, (p0.y + ny) as f32],
                [(p0.x - nx) as f32, (p0.y - ny) as f32],
                [(p1.x + nx) as f32, (p1.y + ny) as f32],
                [(p1.x - nx) as f32, (p1.y - ny) as f32],
            ]);
            self.indices.extend_from_slice(&[
                base,
                base + 1,
                base + 2,
                base + 2,
                base + 1,
                base + 3,
            ]);
            pushed = true;
        }
        pushed
    }

    /// Append an axis-aligned marker quad centered on a point.
    pub fn push_marker(&mut self, center: &Point, half: f64) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[
            [(center.x - half) as f32, (center.y - half) as f32],
            [(center.x + half) as f32, (center.y - half) as f32],
            [(center.x + half) as f32, (center.y + half) as f32],
            [(center.x - half) as f32, (center.y + half) as f32],
        ]);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_triangle() {
        let indices = triangulate(&[p(0.0, 0.0), p(10.0, 0.0), p(5.0, 8.0)]).unwrap();
        assert_eq!(indices.len(), 3);
    }

    #[test]
    fn test_square_two_triangles() {
        let indices =
            triangulate(&[p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]).unwrap();
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_closing_vertex_stripped() {
        let indices = triangulate(&[
            p(0.0, 0.0),
            p(10.0, 0.0),
            p(10.0, 10.0),
            p(0.0, 10.0),
            p(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(indices.len(), 6);
        assert!(indices.iter().all(|&i| i < 4));
    }

    #[test]
    fn test_concave_l_shape() {
        // L-shaped hexagon: 6 vertices -> 4 triangles.
        let pts = [
            p(0.0, 0.0),
            p(20.0, 0.0),
            p(20.0, 10.0),
            p(10.0, 10.0),
            p(10.0, 20.0),
            p(0.0, 20.0),
        ];
        let indices = triangulate(&pts).unwrap();
        assert_eq!(indices.len(), 12);
    }

    #[test]
    fn test_clockwise_input() {
        let indices =
            triangulate(&[p(0.0, 10.0), p(10.0, 10.0), p(10.0, 0.0), p(0.0, 0.0)]).unwrap();
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_rejects_too_few_vertices() {
        assert_eq!(
            triangulate(&[p(0.0, 0.0), p(1.0, 1.0)]),
            Err(TriangulateError::TooFewVertices(2))
        );
        // Two points plus a duplicated closing vertex is still two.
        assert_eq!(
            triangulate(&[p(0.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)]),
            Err(TriangulateError::TooFewVertices(2))
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        assert_eq!(
            triangulate(&[p(0.0, 0.0), p(f64::NAN, 1.0), p(1.0, 0.0)]),
            Err(TriangulateError::NonFinite)
        );
    }

    #[test]
    fn test_mesh_buffer_offsets() {
        let mut mesh = MeshBuffer::new();
        assert!(mesh.push_polygon(&[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)]));
        assert!(mesh.push_polygon(&[p(5.0, 5.0), p(6.0, 5.0), p(5.0, 6.0)]));
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        // Second polygon's indices are offset past the first's vertices.
        assert!(mesh.indices[3..].iter().all(|&i| (3..6).contains(&i)));
    }

    #[test]
    fn test_mesh_buffer_skips_degenerate() {
        let mut mesh = MeshBuffer::new();
        assert!(!mesh.push_polygon(&[p(0.0, 0.0), p(1.0, 1.0)]));
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_stroked_path_quads() {
        let mut mesh = MeshBuffer::new();
        assert!(mesh.push_stroked_path(&[p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0)], 2.0));
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.triangle_count(), 4);
        assert!(!mesh.push_stroked_path(&[p(0.0, 0.0), p(10.0, 0.0)], 0.0));
    }

    #[test]
    fn test_marker_quad() {
        let mut mesh = MeshBuffer::new();
        mesh.push_marker(&p(5.0, 5.0), 0.5);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
    }
}
