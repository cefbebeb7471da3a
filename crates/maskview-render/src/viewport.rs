use serde::{Deserialize, Serialize};

use maskview_core::{BBox, Point};

/// The visible world-space window: center + zoom + device-pixel dimensions.
///
/// Screen space runs y-down, world space y-up; the conversions below invert
/// the y axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    /// Center of the view in world coordinates.
    pub center: Point,
    /// Canvas width in device pixels.
    pub width: f64,
    /// Canvas height in device pixels.
    pub height: f64,
    /// Zoom level (device pixels per world unit).
    pub zoom: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            center: Point::new(0.0, 0.0),
            width,
            height,
            zoom: 1.0,
        }
    }

    /// Pan the viewport by a delta in screen pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.center.x -= dx / self.zoom;
        self.center.y += dy / self.zoom;
    }

    /// Zoom in/out keeping the world point under the cursor fixed.
    pub fn zoom_at(&mut self, screen_x: f64, screen_y: f64, factor: f64) {
        let before = self.screen_to_world(screen_x, screen_y);

        self.zoom = (self.zoom * factor).clamp(1e-6, 1e9);

        let after = self.screen_to_world(screen_x, screen_y);
        self.center.x -= after.x - before.x;
        self.center.y -= after.y - before.y;
    }

    /// Zoom to fit a bounding box with a 10% margin.
    pub fn fit_bbox(&mut self, bbox: &BBox) {
        let (w, h) = (bbox.width(), bbox.height());
        if w <= 0.0 && h <= 0.0 {
            self.center = bbox.center();
            return;
        }
        self.center = bbox.center();
        let zoom_x = if w > 0.0 { self.width / w * 0.9 } else { f64::MAX };
        let zoom_y = if h > 0.0 { self.height / h * 0.9 } else { f64::MAX };
        self.zoom = zoom_x.min(zoom_y);
    }

    pub fn screen_to_world(&self, screen_x: f64, screen_y: f64) -> Point {
        Point::new(
            self.center.x + (screen_x - self.width / 2.0) / self.zoom,
            self.center.y + (self.height / 2.0 - screen_y) / self.zoom,
        )
    }

    pub fn world_to_screen(&self, world: &Point) -> (f64, f64) {
        (
            (world.x - self.center.x) * self.zoom + self.width / 2.0,
            self.height / 2.0 - (world.y - self.center.y) * self.zoom,
        )
    }

    /// The visible world-space window.
    pub fn visible_bounds(&self) -> BBox {
        let half_w = self.width / (2.0 * self.zoom);
        let half_h = self.height / (2.0 * self.zoom);
        BBox::new(
            Point::new(self.center.x - half_w, self.center.y - half_h),
            Point::new(self.center.x + half_w, self.center.y + half_h),
        )
    }

    /// Semantic zoom level for level-of-detail rendering.
    pub fn detail_level(&self) -> DetailLevel {
        if self.zoom > 100.0 {
            DetailLevel::Full
        } else if self.zoom > 10.0 {
            DetailLevel::Medium
        } else if self.zoom > 1.0 {
            DetailLevel::Low
        } else {
            DetailLevel::Overview
        }
    }
}

/// Semantic zoom level for level-of-detail rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailLevel {
    Full,
    Medium,
    Low,
    Overview,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.center = Point::new(50.0, -20.0);
        vp.zoom = 2.5;
        let w = vp.screen_to_world(123.0, 456.0);
        let (sx, sy) = vp.world_to_screen(&w);
        assert!((sx - 123.0).abs() < 1e-9);
        assert!((sy - 456.0).abs() < 1e-9);
    }

    #[test]
    fn test_y_axis_inverted() {
        let vp = Viewport::new(800.0, 600.0);
        // Screen top (y = 0) maps above the center in world space.
        let top = vp.screen_to_world(400.0, 0.0);
        assert!(top.y > 0.0);
        let bottom = vp.screen_to_world(400.0, 600.0);
        assert!(bottom.y < 0.0);
    }

    #[test]
    fn test_zoom_at_keeps_cursor_fixed() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.center = Point::new(10.0, 10.0);
        let before = vp.screen_to_world(200.0, 150.0);
        vp.zoom_at(200.0, 150.0, 2.0);
        let after = vp.screen_to_world(200.0, 150.0);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_fit_bbox() {
        let mut vp = Viewport::new(1000.0, 1000.0);
        vp.fit_bbox(&BBox::new(Point::new(0.0, 0.0), Point::new(100.0, 50.0)));
        assert_eq!(vp.center, Point::new(50.0, 25.0));
        // Width-limited: 1000 / 100 * 0.9.
        assert!((vp.zoom - 9.0).abs() < 1e-9);
        let vis = vp.visible_bounds();
        assert!(vis.contains_point(&Point::new(0.0, 0.0)));
        assert!(vis.contains_point(&Point::new(100.0, 50.0)));
    }

    #[test]
    fn test_visible_bounds() {
        let mut vp = Viewport::new(200.0, 100.0);
        vp.zoom = 2.0;
        let vis = vp.visible_bounds();
        assert_eq!(vis.width(), 100.0);
        assert_eq!(vis.height(), 50.0);
    }
}
