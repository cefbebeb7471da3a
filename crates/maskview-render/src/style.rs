use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use maskview_core::LayerKey;

/// RGB color for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LayerColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_f32_array(&self, opacity: f32) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            opacity,
        ]
    }
}

/// Color + opacity for one layer key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub color: LayerColor,
    pub opacity: f32,
}

impl LayerStyle {
    pub fn new(color: LayerColor, opacity: f32) -> Self {
        Self { color, opacity }
    }

    /// RGBA with opacity folded in.
    pub fn rgba(&self) -> [f32; 4] {
        self.color.to_f32_array(self.opacity)
    }
}

/// Per-layer style registry with a generated default palette.
///
/// Unset layers get a deterministic color from a golden-angle hue walk over
/// the layer number, so the same layer always renders the same color across
/// sessions.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: HashMap<LayerKey, LayerStyle>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: LayerKey, style: LayerStyle) {
        self.styles.insert(key, style);
    }

    pub fn get(&self, key: &LayerKey) -> LayerStyle {
        self.styles
            .get(key)
            .copied()
            .unwrap_or_else(|| Self::generated(key))
    }

    pub fn is_set(&self, key: &LayerKey) -> bool {
        self.styles.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.styles.clear();
    }

    /// Default palette entry for a layer key.
    fn generated(key: &LayerKey) -> LayerStyle {
        // Golden-angle walk keeps adjacent layer numbers visually distinct;
        // the datatype nudges lightness so 1/0 and 1/1 differ.
        let hue = (key.layer as f64 * 137.508) % 360.0;
        let lightness = 0.5 + 0.1 * ((key.datatype % 3) as f64 - 1.0);
        let (r, g, b) = hsl_to_rgb(hue, 0.65, lightness);
        LayerStyle::new(LayerColor::new(r, g, b), 0.7)
    }
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    (
        ((r1 + m) * 255.0).round() as u8,
        ((g1 + m) * 255.0).round() as u8,
        ((b1 + m) * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_style_wins() {
        let mut reg = StyleRegistry::new();
        let key = LayerKey::new(1, 0);
        reg.set(key, LayerStyle::new(LayerColor::new(255, 0, 0), 1.0));
        assert_eq!(reg.get(&key).color, LayerColor::new(255, 0, 0));
    }

    #[test]
    fn test_generated_palette_is_deterministic() {
        let reg = StyleRegistry::new();
        let key = LayerKey::new(5, 0);
        assert_eq!(reg.get(&key), reg.get(&key));
        assert!(!reg.is_set(&key));
    }

    #[test]
    fn test_generated_palette_varies_by_layer() {
        let reg = StyleRegistry::new();
        let a = reg.get(&LayerKey::new(1, 0));
        let b = reg.get(&LayerKey::new(2, 0));
        assert_ne!(a.color, b.color);
    }

    #[test]
    fn test_rgba_folds_opacity() {
        let style = LayerStyle::new(LayerColor::new(255, 128, 0), 0.5);
        let rgba = style.rgba();
        assert!((rgba[0] - 1.0).abs() < 1e-6);
        assert!((rgba[3] - 0.5).abs() < 1e-6);
    }
}
