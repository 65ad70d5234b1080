use std::collections::BTreeMap;

use collision_dashboard::data::GroupKey;
use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: group key → Color32
// ---------------------------------------------------------------------------

/// Assigns each group of a chart its own colour, stable across redraws.
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    mapping: BTreeMap<GroupKey, Color32>,
}

impl ColorMap {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a GroupKey>) -> Self {
        let keys: Vec<&GroupKey> = keys.into_iter().collect();
        let palette = generate_palette(keys.len());
        ColorMap {
            mapping: keys.into_iter().cloned().zip(palette).collect(),
        }
    }

    /// Look up the colour for a group, grey for groups the map has not seen.
    pub fn color_for(&self, key: &GroupKey) -> Color32 {
        self.mapping.get(key).copied().unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let p = generate_palette(5);
        assert_eq!(p.len(), 5);
        assert_ne!(p[0], p[1]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_unmapped_key_is_grey() {
        let keys = [GroupKey::Hour(1), GroupKey::Hour(2)];
        let cm = ColorMap::new(&keys);
        assert_ne!(cm.color_for(&GroupKey::Hour(1)), Color32::GRAY);
        assert_eq!(cm.color_for(&GroupKey::Hour(3)), Color32::GRAY);
    }
}
