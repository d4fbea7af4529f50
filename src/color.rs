use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Series palette
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues,
/// starting at `start_hue` degrees.
pub fn generate_palette(n: usize, start_hue: f32) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (start_hue + (i as f32 / n as f32) * 360.0) % 360.0;
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

/// Hue of a colour in degrees.
pub fn hue_of(color: Color32) -> f32 {
    let rgb = Srgb::new(color.r(), color.g(), color.b()).into_format::<f32>();
    let hsl: Hsl = rgb.into_color();
    hsl.hue.into_positive_degrees()
}

/// One colour per chart series; the first series takes the accent colour.
pub fn series_colors(accent: Color32, n: usize) -> Vec<Color32> {
    let mut colors = generate_palette(n, hue_of(accent));
    if let Some(first) = colors.first_mut() {
        *first = accent;
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_sizes_and_accent() {
        assert!(generate_palette(0, 0.0).is_empty());
        let accent = Color32::from_rgb(0x4f, 0x46, 0xe5);
        let colors = series_colors(accent, 3);
        assert_eq!(colors.len(), 3);
        assert_eq!(colors[0], accent);
        assert_ne!(colors[1], colors[2]);
    }

    #[test]
    fn hue_of_primary_colors() {
        assert!((hue_of(Color32::from_rgb(255, 0, 0)) - 0.0).abs() < 0.5);
        assert!((hue_of(Color32::from_rgb(0, 0, 255)) - 240.0).abs() < 0.5);
    }
}
