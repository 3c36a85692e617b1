use image::{Rgba, RgbaImage};

const ORANGE: Rgba<u8> = Rgba([249, 115, 22, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub const WINDOW_ICON_SIZE: u32 = 128;

/// Orange rounded square with a white download arrow over a baseline
pub fn render(size: u32) -> RgbaImage {
    let s = size as f32;
    let radius = (size / 6) as f32;
    let cx = s / 2.0;
    let pad = s * 0.20;

    let shaft_top = s * 0.15;
    let shaft_bottom = s * 0.58;
    let shaft_w = (s * 0.13).max(2.0);

    let arrow_w = s * 0.45;
    let arrow_h = s * 0.22;

    let line_y = s * 0.80;
    let line_w = (s * 0.09).max(1.0);

    RgbaImage::from_fn(size, size, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);

        if !in_rounded_square(px, py, s, radius) {
            return CLEAR;
        }

        let shaft = (px - cx).abs() <= shaft_w / 2.0 && (shaft_top..=shaft_bottom).contains(&py);

        let head = (shaft_bottom..=shaft_bottom + arrow_h).contains(&py) && {
            let remaining = 1.0 - (py - shaft_bottom) / arrow_h;
            (px - cx).abs() <= arrow_w / 2.0 * remaining
        };

        let baseline = (pad..=s - pad).contains(&px) && (line_y..=line_y + line_w).contains(&py);

        if shaft || head || baseline {
            WHITE
        } else {
            ORANGE
        }
    })
}

fn in_rounded_square(px: f32, py: f32, size: f32, radius: f32) -> bool {
    let nx = px.clamp(radius, size - radius);
    let ny = py.clamp(radius, size - radius);
    let (dx, dy) = (px - nx, py - ny);
    dx * dx + dy * dy <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_layout() {
        let icon = render(WINDOW_ICON_SIZE);
        assert_eq!(icon.dimensions(), (128, 128));

        // Corners are cut away by the rounding
        assert_eq!(*icon.get_pixel(0, 0), CLEAR);
        assert_eq!(*icon.get_pixel(127, 127), CLEAR);

        // Background, arrow shaft, and baseline
        assert_eq!(*icon.get_pixel(10, 64), ORANGE);
        assert_eq!(*icon.get_pixel(64, 40), WHITE);
        assert_eq!(*icon.get_pixel(64, 105), WHITE);
    }

    #[test]
    fn test_small_sizes_render() {
        for size in [16, 48] {
            let icon = render(size);
            assert_eq!(icon.width(), size);
            assert!(icon.pixels().any(|p| *p == WHITE));
        }
    }
}
