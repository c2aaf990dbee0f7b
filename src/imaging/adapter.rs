use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Output spatial resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub height: u32,
    pub width: u32,
}

impl TargetSize {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

/// View the matrix as a grayscale image: rows become image rows, columns image columns.
pub fn to_grayscale(matrix: &Array2<u8>) -> GrayImage {
    let (rows, cols) = matrix.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([matrix[[y as usize, x as usize]]])
    })
}

/// Bilinear resize. Triangle weights are non-negative, so no value leaves
/// the source range.
pub fn resize(gray: &GrayImage, size: TargetSize) -> GrayImage {
    imageops::resize(gray, size.width, size.height, FilterType::Triangle)
}

/// Resize the intensity matrix and replicate it into three identical channels.
pub fn to_pseudo_rgb(matrix: &Array2<u8>, size: TargetSize) -> RgbImage {
    let resized = resize(&to_grayscale(matrix), size);
    DynamicImage::ImageLuma8(resized).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mean (row, col) of the brightest pixels, relative to the image size.
    fn bright_spot(img: &GrayImage) -> (f32, f32) {
        let max = img.pixels().map(|p| p[0]).max().unwrap();
        let (mut sy, mut sx, mut n) = (0.0, 0.0, 0.0);
        for (x, y, p) in img.enumerate_pixels() {
            if p[0] == max {
                sy += y as f32 + 0.5;
                sx += x as f32 + 0.5;
                n += 1.0;
            }
        }
        (sy / n / img.height() as f32, sx / n / img.width() as f32)
    }

    fn blob() -> Array2<u8> {
        let mut m = Array2::<u8>::from_elem((128, 63), 10);
        for r in 28..36 {
            for c in 38..46 {
                m[[r, c]] = 250;
            }
        }
        m
    }

    #[test]
    fn grayscale_keeps_orientation() {
        let mut m = Array2::<u8>::zeros((3, 5));
        m[[0, 4]] = 200;
        let img = to_grayscale(&m);
        assert_eq!(img.dimensions(), (5, 3));
        assert_eq!(img.get_pixel(4, 0)[0], 200);
    }

    #[test]
    fn channels_are_identical() {
        let rgb = to_pseudo_rgb(&blob(), TargetSize::default());
        assert_eq!(rgb.dimensions(), (224, 224));
        assert!(rgb.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }

    #[test]
    fn bright_region_survives_rescaling() {
        let source = to_grayscale(&blob());
        let expected = (32.0 / 128.0, 42.0 / 63.0);

        for size in [
            TargetSize::new(224, 224),
            TargetSize::new(100, 300),
            TargetSize::new(64, 32),
        ] {
            let (y, x) = bright_spot(&resize(&source, size));
            assert!(
                (y - expected.0).abs() < 0.05 && (x - expected.1).abs() < 0.05,
                "{size:?}: bright spot at ({y}, {x})"
            );
        }
    }

    #[test]
    fn no_overshoot() {
        let m = Array2::from_shape_fn((128, 40), |(r, c)| if (r + c) % 2 == 0 { 30 } else { 220 });
        let resized = resize(&to_grayscale(&m), TargetSize::new(224, 224));
        assert!(resized.pixels().all(|p| (30..=220).contains(&p[0])));
    }
}
