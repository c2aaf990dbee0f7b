use image::RgbImage;
use ndarray::{Array4, Axis};
use serde::Serialize;

/// Batch of one RGB image in NHWC order, values in `[0, 1]`.
pub type ImageTensor = Array4<f32>;

/// Scale intensities to the unit interval and add the leading batch axis.
pub fn to_tensor(rgb: &RgbImage) -> ImageTensor {
    let (width, height) = rgb.dimensions();
    Array4::from_shape_fn((1, height as usize, width as usize, 3), |(_, y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Summary figures of a packaged tensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorStats {
    pub shape: [usize; 4],
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Image row with the highest mean intensity, if any.
    pub brightest_row: Option<usize>,
}

pub fn stats(tensor: &ImageTensor) -> TensorStats {
    let (n, h, w, c) = tensor.dim();
    let min = tensor.iter().copied().fold(f32::INFINITY, f32::min);
    let max = tensor.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = tensor.mean().unwrap_or(0.0);

    let brightest_row = tensor
        .mean_axis(Axis(3))
        .and_then(|m| m.mean_axis(Axis(2)))
        .and_then(|m| m.mean_axis(Axis(0)))
        .and_then(|rows| {
            rows.iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
        });

    TensorStats {
        shape: [n, h, w, c],
        min,
        max,
        mean,
        brightest_row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn layout_and_scale() {
        let mut rgb = RgbImage::new(4, 2);
        rgb.put_pixel(3, 1, Rgb([255, 51, 0]));

        let tensor = to_tensor(&rgb);
        assert_eq!(tensor.dim(), (1, 2, 4, 3));
        assert_eq!(tensor[[0, 1, 3, 0]], 1.0);
        assert!((tensor[[0, 1, 3, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 3, 2]], 0.0);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn stats_find_bright_row() {
        let mut rgb = RgbImage::new(3, 4);
        for x in 0..3 {
            rgb.put_pixel(x, 2, Rgb([255, 255, 255]));
        }

        let s = stats(&to_tensor(&rgb));
        assert_eq!(s.shape, [1, 4, 3, 3]);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 1.0);
        assert!((s.mean - 0.25).abs() < 1e-6);
        assert_eq!(s.brightest_row, Some(2));
    }
}
