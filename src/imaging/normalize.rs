use ndarray::Array2;

/// Linearly map `[min, max]` of `db` onto `[0, 255]`, rounding to nearest.
///
/// A flat matrix (including an empty one) maps to all zeros.
pub fn to_intensity(db: &Array2<f32>) -> Array2<u8> {
    let (min, max) = db
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !(range > 0.0) {
        return Array2::zeros(db.raw_dim());
    }

    db.mapv(|v| (255.0 * (v - min) / range).round().clamp(0.0, 255.0) as u8)
}
