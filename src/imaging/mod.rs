//! Intensity normalisation, image resizing and tensor packaging.

pub mod adapter;
pub mod normalize;
pub mod tensor;

pub use adapter::{to_pseudo_rgb, TargetSize};
pub use normalize::to_intensity;
pub use tensor::{stats, to_tensor, ImageTensor, TensorStats};
