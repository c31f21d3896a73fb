mod backing;
mod image;

pub use backing::{Backing, mirror};
pub use image::CartridgeImage;
