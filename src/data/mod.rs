pub mod buffer;
pub mod element;
pub mod image;
pub mod loader;
pub mod synthetic;

pub use element::{ElementType, Pixel};
pub use self::image::{image_center, DynImage, Image, ImageData};
pub use loader::*;
