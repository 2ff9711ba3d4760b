pub mod approval;
pub mod document;
pub mod enums;
pub mod image;
pub mod record;

pub use approval::*;
pub use document::*;
pub use enums::*;
pub use image::*;
pub use record::*;
