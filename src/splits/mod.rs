//! Split images and the ordered split list
//!
//! - `metadata` - file name grammar (threshold, delay, suspend, loops, flags)
//! - `split_image` - a single decoded split image with its mask
//! - `dir` - the directory-backed list and its cursor

mod dir;
mod split_image;
mod metadata;

pub use dir::{is_split_image, SplitDir, SPLIT_IMAGE_EXTENSIONS};
pub use split_image::SplitImage;
pub use metadata::{SplitDefaults, SplitFlags, SplitMetadata, MAX_LOOPS, MAX_TIME_SECONDS};
