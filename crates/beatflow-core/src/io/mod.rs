pub mod image_io;

pub use image_io::{frame_paths, load_frame_directory, load_image};
