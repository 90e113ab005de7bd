//! Filesystem discovery and host information helpers.
pub mod fs;
pub mod platform;

pub use fs::{find_files, find_libraries, is_library_file};
pub use platform::platform_name;

#[cfg(test)]
mod tests;
