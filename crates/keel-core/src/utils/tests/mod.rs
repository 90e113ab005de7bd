pub mod fs_tests;
pub mod platform_tests;
