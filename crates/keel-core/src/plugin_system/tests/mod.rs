pub mod support;

pub mod lock_file_tests;
pub mod options_tests;
