pub mod error_tests;
