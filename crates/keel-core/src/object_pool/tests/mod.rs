pub mod aggregate_tests;
pub mod pool_tests;
