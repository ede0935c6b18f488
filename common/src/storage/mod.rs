pub mod backend;
pub mod db;
pub mod graphql;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod schema;
pub mod types;
