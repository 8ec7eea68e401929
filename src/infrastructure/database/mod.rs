pub mod repositories;
pub mod schema;

pub use schema::{connect, run_migrations};
