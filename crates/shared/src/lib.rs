//! Slotbook Shared - Service bootstrap helpers

pub mod bootstrap;

pub use bootstrap::{init_db, init_env, init_tracing};
