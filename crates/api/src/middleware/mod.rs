//! HTTP middleware

pub mod bearer_auth;
