//! Business operations. Handlers stay thin: they extract, call one function
//! here, and wrap the result in a response.
//!
//! Every function takes `&dyn Repository` so the same code runs against the
//! Postgres store and the in-memory store.

pub mod auth;
pub mod category;
pub mod event;
pub mod speaker;
