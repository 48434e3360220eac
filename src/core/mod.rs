//! Core modules for Opsboard's coordination store.
//!
//! Shared primitives live here: the store handle, tolerant document I/O,
//! the mutation broker, config, and time helpers.

pub mod broker;
pub mod config;
pub mod document;
pub mod error;
pub mod store;
pub mod time;
