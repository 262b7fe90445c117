/// State management module
///
/// This module handles all application state, including:
/// - Shared data structures (data.rs)
/// - The immutable, height-sorted tree store (store.rs)
/// - The per-session batch pagination controller (pagination.rs)

pub mod data;
pub mod pagination;
pub mod store;
