//! # API Runner Sample
//!
//! A small static-site build host exposing the pieces the engine leaves to its
//! embedder: the lifecycle catalogue, the action creators, a store that reduces
//! actions and a handful of plugins.

pub mod actions;
pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod plugins;
pub mod store;
