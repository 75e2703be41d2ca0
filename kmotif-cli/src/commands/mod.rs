//! Command implementations for the kmotif CLI

pub mod discover;
