//! Core data structures shared by the dictionary, postings and scoring layers.

pub mod posting;
pub mod segment;
pub mod term;
