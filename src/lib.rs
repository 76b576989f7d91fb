//! Decoherence - deterministic core of a time-travel strategy game

pub mod command;
pub mod core;
pub mod player;
pub mod sim;
pub mod timeline;
pub mod visibility;
