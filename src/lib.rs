//! Log-frequency spectrum rendering with an optional phosphor persistence
//! stage, plus the audio analysis, configuration and encoding host around it.

pub mod audio;
pub mod cli;
pub mod config;
pub mod encode;
pub mod render;
pub mod spectrum;
