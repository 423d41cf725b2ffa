//! Command implementations for the chirp CLI

pub mod capture;
pub mod filter;
pub mod sample;
