//! keywrap core - shared functionality for keywrap tools

pub mod paths;

pub use paths::Paths;
