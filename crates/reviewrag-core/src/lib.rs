#![deny(unused_variables)]

pub mod config;
pub mod dataset;
pub mod document;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;
