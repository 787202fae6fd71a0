#![forbid(unsafe_code)]

pub mod bot;
pub mod budget;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod formats;
pub mod logging;
pub mod preview;
pub mod publish;
pub mod wiki;
