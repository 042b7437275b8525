//! Gator - A command-line RSS aggregator
//!
//! Users register, follow feeds and run `gator agg` to pull new posts into a
//! shared SQLite store, one feed per tick.

pub mod cli;
pub mod commands;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod scraper;
