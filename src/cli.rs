//! Command-line interface definitions.
//!
//! Each subcommand maps to one handler in [`crate::commands`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// A command-line RSS aggregator.
///
/// # Examples
///
/// ```sh
/// gator register lane
/// gator addfeed "Boot.dev Blog" https://blog.boot.dev/index.xml
/// gator agg 1m
/// gator browse 10
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "GATOR_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a user and log in as them
    Register { name: String },

    /// Switch the current user
    Login { name: String },

    /// Delete every user along with their feeds and posts
    Reset,

    /// List registered users
    Users,

    /// Add a feed and follow it as the current user
    Addfeed { name: String, url: String },

    /// List all feeds and who added them
    Feeds,

    /// Follow an existing feed by URL
    Follow { url: String },

    /// List the feeds the current user follows
    Following,

    /// Stop following a feed by URL
    Unfollow { url: String },

    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = 2)]
        limit: i64,
    },

    /// Fetch one feed per interval until interrupted (e.g. 30s, 1m, 1h30m)
    Agg {
        #[arg(value_parser = parse_interval)]
        time_between_reqs: Duration,
    },
}

/// Parse a duration such as `500ms`, `1m` or `1h30m`.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. Every
/// number needs a unit and the total must be positive.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }

    let too_large = || format!("duration {:?} is too large", input);
    let mut total_nanos: u128 = 0;
    let mut rest = text;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration {:?}: expected a number", input));
        }
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("missing unit in duration {:?}", input)),
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        rest = &rest[unit_len..];

        let nanos = scale_number(number, nanos_per_unit)
            .ok_or_else(|| format!("invalid duration {:?}", input))?;
        total_nanos = total_nanos.checked_add(nanos).ok_or_else(too_large)?;
    }

    if total_nanos == 0 {
        return Err(format!("duration {:?} must be positive", input));
    }
    let total_nanos = u64::try_from(total_nanos).map_err(|_| too_large())?;

    Ok(Duration::from_nanos(total_nanos))
}

/// Multiply a decimal such as `1.25` by `unit` nanoseconds without going
/// through floating point. Fractions below one nanosecond are truncated.
fn scale_number(number: &str, unit: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;

    // Digits past the 20th are worth less than a nanosecond for every unit.
    let mut numerator: u128 = 0;
    let mut denominator: u128 = 1;
    for digit in fraction.bytes().take(20) {
        numerator = numerator * 10 + u128::from(digit - b'0');
        denominator *= 10;
    }
    nanos = nanos.checked_add(numerator * unit / denominator)?;

    Some(nanos)
}
