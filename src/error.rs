//! Error types for the ingestion pipeline.
//!
//! Each layer gets its own enum so the scheduler can decide, per variant,
//! whether a failure aborts the cycle, skips one item, or is ignored.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to turn a `pubDate` string into a timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("post has no publish date")]
    NoDate,

    #[error("unknown publish date format: {0:?}")]
    UnknownFormat(String),
}

/// Failure to retrieve or decode a feed document.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status: {0}")]
    HttpStatus(StatusCode),

    #[error("failed to parse feed: {0}")]
    Parse(String),
}

impl From<rss::Error> for FetchError {
    fn from(err: rss::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// Persistence errors, classified so callers never match on message text.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("duplicate value violates a unique constraint: {0}")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::UniqueViolation(db_err.message().to_string())
            }
            _ => DbError::Sqlx(err),
        }
    }
}

/// Errors that abort a whole scrape cycle.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("no feeds to fetch")]
    NoFeeds,

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("failed to fetch feed '{feed}': {source}")]
    Fetch {
        feed: String,
        #[source]
        source: FetchError,
    },
}
