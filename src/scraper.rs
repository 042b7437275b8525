//! Feed ingestion loop.
//!
//! Every tick picks the least recently fetched feed, marks it fetched before
//! touching the network (so a broken feed drops to the back of the queue
//! instead of being retried forever), downloads it and stores each item as a
//! post. Cycles run strictly one after another.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dates::parse_pub_date;
use crate::db::{Database, Feed, Post};
use crate::error::{DbError, ScrapeError};
use crate::fetcher::{Fetcher, RawItem};

/// Outcome of one scrape cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_name: String,
    /// Items stored as new posts
    pub created: usize,
    /// Items whose URL was already stored
    pub duplicates: usize,
    /// Items that could not be stored
    pub failed: usize,
    /// Stored posts without a usable publish date
    pub undated: usize,
}

pub struct Scraper {
    db: Arc<Database>,
    fetcher: Fetcher,
}

impl Scraper {
    pub fn new(db: Arc<Database>, fetcher: Fetcher) -> Self {
        Self { db, fetcher }
    }

    /// Run a single select, mark, fetch and ingest cycle.
    pub async fn scrape_next_feed(&self) -> Result<CycleReport, ScrapeError> {
        let feed = match self.db.select_next_feed_to_fetch().await {
            Ok(feed) => feed,
            Err(DbError::NotFound(_)) => return Err(ScrapeError::NoFeeds),
            Err(e) => return Err(e.into()),
        };

        self.db.mark_feed_fetched(feed.id, Utc::now()).await?;

        let raw = self
            .fetcher
            .fetch_feed(&feed.url)
            .await
            .map_err(|source| ScrapeError::Fetch {
                feed: feed.name.clone(),
                source,
            })?;

        debug!(
            "Feed '{}' ({}) returned {} items",
            feed.name,
            raw.title,
            raw.items.len()
        );

        Ok(self.ingest_items(&feed, raw.items).await)
    }

    /// Store `items` as posts of `feed`, in order.
    ///
    /// Problems with one item never stop the rest of the batch.
    pub async fn ingest_items(&self, feed: &Feed, items: Vec<RawItem>) -> CycleReport {
        let mut report = CycleReport {
            feed_name: feed.name.clone(),
            ..Default::default()
        };

        for item in items {
            let link = item.link.trim().to_string();
            if link.is_empty() {
                warn!(
                    "Skipping post '{}' from feed '{}': item has no link",
                    item.title, feed.name
                );
                report.failed += 1;
                continue;
            }

            let published_at = match parse_pub_date(&item.pub_date) {
                Ok(date) => Some(date.with_timezone(&Utc)),
                Err(e) => {
                    warn!(
                        "Storing post '{}' from feed '{}' without a publish date: {}",
                        item.title, feed.name, e
                    );
                    None
                }
            };

            let now = Utc::now();
            let post = Post {
                id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
                title: non_empty(item.title),
                url: link,
                description: non_empty(item.description),
                published_at,
                feed_id: feed.id,
            };

            match self.db.create_post(post).await {
                Ok(post) => {
                    info!(
                        "Saved post '{}' from feed '{}'",
                        post.title.as_deref().unwrap_or(&post.url),
                        feed.name
                    );
                    report.created += 1;
                    if post.published_at.is_none() {
                        report.undated += 1;
                    }
                }
                Err(DbError::UniqueViolation(_)) => {
                    report.duplicates += 1;
                }
                Err(e) => {
                    error!("Failed to save post from feed '{}': {}", feed.name, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Feed '{}': {} new, {} already stored, {} failed",
            report.feed_name, report.created, report.duplicates, report.failed
        );
        report
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Scrape one feed per tick until `shutdown` resolves.
///
/// The first cycle starts immediately. A slow cycle delays the following
/// ticks rather than letting them pile up.
pub async fn run_scraper<F>(scraper: &Scraper, every: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    info!("Collecting feeds every {:?}", every);

    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down feed collection");
                return;
            }
            _ = timer.tick() => {}
        }

        match scraper.scrape_next_feed().await {
            Ok(_) => {}
            Err(ScrapeError::NoFeeds) => {
                warn!("No feeds to fetch, skipping this tick");
            }
            Err(e) => {
                error!("Scrape cycle failed: {}", e);
            }
        }
    }
}
