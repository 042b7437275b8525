use std::time::Duration;

use reqwest::Client;
use rss::{Channel, Item};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str = "gator";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP settings for feed retrieval.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FetcherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A parsed RSS channel. Lives only for the duration of one scrape cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

impl RawFeed {
    /// Decode HTML entities left in titles and descriptions.
    ///
    /// Publishers frequently double-escape, so `&amp;#39;` survives XML
    /// unescaping as `&#39;`.
    pub fn unescape(&mut self) {
        unescape_in_place(&mut self.title);
        unescape_in_place(&mut self.description);

        for item in &mut self.items {
            unescape_in_place(&mut item.title);
            unescape_in_place(&mut item.description);
        }
    }
}

fn unescape_in_place(text: &mut String) {
    if text.contains('&') {
        *text = html_escape::decode_html_entities(text.as_str()).into_owned();
    }
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    /// Download and parse the RSS document at `url`.
    ///
    /// The body is read completely before parsing. Non-2xx responses are
    /// rejected without looking at the body.
    pub async fn fetch_feed(&self, url: &str) -> Result<RawFeed, FetchError> {
        info!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        let bytes = response.bytes().await?;
        debug!("Read {} bytes from {}", bytes.len(), url);

        let mut feed = parse_feed(&bytes)?;
        feed.unescape();
        Ok(feed)
    }
}

/// Parse an RSS 2.0 document into a [`RawFeed`].
///
/// XML entities are decoded by the reader; HTML entities are left for
/// [`RawFeed::unescape`]. Missing elements become empty strings.
pub fn parse_feed(bytes: &[u8]) -> Result<RawFeed, FetchError> {
    let channel = Channel::read_from(bytes)?;
    Ok(RawFeed::from(channel))
}

impl From<Channel> for RawFeed {
    fn from(channel: Channel) -> Self {
        RawFeed {
            title: channel.title().to_string(),
            link: channel.link().to_string(),
            description: channel.description().to_string(),
            items: channel.items().iter().map(RawItem::from).collect(),
        }
    }
}

impl From<&Item> for RawItem {
    fn from(item: &Item) -> Self {
        RawItem {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            description: item.description().unwrap_or_default().to_string(),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
        }
    }
}
