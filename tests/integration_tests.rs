//! Integration tests for the gator RSS aggregator
//!
//! These tests drive the public API the way the binary does: config on disk,
//! a file-backed SQLite database and feeds served over HTTP.

mod common {
    use tempfile::TempDir;

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    pub fn rss(items: &[(&str, &str, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(title, link, pub_date)| {
                format!(
                    "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate></item>",
                    title, link, pub_date
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title><link>https://example.com</link><description>Test feed</description>{}</channel></rss>"#,
            items
        )
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::common::*;
    use gator::config::Config;

    #[test]
    fn test_config_survives_login_round_trip() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("gator.toml");

        let mut config = Config {
            db_url: create_db_path(&temp_dir),
            ..Default::default()
        };
        config.save(&path).unwrap();
        config.set_user("lane", &path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.db_url, config.db_url);
        assert_eq!(loaded.current_user_name.as_deref(), Some("lane"));
        assert_eq!(loaded.fetcher, config.fetcher);
    }
}

#[cfg(test)]
mod database_integration_tests {
    use super::common::*;
    use chrono::Utc;
    use gator::db::{Database, Post};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_database_persistence() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);
        let fetched_at = Utc::now();

        // Create database and add data
        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();

            let user = db.create_user("lane").await.unwrap();
            let feed = db
                .create_feed("Persistent Feed", "https://persistent.com/rss", user.id)
                .await
                .unwrap();
            db.mark_feed_fetched(feed.id, fetched_at).await.unwrap();
            db.create_post(Post {
                id: Uuid::new_v4(),
                created_at: fetched_at,
                updated_at: fetched_at,
                title: Some("Persistent Article".to_string()),
                url: "https://persistent.com/article".to_string(),
                description: None,
                published_at: None,
                feed_id: feed.id,
            })
            .await
            .unwrap();
        }

        // Reopen database and verify data persists
        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();

            let feed = db.get_feed_by_url("https://persistent.com/rss").await.unwrap();
            assert_eq!(feed.name, "Persistent Feed");
            assert_eq!(feed.last_fetched_at, Some(fetched_at));

            let post = db
                .get_post_by_url("https://persistent.com/article")
                .await
                .unwrap();
            assert_eq!(post.title.as_deref(), Some("Persistent Article"));
            assert_eq!(post.feed_id, feed.id);
        }
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::common::*;
    use chrono::{Duration, Utc};
    use gator::db::Database;
    use gator::error::ScrapeError;
    use gator::fetcher::{Fetcher, FetcherConfig};
    use gator::scraper::Scraper;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(temp_dir: &tempfile::TempDir) -> (Arc<Database>, Scraper) {
        let db = Database::new(&create_db_path(temp_dir)).await.unwrap();
        db.initialize().await.unwrap();
        let db = Arc::new(db);
        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        (db.clone(), Scraper::new(db, fetcher))
    }

    #[tokio::test]
    async fn test_feeds_rotate_oldest_first() {
        let server = MockServer::start().await;
        for name in ["a", "b", "c"] {
            let link = format!("https://{}.example.com/post", name);
            let body = rss(&[(name, link.as_str(), "Tue, 10 Jun 2025 04:00:00 GMT")]);
            Mock::given(method("GET"))
                .and(path(format!("/{}.xml", name)))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }

        let temp_dir = create_temp_dir();
        let (db, scraper) = setup(&temp_dir).await;
        let user = db.create_user("lane").await.unwrap();
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            let feed = db
                .create_feed(name, &format!("{}/{}.xml", server.uri(), name), user.id)
                .await
                .unwrap();
            ids.push(feed.id);
        }
        // "c" was fetched long ago, "a" recently; "b" never
        db.mark_feed_fetched(ids[2], Utc::now() - Duration::days(1))
            .await
            .unwrap();
        db.mark_feed_fetched(ids[0], Utc::now() - Duration::minutes(5))
            .await
            .unwrap();

        let mut order = Vec::new();
        for _ in 0..4 {
            order.push(scraper.scrape_next_feed().await.unwrap().feed_name);
        }

        assert_eq!(order, vec!["b", "c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_unreachable_feed_does_not_block_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down.xml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/up.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[(
                "Up",
                "https://up.example.com/1",
                "2025-06-10T04:00:00Z",
            )])))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let (db, scraper) = setup(&temp_dir).await;
        let user = db.create_user("lane").await.unwrap();
        db.create_feed("Down", &format!("{}/down.xml", server.uri()), user.id)
            .await
            .unwrap();
        let up = db
            .create_feed("Up", &format!("{}/up.xml", server.uri()), user.id)
            .await
            .unwrap();

        let first = scraper.scrape_next_feed().await;
        assert!(matches!(first, Err(ScrapeError::Fetch { .. })));

        let second = scraper.scrape_next_feed().await.unwrap();
        assert_eq!(second.feed_name, "Up");
        assert_eq!(db.get_post_count_for_feed(up.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_followed_posts_are_browsable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[
                ("Older", "https://blog.example.com/older", "Mon, 09 Jun 2025 08:00:00 +0000"),
                ("Newer", "https://blog.example.com/newer", "Tue, 10 Jun 2025 08:00:00 +0000"),
            ])))
            .mount(&server)
            .await;

        let temp_dir = create_temp_dir();
        let (db, scraper) = setup(&temp_dir).await;
        let user = db.create_user("lane").await.unwrap();
        let feed = db.create_feed("Blog", &server.uri(), user.id).await.unwrap();
        db.create_feed_follow(user.id, feed.id).await.unwrap();

        scraper.scrape_next_feed().await.unwrap();

        let posts = db.get_posts_for_user(user.id, 2).await.unwrap();
        let titles: Vec<_> = posts.iter().filter_map(|p| p.title.as_deref()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }
}
