use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tracing::info;

use crate::cli::Command;
use crate::config::Config;
use crate::db::{Database, User};
use crate::error::DbError;
use crate::fetcher::Fetcher;
use crate::scraper::{run_scraper, Scraper};

/// Everything a command handler may touch.
pub struct State {
    pub db: Arc<Database>,
    pub config: Config,
    pub config_path: PathBuf,
}

impl State {
    pub fn new(db: Arc<Database>, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    async fn current_user(&self) -> anyhow::Result<User> {
        let name = self
            .config
            .current_user_name
            .as_deref()
            .ok_or_else(|| anyhow!("no user is logged in; run `gator login <name>` first"))?;

        match self.db.get_user_by_name(name).await {
            Ok(user) => Ok(user),
            Err(DbError::NotFound(_)) => {
                bail!("logged in user '{}' no longer exists; register or log in again", name)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Dispatch a parsed command to its handler.
pub async fn run(state: &mut State, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Register { name } => register(state, &name).await,
        Command::Login { name } => login(state, &name).await,
        Command::Reset => reset(state).await,
        Command::Users => users(state).await,
        Command::Addfeed { name, url } => add_feed(state, &name, &url).await,
        Command::Feeds => feeds(state).await,
        Command::Follow { url } => follow(state, &url).await,
        Command::Following => following(state).await,
        Command::Unfollow { url } => unfollow(state, &url).await,
        Command::Browse { limit } => browse(state, limit).await,
        Command::Agg { time_between_reqs } => {
            let fetcher = Fetcher::new(&state.config.fetcher)?;
            let scraper = Scraper::new(state.db.clone(), fetcher);
            run_scraper(&scraper, time_between_reqs, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;
            Ok(())
        }
    }
}

pub async fn register(state: &mut State, name: &str) -> anyhow::Result<()> {
    let user = match state.db.create_user(name).await {
        Ok(user) => user,
        Err(DbError::UniqueViolation(_)) => bail!("user '{}' already exists", name),
        Err(e) => return Err(e.into()),
    };

    state
        .config
        .set_user(&user.name, &state.config_path)
        .context("failed to save config")?;

    info!("Registered user {} ({})", user.name, user.id);
    println!("User '{}' created and logged in", user.name);
    Ok(())
}

pub async fn login(state: &mut State, name: &str) -> anyhow::Result<()> {
    let user = match state.db.get_user_by_name(name).await {
        Ok(user) => user,
        Err(DbError::NotFound(_)) => bail!("cannot log in as '{}': no such user", name),
        Err(e) => return Err(e.into()),
    };

    state
        .config
        .set_user(&user.name, &state.config_path)
        .context("failed to save config")?;

    println!("Logged in as {}", user.name);
    Ok(())
}

pub async fn reset(state: &State) -> anyhow::Result<()> {
    let removed = state.db.reset_users().await?;
    println!("Removed {} user(s)", removed);
    Ok(())
}

pub async fn users(state: &State) -> anyhow::Result<()> {
    let current = state.config.current_user_name.as_deref();

    for user in state.db.get_users().await? {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

pub async fn add_feed(state: &State, name: &str, url: &str) -> anyhow::Result<()> {
    let user = state.current_user().await?;

    let feed = match state.db.create_feed(name, url, user.id).await {
        Ok(feed) => feed,
        Err(DbError::UniqueViolation(_)) => {
            bail!("a feed with url '{}' already exists; use `gator follow {}`", url, url)
        }
        Err(e) => return Err(e.into()),
    };
    state.db.create_feed_follow(user.id, feed.id).await?;

    println!("Added feed '{}' ({})", feed.name, feed.url);
    println!("{} is now following '{}'", user.name, feed.name);
    Ok(())
}

pub async fn feeds(state: &State) -> anyhow::Result<()> {
    let feeds = state.db.get_feeds_with_owners().await?;
    if feeds.is_empty() {
        println!("No feeds yet; add one with `gator addfeed <name> <url>`");
        return Ok(());
    }

    for feed in feeds {
        let fetched = feed
            .last_fetched_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("* {}", feed.name);
        println!("    url:          {}", feed.url);
        println!("    added by:     {}", feed.user_name);
        println!("    last fetched: {}", fetched);
    }
    Ok(())
}

pub async fn follow(state: &State, url: &str) -> anyhow::Result<()> {
    let user = state.current_user().await?;

    let feed = match state.db.get_feed_by_url(url).await {
        Ok(feed) => feed,
        Err(DbError::NotFound(_)) => bail!("no feed with url '{}'; add it with `gator addfeed`", url),
        Err(e) => return Err(e.into()),
    };

    match state.db.create_feed_follow(user.id, feed.id).await {
        Ok(_) => {}
        Err(DbError::UniqueViolation(_)) => bail!("{} already follows '{}'", user.name, feed.name),
        Err(e) => return Err(e.into()),
    }

    println!("{} is now following '{}'", user.name, feed.name);
    Ok(())
}

pub async fn following(state: &State) -> anyhow::Result<()> {
    let user = state.current_user().await?;

    for followed in state.db.get_feed_follows_for_user(user.id).await? {
        println!("* {} ({})", followed.feed_name, followed.feed_url);
    }
    Ok(())
}

pub async fn unfollow(state: &State, url: &str) -> anyhow::Result<()> {
    let user = state.current_user().await?;

    match state.db.delete_feed_follow(user.id, url).await {
        Ok(()) => {
            println!("{} unfollowed {}", user.name, url);
            Ok(())
        }
        Err(DbError::NotFound(_)) => bail!("{} does not follow '{}'", user.name, url),
        Err(e) => Err(e.into()),
    }
}

pub async fn browse(state: &State, limit: i64) -> anyhow::Result<()> {
    if limit < 1 {
        bail!("limit must be at least 1");
    }
    let user = state.current_user().await?;

    for post in state.db.get_posts_for_user(user.id, limit).await? {
        let published = post
            .published_at
            .map(|at| at.format("%a %b %e %Y").to_string())
            .unwrap_or_else(|| "undated".to_string());

        println!("{} | {}", published, post.title.as_deref().unwrap_or("(untitled)"));
        println!("    {}", post.url);
        if let Some(description) = &post.description {
            println!("    {}", description);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_state(temp_dir: &TempDir) -> State {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        State::new(
            Arc::new(db),
            Config::default(),
            temp_dir.path().join("gator.toml"),
        )
    }

    #[tokio::test]
    async fn test_register_logs_in_and_saves_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;

        run(&mut state, Command::Register { name: "lane".to_string() })
            .await
            .unwrap();

        assert_eq!(state.config.current_user_name.as_deref(), Some("lane"));
        let saved = Config::load(&state.config_path).unwrap();
        assert_eq!(saved.current_user_name.as_deref(), Some("lane"));
    }

    #[tokio::test]
    async fn test_register_twice_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;

        register(&mut state, "lane").await.unwrap();
        let err = register(&mut state, "lane").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_login_unknown_user_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;

        let err = login(&mut state, "ghost").await.unwrap_err();
        assert!(err.to_string().contains("no such user"));
        assert!(state.config.current_user_name.is_none());
    }

    #[tokio::test]
    async fn test_add_feed_requires_login() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;

        let err = add_feed(&mut state, "Blog", "https://blog.example.com/rss")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no user is logged in"));
    }

    #[tokio::test]
    async fn test_add_feed_follows_it() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;
        register(&mut state, "lane").await.unwrap();

        add_feed(&mut state, "Blog", "https://blog.example.com/rss")
            .await
            .unwrap();

        let user = state.db.get_user_by_name("lane").await.unwrap();
        let follows = state.db.get_feed_follows_for_user(user.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_url, "https://blog.example.com/rss");
    }

    #[tokio::test]
    async fn test_follow_and_unfollow_other_users_feed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;
        register(&mut state, "lane").await.unwrap();
        add_feed(&mut state, "Blog", "https://blog.example.com/rss")
            .await
            .unwrap();
        register(&mut state, "kahya").await.unwrap();

        follow(&mut state, "https://blog.example.com/rss").await.unwrap();
        let err = follow(&mut state, "https://blog.example.com/rss")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already follows"));

        unfollow(&mut state, "https://blog.example.com/rss")
            .await
            .unwrap();
        let kahya = state.db.get_user_by_name("kahya").await.unwrap();
        assert!(state
            .db
            .get_feed_follows_for_user(kahya.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_follow_unknown_feed_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;
        register(&mut state, "lane").await.unwrap();

        let err = follow(&mut state, "https://missing.example.com/rss")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no feed with url"));
    }

    #[tokio::test]
    async fn test_reset_forgets_current_user() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;
        register(&mut state, "lane").await.unwrap();

        reset(&mut state).await.unwrap();

        let err = following(&mut state).await.unwrap_err();
        assert!(err.to_string().contains("no longer exists"));
    }

    #[tokio::test]
    async fn test_browse_rejects_zero_limit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = create_test_state(&temp_dir).await;
        register(&mut state, "lane").await.unwrap();

        assert!(browse(&mut state, 0).await.is_err());
        assert!(browse(&mut state, 5).await.is_ok());
    }
}
