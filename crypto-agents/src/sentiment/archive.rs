use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::Utc;
use common::{AgentError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::social_media::SocialPost;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedPost {
    pub collection_time: String,
    pub tweet_id: String,
    pub created_at: String,
    pub user_name: String,
    pub user_id: String,
    pub text: String,
    pub raw_text: String,
    pub retweet_count: u64,
    pub favorite_count: u64,
    pub reply_count: u64,
    pub quote_count: u64,
    pub language: String,
}

impl ArchivedPost {
    fn from_post(post: &SocialPost, collection_time: &str) -> Self {
        Self {
            collection_time: collection_time.to_string(),
            tweet_id: post.id.clone(),
            created_at: post.created_at.clone(),
            user_name: post.author_name.clone(),
            user_id: post.author_id.clone(),
            text: post.cleaned_text.clone(),
            raw_text: post.text.clone(),
            retweet_count: post.retweet_count,
            favorite_count: post.like_count,
            reply_count: post.reply_count,
            quote_count: post.quote_count,
            language: post.language.clone(),
        }
    }
}

/// Per-keyword CSV archive of collected posts, deduplicated by post id.
pub struct PostArchive {
    folder: PathBuf,
}

impl PostArchive {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn file_for(&self, keyword: &str) -> PathBuf {
        self.folder.join(format!("{}_tweets.csv", keyword))
    }

    pub fn load(&self, keyword: &str) -> Result<Vec<ArchivedPost>> {
        let path = self.file_for(keyword);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path).map_err(storage_error)?;
        reader
            .deserialize()
            .map(|row| row.map_err(storage_error))
            .collect()
    }

    /// Append posts not already archived. Returns how many were written.
    pub fn save_posts(&self, keyword: &str, posts: &[SocialPost]) -> Result<usize> {
        if posts.is_empty() {
            return Ok(0);
        }
        std::fs::create_dir_all(&self.folder)?;

        let path = self.file_for(keyword);
        let existing: HashSet<String> = self.load(keyword)?.into_iter().map(|p| p.tweet_id).collect();
        let collection_time = Utc::now().to_rfc3339();

        let mut seen = existing;
        let fresh: Vec<ArchivedPost> = posts
            .iter()
            .filter(|p| seen.insert(p.id.clone()))
            .map(|p| ArchivedPost::from_post(p, &collection_time))
            .collect();

        if fresh.is_empty() {
            info!("ℹ️ No new posts to archive for {}", keyword);
            return Ok(0);
        }

        append_rows(&path, &fresh)?;
        info!("📝 Added {} new posts to {}", fresh.len(), path.display());
        Ok(fresh.len())
    }
}

fn append_rows(path: &Path, rows: &[ArchivedPost]) -> Result<()> {
    let is_new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
    for row in rows {
        writer.serialize(row).map_err(storage_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn storage_error(err: csv::Error) -> AgentError {
    AgentError::StorageError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, text: &str) -> SocialPost {
        SocialPost {
            id: id.to_string(),
            created_at: "2024-05-01T12:00:00.000Z".to_string(),
            author_name: "trader".to_string(),
            author_id: "42".to_string(),
            text: text.to_string(),
            cleaned_text: text.to_string(),
            retweet_count: 1,
            like_count: 2,
            reply_count: 0,
            quote_count: 0,
            language: "en".to_string(),
        }
    }

    #[test]
    fn deduplicates_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let archive = PostArchive::new(dir.path());

        let written = archive
            .save_posts("solana", &[post("1", "gm"), post("2", "wagmi"), post("1", "gm")])
            .unwrap();
        assert_eq!(written, 2);

        let written = archive.save_posts("solana", &[post("2", "wagmi"), post("3", "ngmi")]).unwrap();
        assert_eq!(written, 1);

        let stored = archive.load("solana").unwrap();
        let ids: Vec<&str> = stored.iter().map(|p| p.tweet_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(archive.file_for("solana").ends_with("solana_tweets.csv"));
    }
}
