//! Markdown article storage.
//!
//! Articles normally go into a central archive as `{seq:03}-{slug}.md`. In
//! "alongside" mode they travel with the exported video instead, inside a
//! `{video}_meta` folder next to it.

use chrono::NaiveDate;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::utils::{filename, fs};
use crate::{Error, Result};

const LOCK_FILE: &str = ".lock";

/// A generated article ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub date: NaiveDate,
    pub original_video_path: PathBuf,
    pub title: String,
    pub body: String,
}

impl Article {
    /// Front matter followed by the body.
    pub fn to_markdown(&self) -> String {
        // JSON string literals are valid YAML scalars and escape everything we need.
        let quote = |s: &str| serde_json::Value::String(s.to_string()).to_string();
        format!(
            "---\ndate: {}\noriginalVideoPath: {}\ntitle: {}\n---\n\n{}\n",
            self.date.format("%Y-%m-%d"),
            quote(&self.original_video_path.to_string_lossy()),
            quote(&self.title),
            self.body.trim_end()
        )
    }
}

/// Remove a leading `---` front matter block, if present.
pub fn strip_front_matter(markdown: &str) -> &str {
    let Some(rest) = markdown.strip_prefix("---\n") else {
        return markdown;
    };
    match rest.find("\n---\n") {
        Some(end) => rest[end + "\n---\n".len()..].trim_start_matches('\n'),
        None => markdown,
    }
}

/// Central archive of numbered Markdown articles.
#[derive(Debug, Clone)]
pub struct ArticleStorage {
    dir: PathBuf,
}

impl ArticleStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Article file names, sorted ascending. A missing directory has none.
    async fn article_names(&self) -> Result<Vec<String>> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || article_names_in(&dir))
            .await
            .map_err(|e| Error::Other(format!("Article listing task failed: {e}")))?
    }

    /// Bodies of the `n` most recent articles, newest first.
    pub async fn recent(&self, n: usize) -> Result<Vec<String>> {
        let names = self.article_names().await?;
        let mut bodies = Vec::with_capacity(n.min(names.len()));
        for name in names.iter().rev().take(n) {
            let path = self.dir.join(name);
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| fs::io_error("reading article", &path, e))?;
            bodies.push(strip_front_matter(&raw).to_string());
        }
        Ok(bodies)
    }

    /// Write `article` as the next numbered file and return its path.
    ///
    /// Numbering and the write happen under `<dir>/.lock`, so concurrent
    /// writers get distinct sequence numbers. An existing file is never
    /// overwritten.
    pub async fn store(&self, article: &Article) -> Result<PathBuf> {
        fs::ensure_dir_all_with_op("creating article directory", &self.dir).await?;
        let dir = self.dir.clone();
        let title = article.title.clone();
        let markdown = article.to_markdown();

        let (path, sequence) =
            tokio::task::spawn_blocking(move || store_locked(&dir, &title, &markdown))
                .await
                .map_err(|e| Error::Other(format!("Article store task failed: {e}")))??;
        info!(path = %path.display(), sequence, "Stored article");
        Ok(path)
    }
}

fn article_names_in(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(fs::io_error("listing articles", dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| fs::io_error("listing articles", dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".md") && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn store_locked(dir: &Path, title: &str, markdown: &str) -> Result<(PathBuf, usize)> {
    let lock_path = dir.join(LOCK_FILE);
    let lock = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| fs::io_error("opening article lock", &lock_path, e))?;
    lock.lock_exclusive()
        .map_err(|e| fs::io_error("locking articles", &lock_path, e))?;

    let result = write_next(dir, title, markdown);
    if let Err(e) = FileExt::unlock(&lock) {
        warn!(path = %lock_path.display(), error = %e, "Failed to release article lock");
    }
    result
}

fn write_next(dir: &Path, title: &str, markdown: &str) -> Result<(PathBuf, usize)> {
    let sequence = article_names_in(dir)?.len() + 1;
    let path = dir.join(filename::numbered_markdown_name(sequence, title));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| fs::io_error("creating article", &path, e))?;
    file.write_all(markdown.as_bytes())
        .map_err(|e| fs::io_error("writing article", &path, e))?;
    Ok((path, sequence))
}

/// Files to bundle into a meta folder next to an exported video.
#[derive(Debug, Clone)]
pub struct MetaBundle<'a> {
    pub export_path: &'a Path,
    pub video_name: &'a str,
    pub article: &'a Article,
    pub transcript_path: &'a Path,
    pub code_path: Option<&'a Path>,
}

/// Write `{video_name}_meta/` beside the exported video with the article,
/// the transcript and the code file. Returns the folder path.
pub async fn write_meta_folder(bundle: &MetaBundle<'_>) -> Result<PathBuf> {
    let parent = bundle
        .export_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let folder = parent.join(format!("{}_meta", bundle.video_name));
    fs::ensure_dir_all_with_op("creating meta folder", &folder).await?;

    let article_path = folder.join(format!("{}.md", bundle.video_name));
    tokio::fs::write(&article_path, bundle.article.to_markdown())
        .await
        .map_err(|e| fs::io_error("writing article", &article_path, e))?;

    for source in std::iter::once(bundle.transcript_path).chain(bundle.code_path) {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = folder.join(name);
        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| fs::io_error("copying into meta folder", source, e))?;
        debug!(from = %source.display(), to = %target.display(), "Copied into meta folder");
    }

    info!(folder = %folder.display(), "Wrote meta folder");
    Ok(folder)
}
