use crate::error::{map_json_error, Result, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snip_core::{BatchRequest, BatchResponse, ShortToken, Storage, UserUrl};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// The URL pair stored on each line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredUrl {
    short_url: String,
    #[serde(default)]
    original_url: String,
}

/// One line of the log.
///
/// A tombstone line has `Deleted: true` and marks the owner's claim on the
/// token as deleted; the field is omitted on ordinary records so logs written
/// before soft-delete existed still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FileRecord {
    #[serde(rename = "CookieValue")]
    owner: String,
    #[serde(rename = "URLs")]
    url: StoredUrl,
    #[serde(rename = "Deleted", default, skip_serializing_if = "std::ops::Not::not")]
    deleted: bool,
}

impl FileRecord {
    fn live(owner: &str, token: &ShortToken, original_url: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            url: StoredUrl {
                short_url: token.as_str().to_owned(),
                original_url: original_url.to_owned(),
            },
            deleted: false,
        }
    }

    fn tombstone(owner: &str, token: &ShortToken) -> Self {
        Self {
            owner: owner.to_owned(),
            url: StoredUrl {
                short_url: token.as_str().to_owned(),
                original_url: String::new(),
            },
            deleted: true,
        }
    }

    fn append_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        serde_json::to_writer(&mut *buf, self).map_err(map_json_error)?;
        buf.push(b'\n');
        Ok(())
    }
}

/// Append-only newline-delimited JSON storage.
///
/// Every call opens and closes its own handle. Reads replay the log from the
/// start: a record line makes `(owner, token)` live, a tombstone line marks it
/// deleted. Lines that fail to parse are logged and skipped.
///
/// Writers inside this process are serialized, so lines never interleave and a
/// failed batch can be rolled back by truncating the file to its previous
/// length. Other processes appending to the same file are not coordinated.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    base_url: String,
    writer: Mutex<()>,
}

impl FileStorage {
    /// Opens the log at `path`, creating it and its parent directory if needed.
    pub async fn open(path: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        debug!(path = %path.display(), "opened file storage");
        Ok(Self {
            path,
            base_url: base_url.into(),
            writer: Mutex::new(()),
        })
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `buf` as one unit. On failure the file is truncated back to its
    /// length before the append.
    async fn append(&self, buf: &[u8]) -> Result<()> {
        let _guard = self.writer.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let len_before = file.metadata().await?.len();

        self.write_or_rollback(&mut file, len_before, buf).await
    }

    /// Writes `buf` through `writer`. Callers must hold the writer lock.
    async fn write_or_rollback<W>(&self, writer: &mut W, len_before: u64, buf: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let written = async {
            writer.write_all(buf).await?;
            writer.flush().await
        }
        .await;

        if let Err(err) = written {
            warn!(path = %self.path.display(), error = %err, "append failed, rolling back");
            let truncated = async {
                OpenOptions::new()
                    .write(true)
                    .open(&self.path)
                    .await?
                    .set_len(len_before)
                    .await
            }
            .await;
            if let Err(rollback) = truncated {
                warn!(path = %self.path.display(), error = %rollback, "rollback failed");
            }
            return Err(err.into());
        }

        Ok(())
    }

    /// Calls `visit` for every well-formed line, in file order.
    async fn scan(&self, mut visit: impl FnMut(FileRecord) + Send) -> Result<()> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            line_no += 1;

            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_slice::<FileRecord>(trimmed) {
                Ok(record) => visit(record),
                Err(err) => {
                    warn!(path = %self.path.display(), line = line_no, error = %err, "skipping malformed line");
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn write(&self, original_url: &str, owner: &str) -> Result<String> {
        if original_url.is_empty() {
            return Err(StorageError::EmptyInput);
        }

        let token = ShortToken::from_url(original_url);
        let mut buf = Vec::new();
        FileRecord::live(owner, &token, original_url).append_to(&mut buf)?;
        self.append(&buf).await?;

        trace!(token = %token, owner, "appended url to file");
        Ok(token.to_url(&self.base_url))
    }

    async fn read(&self, token: &ShortToken) -> Result<String> {
        let mut original_url: Option<String> = None;
        let mut owners: HashMap<String, bool> = HashMap::new();

        self.scan(|record| {
            if record.url.short_url != token.as_str() {
                return;
            }
            if record.deleted {
                if let Some(live) = owners.get_mut(&record.owner) {
                    *live = false;
                }
            } else {
                original_url.get_or_insert(record.url.original_url);
                owners.insert(record.owner, true);
            }
        })
        .await?;

        match original_url {
            None => Err(StorageError::NotFound(token.to_string())),
            Some(_) if !owners.values().any(|live| *live) => {
                Err(StorageError::Gone(token.to_string()))
            }
            Some(url) => Ok(url),
        }
    }

    async fn read_all(&self, owner: &str) -> Result<Vec<UserUrl>> {
        // token -> (original url, live), kept in first-seen order
        let mut urls: Vec<(String, String, bool)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        self.scan(|record| {
            if record.owner != owner {
                return;
            }
            let seen = index.get(&record.url.short_url).copied();
            match (seen, record.deleted) {
                (Some(i), deleted) => urls[i].2 = !deleted,
                (None, true) => {}
                (None, false) => {
                    index.insert(record.url.short_url.clone(), urls.len());
                    urls.push((record.url.short_url, record.url.original_url, true));
                }
            }
        })
        .await?;

        let urls: Vec<UserUrl> = urls
            .into_iter()
            .filter(|(_, _, live)| *live)
            .map(|(token, original_url, _)| UserUrl {
                short_url: ShortToken::new_unchecked(token).to_url(&self.base_url),
                original_url,
            })
            .collect();

        if urls.is_empty() {
            return Err(StorageError::NotFound(format!("no urls for owner {owner}")));
        }

        Ok(urls)
    }

    async fn batch(&self, entries: Vec<BatchRequest>, owner: &str) -> Result<Vec<BatchResponse>> {
        if entries.is_empty() || entries.iter().any(|e| e.original_url.is_empty()) {
            return Err(StorageError::EmptyInput);
        }

        let mut buf = Vec::new();
        let mut responses = Vec::with_capacity(entries.len());

        for entry in entries {
            let token = ShortToken::from_url(&entry.original_url);
            FileRecord::live(owner, &token, &entry.original_url).append_to(&mut buf)?;
            responses.push(BatchResponse {
                correlation_id: entry.correlation_id,
                short_url: token.to_url(&self.base_url),
            });
        }

        self.append(&buf).await?;

        debug!(owner, count = responses.len(), "appended batch to file");
        Ok(responses)
    }

    async fn delete(&self, owner: &str, tokens: &[ShortToken]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for token in tokens {
            FileRecord::tombstone(owner, token).append_to(&mut buf)?;
        }
        self.append(&buf).await?;

        debug!(owner, count = tokens.len(), "appended tombstones to file");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map(drop)
            .map_err(|err| StorageError::Unavailable(format!("{}: {err}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{ready, Context, Poll};
    use tempfile::TempDir;

    const BASE_URL: &str = "http://localhost:8080";

    async fn storage() -> (TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("urls.json"), BASE_URL)
            .await
            .unwrap();
        (dir, storage)
    }

    fn token(url: &str) -> ShortToken {
        ShortToken::from_url(url)
    }

    fn batch_entry(id: &str, url: &str) -> BatchRequest {
        BatchRequest {
            correlation_id: id.to_string(),
            original_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn write_and_read() {
        let (_dir, storage) = storage().await;

        let short_url = storage
            .write("http://example.com/a", "cookie1")
            .await
            .unwrap();
        assert_eq!(short_url, token("http://example.com/a").to_url(BASE_URL));

        let original = storage.read(&token("http://example.com/a")).await.unwrap();
        assert_eq!(original, "http://example.com/a");
    }

    #[tokio::test]
    async fn write_uses_the_documented_line_format() {
        let (_dir, storage) = storage().await;
        storage.write("http://a", "cookie1").await.unwrap();

        let content = tokio::fs::read_to_string(storage.path()).await.unwrap();
        assert_eq!(
            content,
            "{\"CookieValue\":\"cookie1\",\"URLs\":{\"short_url\":\"687474703a2f2f61\",\"original_url\":\"http://a\"}}\n"
        );
    }

    #[tokio::test]
    async fn write_empty_url_fails() {
        let (_dir, storage) = storage().await;
        let err = storage.write("", "cookie1").await.unwrap_err();
        assert_eq!(err, StorageError::EmptyInput);
    }

    #[tokio::test]
    async fn read_nonexistent() {
        let (_dir, storage) = storage().await;
        let err = storage.read(&token("http://nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("urls.json");

        let storage = FileStorage::open(&path, BASE_URL).await.unwrap();

        assert!(path.exists());
        assert!(matches!(
            storage.read_all("cookie1").await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");

        {
            let storage = FileStorage::open(&path, BASE_URL).await.unwrap();
            storage.write("http://a", "cookie1").await.unwrap();
        }

        let storage = FileStorage::open(&path, BASE_URL).await.unwrap();
        assert_eq!(storage.read(&token("http://a")).await.unwrap(), "http://a");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let (_dir, storage) = storage().await;
        storage.write("http://a", "cookie1").await.unwrap();

        let mut content = tokio::fs::read(storage.path()).await.unwrap();
        content.extend_from_slice(b"{not json\n");
        content.extend_from_slice(&[0xff, 0xfe, b'\n']);
        content.extend_from_slice(b"\n");
        tokio::fs::write(storage.path(), content).await.unwrap();

        storage.write("http://b", "cookie1").await.unwrap();

        assert_eq!(storage.read(&token("http://b")).await.unwrap(), "http://b");
        assert_eq!(storage.read_all("cookie1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn read_all_filters_by_owner() {
        let (_dir, storage) = storage().await;
        for url in ["http://a", "http://b", "http://c"] {
            storage.write(url, "cookie1").await.unwrap();
        }
        storage.write("http://d", "cookie2").await.unwrap();

        let urls = storage.read_all("cookie1").await.unwrap();
        let originals: Vec<_> = urls.iter().map(|u| u.original_url.as_str()).collect();
        assert_eq!(originals, ["http://a", "http://b", "http://c"]);
        assert_eq!(urls[1].short_url, token("http://b").to_url(BASE_URL));
    }

    #[tokio::test]
    async fn repeated_write_is_listed_once() {
        let (_dir, storage) = storage().await;
        storage.write("http://a", "cookie1").await.unwrap();
        storage.write("http://a", "cookie1").await.unwrap();

        assert_eq!(storage.read_all("cookie1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let (_dir, storage) = storage().await;

        let responses = storage
            .batch(
                vec![batch_entry("id1", "http://a"), batch_entry("id2", "http://b")],
                "cookie1",
            )
            .await
            .unwrap();

        let ids: Vec<_> = responses.iter().map(|r| r.correlation_id.as_str()).collect();
        assert_eq!(ids, ["id1", "id2"]);
        assert_eq!(responses[0].short_url, token("http://a").to_url(BASE_URL));
        assert_eq!(responses[1].short_url, token("http://b").to_url(BASE_URL));
        assert_eq!(storage.read(&token("http://b")).await.unwrap(), "http://b");
    }

    #[tokio::test]
    async fn batch_with_empty_entry_writes_nothing() {
        let (_dir, storage) = storage().await;

        let err = storage
            .batch(
                vec![batch_entry("id1", "http://a"), batch_entry("id2", "")],
                "cookie1",
            )
            .await
            .unwrap_err();

        assert_eq!(err, StorageError::EmptyInput);
        let content = tokio::fs::read(storage.path()).await.unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_fails() {
        let (_dir, storage) = storage().await;
        let err = storage.batch(vec![], "cookie1").await.unwrap_err();
        assert_eq!(err, StorageError::EmptyInput);
    }

    #[tokio::test]
    async fn delete_marks_gone() {
        let (_dir, storage) = storage().await;
        storage.write("http://a", "cookie1").await.unwrap();
        storage.write("http://b", "cookie1").await.unwrap();

        storage.delete("cookie1", &[token("http://a")]).await.unwrap();

        let err = storage.read(&token("http://a")).await.unwrap_err();
        assert!(matches!(err, StorageError::Gone(_)));

        let urls = storage.read_all("cookie1").await.unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].original_url, "http://b");
    }

    #[tokio::test]
    async fn delete_skips_tokens_of_other_owners() {
        let (_dir, storage) = storage().await;
        storage.write("http://a", "cookie1").await.unwrap();

        storage.delete("cookie2", &[token("http://a")]).await.unwrap();

        assert_eq!(storage.read(&token("http://a")).await.unwrap(), "http://a");
        assert_eq!(storage.read_all("cookie1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tombstone_before_write_has_no_effect() {
        let (_dir, storage) = storage().await;

        storage.delete("cookie1", &[token("http://a")]).await.unwrap();
        storage.write("http://a", "cookie1").await.unwrap();

        assert_eq!(storage.read(&token("http://a")).await.unwrap(), "http://a");
    }

    #[tokio::test]
    async fn write_after_delete_revives() {
        let (_dir, storage) = storage().await;
        storage.write("http://a", "cookie1").await.unwrap();
        storage.delete("cookie1", &[token("http://a")]).await.unwrap();
        storage.write("http://a", "cookie1").await.unwrap();

        assert_eq!(storage.read(&token("http://a")).await.unwrap(), "http://a");
        assert_eq!(storage.read_all("cookie1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writes_produce_whole_lines() {
        let (_dir, storage) = storage().await;
        let storage = Arc::new(storage);
        let mut handles = vec![];

        for i in 0..20u32 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage
                    .write(&format!("https://example{i}.com"), "cookie1")
                    .await
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let content = tokio::fs::read_to_string(storage.path()).await.unwrap();
        for line in content.lines() {
            serde_json::from_str::<FileRecord>(line).unwrap();
        }
        assert_eq!(storage.read_all("cookie1").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn health_check_requires_writable_log() {
        let (dir, storage) = storage().await;
        storage.health_check().await.unwrap();

        drop(dir);
        let err = storage.health_check().await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    /// Passes `remaining` bytes through to the file, then fails.
    struct FailAfter {
        inner: File,
        remaining: usize,
    }

    impl AsyncWrite for FailAfter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.remaining == 0 {
                // Land the partial bytes before reporting the failure.
                ready!(Pin::new(&mut self.inner).poll_flush(cx))?;
                return Poll::Ready(Err(std::io::Error::other("no space left on device")));
            }

            let n = buf.len().min(self.remaining);
            let written = ready!(Pin::new(&mut self.inner).poll_write(cx, &buf[..n]))?;
            self.remaining -= written;
            Poll::Ready(Ok(written))
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn failed_append_truncates_partial_batch() {
        let (_dir, storage) = storage().await;
        storage.write("http://before", "cookie1").await.unwrap();
        let len_before = tokio::fs::metadata(storage.path()).await.unwrap().len();

        let mut buf = Vec::new();
        for url in ["http://a", "http://b", "http://c"] {
            FileRecord::live("cookie1", &token(url), url)
                .append_to(&mut buf)
                .unwrap();
        }
        let inner = OpenOptions::new()
            .append(true)
            .open(storage.path())
            .await
            .unwrap();
        let mut writer = FailAfter {
            inner,
            remaining: buf.len() / 2,
        };

        let err = storage
            .write_or_rollback(&mut writer, len_before, &buf)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Internal(_)));

        let len_after = tokio::fs::metadata(storage.path()).await.unwrap().len();
        assert_eq!(len_after, len_before);

        let urls = storage.read_all("cookie1").await.unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].original_url, "http://before");
        assert!(matches!(
            storage.read(&token("http://a")).await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }
}
