use crate::filters::AppliedFilters;
use crate::query;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

// --- File types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    /// Download URL, absolute or relative to the API host.
    pub file: String,
    pub original_filename: String,
    #[serde(default)]
    pub file_type: String,
    pub size: u64,
    pub uploaded_at: String,
}

/// The listing comes back as a bare array, or as a page when the server paginates.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileListResponse {
    Page { results: Vec<FileEntry> },
    Plain(Vec<FileEntry>),
}

impl FileListResponse {
    fn into_files(self) -> Vec<FileEntry> {
        match self {
            FileListResponse::Page { results } => results,
            FileListResponse::Plain(files) => files,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

// --- Storage summary ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSummary {
    pub total_files: u64,
    pub unique_files: u64,
    pub total_size: u64,
    pub unique_size: u64,
    pub savings: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Listing URL for an already-encoded query; no `?` when the query is empty.
    pub fn files_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("{}/files/", self.base_url)
        } else {
            format!("{}/files/?{}", self.base_url, query)
        }
    }

    /// Resolve a record's `file` field against the API host.
    pub fn resolve_file_url(&self, file: &str) -> anyhow::Result<reqwest::Url> {
        let base = reqwest::Url::parse(&format!("{}/", self.base_url))?;
        Ok(base.join(file)?)
    }

    /// Check response status; on error, read body for detail message.
    async fn ensure_ok(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, error_detail(&body))
        }
    }

    pub async fn list_files(&self, filters: &AppliedFilters) -> anyhow::Result<Vec<FileEntry>> {
        let url = self.files_url(&query::to_query_string(filters));
        tracing::debug!(%url, "listing files");
        let resp = self.client.get(&url).send().await?;
        let list: FileListResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(list.into_files())
    }

    pub async fn get_file(&self, id: &str) -> anyhow::Result<FileEntry> {
        let resp = self
            .client
            .get(format!("{}/files/{}/", self.base_url, id))
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn storage_summary(&self) -> anyhow::Result<StorageSummary> {
        let url = format!("{}/storage-summary/", self.base_url);
        tracing::debug!(%url, "fetching storage summary");
        let resp = self.client.get(&url).send().await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn upload_file(&self, path: &Path) -> anyhow::Result<FileEntry> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("Not a file: {}", path.display()))?;
        let data = tokio::fs::read(path).await?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(name.clone())
            .mime_str(mime.essence_str())?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{}/files/", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let entry: FileEntry = Self::ensure_ok(resp).await?.json().await?;
        tracing::info!(id = %entry.id, file = %name, "uploaded");
        Ok(entry)
    }

    pub async fn delete_file(&self, id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .delete(format!("{}/files/{}/", self.base_url, id))
            .send()
            .await?;
        Self::ensure_ok(resp).await?;
        tracing::info!(%id, "deleted");
        Ok(())
    }

    pub async fn download_file(&self, entry: &FileEntry) -> anyhow::Result<Vec<u8>> {
        let url = self.resolve_file_url(&entry.file)?;
        let resp = self.client.get(url).send().await?;
        Ok(Self::ensure_ok(resp).await?.bytes().await?.to_vec())
    }

    /// Download a record into `dest`. A directory destination keeps the original filename.
    pub async fn download_to(&self, entry: &FileEntry, dest: &Path) -> anyhow::Result<PathBuf> {
        let target = if dest.is_dir() {
            dest.join(safe_file_name(&entry.original_filename))
        } else {
            dest.to_path_buf()
        };
        let data = self.download_file(entry).await?;
        tokio::fs::write(&target, &data).await?;
        tracing::info!(id = %entry.id, path = %target.display(), bytes = data.len(), "downloaded");
        Ok(target)
    }
}

/// Prefer the server's `error`/`detail` message over the raw body.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(msg), .. }) | Ok(ErrorBody { detail: Some(msg), .. }) => msg,
        _ => body.to_string(),
    }
}

/// Strip any directory part a server-supplied filename might carry.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SortOrder;

    #[test]
    fn test_files_url() {
        let client = ApiClient::new("http://localhost:8000/api/");
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.files_url(""), "http://localhost:8000/api/files/");

        let filters = AppliedFilters::new("a", "", "10", "", SortOrder::Asc);
        assert_eq!(
            client.files_url(&query::to_query_string(&filters)),
            "http://localhost:8000/api/files/?search=a&min_size=10240&sort=asc"
        );
    }

    #[test]
    fn test_resolve_file_url() {
        let client = ApiClient::new(DEFAULT_API_URL);
        assert_eq!(
            client.resolve_file_url("http://cdn.example.com/media/a.pdf").unwrap().as_str(),
            "http://cdn.example.com/media/a.pdf"
        );
        assert_eq!(
            client.resolve_file_url("/media/uploads/a.pdf").unwrap().as_str(),
            "http://localhost:8000/media/uploads/a.pdf"
        );
    }

    #[test]
    fn test_parse_plain_listing() {
        let body = r#"[
            {"id": "0b6f1c1e-2f6a-4f43-9d1c-0c0f5e1b2a3d", "file": "/media/uploads/a.pdf",
             "original_filename": "a.pdf", "file_type": "application/pdf",
             "size": 2048, "uploaded_at": "2025-03-01T10:00:00Z"},
            {"id": 7, "file": "/media/uploads/b.txt", "original_filename": "b.txt",
             "file_type": "text/plain", "size": 12, "uploaded_at": "2025-03-02T10:00:00Z"}
        ]"#;
        let files = serde_json::from_str::<FileListResponse>(body).unwrap().into_files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].id, "0b6f1c1e-2f6a-4f43-9d1c-0c0f5e1b2a3d");
        assert_eq!(files[1].id, "7");
        assert_eq!(files[1].size, 12);
    }

    #[test]
    fn test_parse_paginated_listing() {
        let body = r#"{"count": 1, "next": null, "previous": null, "results": [
            {"id": "1", "file": "/media/c.png", "original_filename": "c.png",
             "file_type": "image/png", "size": 1, "uploaded_at": "2025-03-01T10:00:00Z"}
        ]}"#;
        let files = serde_json::from_str::<FileListResponse>(body).unwrap().into_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].original_filename, "c.png");
    }

    #[test]
    fn test_parse_storage_summary() {
        let body = r#"{"total_files": 4, "unique_files": 3, "total_size": 4096,
                       "unique_size": 3072, "savings": 1024}"#;
        let summary: StorageSummary = serde_json::from_str(body).unwrap();
        assert_eq!(summary.savings, 1024);
        assert_eq!(summary.unique_files, 3);
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(error_detail(r#"{"error": "No file provided"}"#), "No file provided");
        assert_eq!(error_detail(r#"{"detail": "Not found."}"#), "Not found.");
        assert_eq!(error_detail("<html>bad gateway</html>"), "<html>bad gateway</html>");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("report.pdf"), "report.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name(""), "download");
    }
}
