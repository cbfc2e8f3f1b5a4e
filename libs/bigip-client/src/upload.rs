//! File upload to the appliance
//!
//! A single range-annotated transfer: the file is read fully into memory
//! and sent in one request with a `Content-Range` header spanning the whole
//! file. Practical file size is bounded by memory; there is no streaming and
//! no dedup of concurrent uploads of the same filename.

use std::path::Path;

use tracing::{debug, info};

use crate::client::DeviceClient;
use crate::errors::BigipError;

/// Directory the device stores uploaded files under.
const REMOTE_DOWNLOAD_DIR: &str = "/var/config/rest/downloads";

/// Content-Range header for a whole-file transfer of `size` bytes.
///
/// Invariant: `0-{size-1}/{size}`; callers must reject `size == 0` first.
pub(crate) fn content_range(size: usize) -> String {
    format!("0-{}/{}", size - 1, size)
}

impl DeviceClient {
    /// Upload a local file, returning the server-side path reference.
    ///
    /// Fails with [`BigipError::EmptyContent`] before any network call when
    /// the file is empty.
    pub async fn upload_file(&self, local_path: &Path) -> Result<String, BigipError> {
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BigipError::Config(format!("invalid upload path: {}", local_path.display())))?
            .to_string();

        let contents = tokio::fs::read(local_path).await?;
        if contents.is_empty() {
            return Err(BigipError::EmptyContent(format!(
                "refusing to upload empty file {}",
                local_path.display()
            )));
        }

        let range = content_range(contents.len());
        let url = self.url(&format!("/mgmt/shared/file-transfer/uploads/{}", filename))?;
        debug!("POST {} ({} bytes, range {})", url, contents.len(), range);

        let response = self
            .http()
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .header("Content-Range", range)
            .header("X-F5-Auth-Token", self.session().token())
            .body(contents)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BigipError::device(status, body));
        }

        let remote = format!("{}/{}", REMOTE_DOWNLOAD_DIR, filename);
        info!("Uploaded {} to {}", local_path.display(), remote);
        Ok(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_spans_whole_file() {
        assert_eq!(content_range(1), "0-0/1");
        assert_eq!(content_range(1024), "0-1023/1024");
    }
}
