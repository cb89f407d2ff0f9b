use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const DIR_PREFIX: &str = "analyze-";
const FALLBACK_NAME: &str = "video";
const OCTET_STREAM: &str = "application/octet-stream";

/// A request's video, written to its own temporary directory.
///
/// [`StagedVideo::remove`] deletes it; if the owner is dropped without calling
/// it (a cancelled request), the directory goes away with the [`TempDir`].
#[derive(Debug)]
pub struct StagedVideo {
    dir: TempDir,
    path: PathBuf,
    file_name: String,
    mime_type: String,
}

impl StagedVideo {
    /// Create a fresh directory under `root` and an empty file inside it.
    pub async fn create(
        root: &Path,
        file_name: String,
        mime_type: String,
    ) -> std::io::Result<(Self, tokio::fs::File)> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().join(&file_name);
        let file = tokio::fs::File::create(&path).await?;

        Ok((
            Self {
                dir,
                path,
                file_name,
                mime_type,
            },
            file,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Best-effort removal of the file and its directory. Errors are only logged.
    pub async fn remove(self) {
        if let Err(error) = tokio::fs::remove_file(&self.path).await {
            debug!(path = %self.path.display(), %error, "Failed to remove staged video");
        }
        let dir = self.dir.path().to_path_buf();
        if let Err(error) = self.dir.close() {
            debug!(path = %dir.display(), %error, "Failed to remove staging directory");
        }
    }
}

/// Reduce a client-supplied file name to a single safe path component.
pub fn sanitize_file_name(name: Option<&str>) -> String {
    name.and_then(|name| name.rsplit(|c: char| c == '/' || c == '\\').next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

/// MIME type to register the upload with: the declared one unless it is
/// missing or generic, otherwise a guess from the file extension.
pub fn mime_type_for(file_name: &str, declared: Option<&str>) -> String {
    match declared {
        Some(mime) if !mime.is_empty() && mime != OCTET_STREAM => mime.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}
