use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use vigil_core::format::render_json_line;
use vigil_core::{Level, LogRecord};

use super::{Sink, SinkError};

/// Appends one JSON object per line to a local file.
pub struct FileSink {
    name: String,
    path: PathBuf,
    min_level: Level,
    file: Mutex<File>,
}

impl FileSink {
    /// Open `path` for appending, creating missing parent directories.
    pub async fn open(path: impl AsRef<Path>, min_level: Level) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            name: format!("file:{}", path.display()),
            path,
            min_level,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    async fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = render_json_line(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}
