//! DCA file item
//!
//! Streams opus packets from a DCA container on disk. Two layouts are
//! accepted:
//! - DCA0: a bare sequence of `i16 LE length` + `length` bytes of opus
//! - DCA1: `b"DCA1"`, `i32 LE` metadata length, JSON metadata, then DCA0 frames
//!
//! The file is opened lazily on the first pull after creation or reset, so
//! a queued item holds no file descriptor until it plays.

use super::{Frame, PlayableItem};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

const DCA1_MAGIC: &[u8; 4] = b"DCA1";

/// Item reading length-prefixed opus frames from a file
#[derive(Debug)]
pub struct DcaFileItem {
    title: String,
    path: PathBuf,
    reader: Mutex<Option<BufReader<File>>>,
}

impl DcaFileItem {
    /// Create an item for `path`, checking that the file exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("Not a file: {}", path.display()),
            )));
        }

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            title,
            path,
            reader: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_reader(&self) -> Result<BufReader<File>> {
        let mut reader = BufReader::new(File::open(&self.path).await?);

        let mut magic = [0u8; 4];
        match reader.read_exact(&mut magic).await {
            Ok(_) if &magic == DCA1_MAGIC => {
                let metadata_len = reader.read_i32_le().await?;
                if metadata_len < 0 {
                    return Err(Error::FramePull(format!(
                        "{}: negative DCA1 metadata length",
                        self.path.display()
                    )));
                }
                // Skip the JSON metadata without buffering it
                let metadata_len = u64::from(metadata_len.unsigned_abs());
                let skipped =
                    tokio::io::copy(&mut (&mut reader).take(metadata_len), &mut tokio::io::sink())
                        .await?;
                if skipped < metadata_len {
                    return Err(Error::FramePull(format!(
                        "{}: truncated DCA1 metadata",
                        self.path.display()
                    )));
                }
                debug!("Skipped {} bytes of DCA1 metadata in {}", metadata_len, self.path.display());
            }
            Ok(_) => {
                reader.seek(SeekFrom::Start(0)).await?;
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                reader.seek(SeekFrom::Start(0)).await?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(reader)
    }

    async fn read_frame(&self, reader: &mut BufReader<File>) -> Result<Option<Frame>> {
        let len = match reader.read_i16_le().await {
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if len <= 0 {
            return Err(Error::FramePull(format!(
                "{}: invalid frame length {}",
                self.path.display(),
                len
            )));
        }

        let mut frame = vec![0u8; len as usize];
        match reader.read_exact(&mut frame).await {
            Ok(_) => Ok(Some(frame)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::FramePull(format!(
                "{}: truncated frame",
                self.path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PlayableItem for DcaFileItem {
    fn title(&self) -> &str {
        &self.title
    }

    async fn next_frame(&self) -> Result<Option<Frame>> {
        let mut guard = self.reader.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_reader().await?);
        }
        match guard.as_mut() {
            Some(reader) => self.read_frame(reader).await,
            None => Ok(None),
        }
    }

    async fn reset_playback(&self) {
        *self.reader.lock().await = None;
    }
}
