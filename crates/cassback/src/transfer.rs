//! Streaming compression and transfer of single files
//!
//! Each direction runs two stages joined by a bounded in-memory pipe:
//!
//! ```text
//! upload:   file → gzip encode ─┐ pipe ┌─→ multipart upload (part_size chunks)
//! download: object → gzip decode ┘      └─→ destination file (chunk_size writes)
//! ```
//!
//! The codec stage runs as its own task; the I/O stage runs on the caller's
//! task. The pipe blocks the codec stage when the I/O stage falls behind, so
//! memory stays at `pipe_capacity` plus in-flight parts whatever the file size.
//! The codec stage's outcome is checked before an upload is completed, so a
//! stream cut short by a read or compression error is never committed.

use crate::config::TransferConfig;
use crate::{BackupError, Result};
use async_compression::Level;
use async_compression::tokio::bufread::{GzipDecoder, GzipEncoder};
use diagnostics::*;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, WriteMultipart};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;

/// Outcome of one file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub key: String,
    /// Size of the source file
    pub bytes_read: u64,
    /// Compressed bytes sent
    pub bytes_uploaded: u64,
    pub parts: u64,
}

/// Outcome of one object restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub key: String,
    pub path: PathBuf,
    /// Decompressed bytes written
    pub bytes_written: u64,
}

/// Moves single files between the local filesystem and an object store.
#[derive(Clone)]
pub struct Transfer {
    store: Arc<dyn ObjectStore>,
    config: TransferConfig,
}

impl Transfer {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn level(&self) -> Level {
        Level::Precise(self.config.compression_level)
    }

    /// Compress `source` and upload it to `key` as a multipart upload.
    pub async fn upload_file(&self, source: &Path, key: &ObjectPath) -> Result<UploadSummary> {
        let item = source.display().to_string();
        let key_str = key.as_ref();

        let file = File::open(source)
            .await
            .map_err(|e| BackupError::transfer(&item, e))?;
        let bytes_read = file
            .metadata()
            .await
            .map_err(|e| BackupError::transfer(&item, e))?
            .len();

        log_debug!("Uploading {source} ({bytes} bytes) to {key}", source: item.as_str(), bytes: bytes_read, key: key_str);

        let upload = self
            .store
            .put_multipart(key)
            .await
            .map_err(|e| BackupError::store(key_str, e))?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.config.part_size);

        let (pipe_reader, pipe_writer) = tokio::io::duplex(self.config.pipe_capacity);
        let encoder = GzipEncoder::with_quality(BufReader::new(file), self.level());
        let producer = tokio::spawn(pump(encoder, pipe_writer));

        let drained = self.drain_to_upload(pipe_reader, &mut writer, key_str).await;
        let produced = join_stage(producer, &item).await;

        let outcome = match (drained, produced) {
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            (Ok(uploaded), Ok(_)) => Ok(uploaded),
        };

        match outcome {
            Ok(bytes_uploaded) => {
                _ = writer
                    .finish()
                    .await
                    .map_err(|e| BackupError::store(key_str, e))?;
                let parts = parts_sent(bytes_uploaded, self.config.part_size);
                log_info!("Uploaded {key} ({read} → {sent} bytes, {parts} parts)", key: key_str, read: bytes_read, sent: bytes_uploaded, parts: parts);
                Ok(UploadSummary {
                    key: key_str.to_string(),
                    bytes_read,
                    bytes_uploaded,
                    parts,
                })
            }
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    let abort_str = abort_err.to_string();
                    log_warn!("Failed to abort multipart upload of {key}: {reason}", key: key_str, reason: abort_str);
                }
                Err(e)
            }
        }
    }

    /// Read compressed bytes off the pipe into the multipart writer.
    ///
    /// Takes the pipe by value so the codec stage sees a closed pipe as soon
    /// as this returns, even on error.
    async fn drain_to_upload(
        &self,
        mut pipe: DuplexStream,
        writer: &mut WriteMultipart,
        key: &str,
    ) -> Result<u64> {
        let limit = self.config.max_upload_bytes();
        let mut buffer = vec![0u8; self.config.chunk_size];
        let mut total = 0u64;

        loop {
            let n = pipe
                .read(&mut buffer)
                .await
                .map_err(|e| BackupError::transfer(key, e))?;
            if n == 0 {
                break;
            }
            total += n as u64;
            if total > limit {
                return Err(BackupError::PartLimitExceeded {
                    key: key.to_string(),
                    part_size: self.config.part_size,
                    max_parts: self.config.max_parts,
                });
            }
            writer
                .wait_for_capacity(self.config.max_in_flight_parts)
                .await
                .map_err(|e| BackupError::store(key, e))?;
            writer.write(&buffer[..n]);
        }
        Ok(total)
    }

    /// Download `key`, decompress it and write it to `dest`.
    ///
    /// Parent directories are created as needed and an existing file at
    /// `dest` is truncated.
    pub async fn download_object(&self, key: &ObjectPath, dest: &Path) -> Result<DownloadSummary> {
        let key_str = key.as_ref();
        let dest_str = dest.display().to_string();

        let result = self
            .store
            .get(key)
            .await
            .map_err(|e| BackupError::store(key_str, e))?;
        let body = StreamReader::new(result.into_stream().map_err(std::io::Error::other));

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackupError::transfer(&dest_str, e))?;
        }
        let file = File::create(dest)
            .await
            .map_err(|e| BackupError::transfer(&dest_str, e))?;

        log_debug!("Restoring {key} to {dest}", key: key_str, dest: dest_str.as_str());

        let (pipe_reader, pipe_writer) = tokio::io::duplex(self.config.pipe_capacity);
        let producer = tokio::spawn(pump(GzipDecoder::new(body), pipe_writer));

        let drained = self.drain_to_file(pipe_reader, file, &dest_str).await;
        let produced = join_stage(producer, key_str).await;

        let bytes_written = match (drained, produced) {
            (Err(e), _) | (Ok(_), Err(e)) => return Err(e),
            (Ok(written), Ok(_)) => written,
        };

        log_info!("Restored {key} ({bytes} bytes)", key: key_str, bytes: bytes_written);
        Ok(DownloadSummary {
            key: key_str.to_string(),
            path: dest.to_path_buf(),
            bytes_written,
        })
    }

    async fn drain_to_file(&self, mut pipe: DuplexStream, mut file: File, dest: &str) -> Result<u64> {
        let mut buffer = vec![0u8; self.config.chunk_size];
        let mut total = 0u64;

        loop {
            let n = pipe
                .read(&mut buffer)
                .await
                .map_err(|e| BackupError::transfer(dest, e))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])
                .await
                .map_err(|e| BackupError::transfer(dest, e))?;
            total += n as u64;
        }
        file.flush()
            .await
            .map_err(|e| BackupError::transfer(dest, e))?;
        Ok(total)
    }
}

/// Parts `WriteMultipart` sends for `bytes` written in total.
///
/// The writer cuts a part each time its buffer reaches exactly `part_size`
/// and `finish` flushes whatever remains as one last, shorter part, so the
/// count follows from the byte total alone.
fn parts_sent(bytes: u64, part_size: usize) -> u64 {
    bytes.div_ceil(part_size as u64)
}

/// Codec stage: copy `reader` into the pipe, then close it.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, mut pipe: DuplexStream) -> std::io::Result<u64> {
    let copied = tokio::io::copy(&mut reader, &mut pipe).await?;
    pipe.shutdown().await?;
    Ok(copied)
}

async fn join_stage(handle: JoinHandle<std::io::Result<u64>>, item: &str) -> Result<u64> {
    match handle.await {
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(BackupError::transfer(item, e)),
        Err(join_err) => Err(BackupError::transfer(item, std::io::Error::other(join_err))),
    }
}
