//! # Streaming SHA-256
//!
//! Hashes resource bytes through a fixed 64 KiB buffer. Memory stays bounded
//! by the buffer no matter how large the file is.

use ahub_core::{AhubError, ContentDigest, Filesystem, StreamingDigest};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read-buffer size for streaming digests.
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Digest everything a reader yields.
///
/// # Errors
///
/// Propagates the first read failure immediately.
pub async fn hash_reader<R>(mut reader: R) -> Result<ContentDigest, AhubError>
where
    R: AsyncRead + Unpin,
{
    let mut digest = StreamingDigest::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    Ok(digest.finalize())
}

/// Digest a working-tree file.
///
/// # Errors
///
/// [`AhubError::Io`] with `NotFound` when the file is absent.
pub async fn hash_path(fs: &dyn Filesystem, path: &str) -> Result<ContentDigest, AhubError> {
    let stream = fs.open_read(path).await?;
    hash_reader(stream).await
}
