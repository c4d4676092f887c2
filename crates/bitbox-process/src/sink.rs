//! Per-process append-only byte log for combined stdout+stderr.
//!
//! Backed by a uniquely-named temp file. The child's stdout and stderr
//! file descriptors are both pointed at the same underlying file, so the
//! kernel interleaves the two streams into one byte log in the order the
//! child actually emitted them. Tail readers each hold a private offset
//! and a separate open file handle, so concurrent readers never contend
//! with each other or with the writer.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs::File as AsyncFile;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use bitbox_core::SupervisorError;

/// A fresh append-only sink backed by a uniquely-named temp file.
pub struct OutputSink {
    path: PathBuf,
    write_file: std::fs::File,
}

impl OutputSink {
    /// Create a new sink. `dir` overrides the directory the backing temp
    /// file is created in; `None` uses the OS default temp directory. The
    /// file is not unlinked here or on drop; the registry never removes
    /// process handles either, so there is no natural point at which this
    /// crate would reclaim it. Callers that want retention policy should
    /// track `path()` themselves.
    pub fn create(dir: Option<&Path>) -> Result<Self, SupervisorError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("bitbox-sink-");
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(SupervisorError::SinkCreateFailed)?;
        let (write_file, path) = named
            .keep()
            .map_err(|e| SupervisorError::SinkCreateFailed(e.error))?;
        Ok(Self { path, write_file })
    }

    /// Path to the backing temp file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A `Stdio` handle writing into this sink, suitable for both the
    /// child's stdout and stderr so the kernel merges them in order.
    pub fn writer_stdio(&self) -> Result<Stdio, SupervisorError> {
        let dup = self
            .write_file
            .try_clone()
            .map_err(SupervisorError::SinkCreateFailed)?;
        Ok(Stdio::from(dup))
    }

    /// Open a new tail reader positioned at offset 0.
    pub async fn open_tail(&self) -> Result<TailReader, SupervisorError> {
        TailReader::open(&self.path)
            .await
            .map_err(SupervisorError::SinkOpenFailed)
    }
}

/// A reader with a private offset into an [`OutputSink`]'s backing file.
///
/// Reads never block: a read past the currently-written length returns
/// `Ok(0)` immediately rather than waiting for more data, since this is a
/// plain file, not a pipe.
pub struct TailReader {
    file: AsyncFile,
    offset: u64,
}

impl TailReader {
    async fn open(path: &Path) -> std::io::Result<Self> {
        let file = AsyncFile::open(path).await?;
        Ok(Self { file, offset: 0 })
    }

    /// Read up to `buf.len()` bytes starting at this reader's offset,
    /// advancing the offset by the number of bytes read. Returns `0` when
    /// no new data is currently available.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.seek(SeekFrom::Start(self.offset)).await?;
        let n = self.file.read(buf).await?;
        self.offset += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn fresh_sink_has_no_data_for_a_tail_reader() {
        let sink = OutputSink::create(None).expect("sink creation succeeds");
        let mut tail = sink.open_tail().await.expect("tail opens");
        let mut buf = [0u8; 64];
        assert_eq!(tail.read_chunk(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tail_reader_sees_bytes_written_after_it_was_opened() {
        let sink = OutputSink::create(None).expect("sink creation succeeds");
        let mut tail = sink.open_tail().await.expect("tail opens");

        {
            let mut f = std::fs::OpenOptions::new()
                .write(true)
                .open(sink.path())
                .unwrap();
            f.write_all(b"hello").unwrap();
            f.flush().unwrap();
        }

        let mut buf = [0u8; 64];
        let n = tail.read_chunk(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn independent_tail_readers_each_track_their_own_offset() {
        let sink = OutputSink::create(None).expect("sink creation succeeds");
        {
            let mut f = std::fs::OpenOptions::new()
                .write(true)
                .open(sink.path())
                .unwrap();
            f.write_all(b"abc").unwrap();
        }

        let mut first = sink.open_tail().await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(first.read_chunk(&mut buf).await.unwrap(), 1);
        assert_eq!(&buf[..1], b"a");

        let mut second = sink.open_tail().await.unwrap();
        let mut buf2 = [0u8; 8];
        let n = second.read_chunk(&mut buf2).await.unwrap();
        assert_eq!(&buf2[..n], b"abc");
    }
}
