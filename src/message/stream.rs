//! Body streams.
//!
//! A request or response body is either a single [`Stream`] over memory or
//! a file, or an [`AppendStream`] that reads a sequence of streams as one
//! logical body (used for multipart assembly).

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::base::error::ClientError;

enum Inner {
    Memory(Cursor<Vec<u8>>),
    File(File),
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Inner::Memory(c) => f
                .debug_struct("Memory")
                .field("len", &c.get_ref().len())
                .finish(),
            Inner::File(_) => f.debug_struct("File").finish_non_exhaustive(),
        }
    }
}

/// A readable, usually seekable byte stream.
#[derive(Debug)]
pub struct Stream {
    inner: Inner,
}

impl Stream {
    /// An empty in-memory stream positioned at the start.
    pub fn empty() -> Self {
        Self {
            inner: Inner::Memory(Cursor::new(Vec::new())),
        }
    }

    /// Wrap a byte buffer; the cursor starts at offset zero.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Inner::Memory(Cursor::new(data.into())),
        }
    }

    /// Open a file for reading.
    pub fn open(path: &str) -> Result<Self, ClientError> {
        let file = File::open(path).map_err(|e| ClientError::io("open stream file", &e))?;
        Ok(Self {
            inner: Inner::File(file),
        })
    }

    pub fn from_file(file: File) -> Self {
        Self {
            inner: Inner::File(file),
        }
    }

    /// Read up to `n` bytes from the current position.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, ClientError> {
        let mut buf = vec![0u8; n];
        let got = match &mut self.inner {
            Inner::Memory(c) => c
                .read(&mut buf)
                .map_err(|e| ClientError::io("read stream", &e))?,
            Inner::File(f) => f
                .read(&mut buf)
                .map_err(|e| ClientError::io("read stream", &e))?,
        };
        buf.truncate(got);
        Ok(buf)
    }

    /// Append bytes at the current position.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, ClientError> {
        let written = match &mut self.inner {
            Inner::Memory(c) => c
                .write(data)
                .map_err(|e| ClientError::io("write stream", &e))?,
            Inner::File(f) => f
                .write(data)
                .map_err(|e| ClientError::io("write stream", &e))?,
        };
        Ok(written)
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, ClientError> {
        match &mut self.inner {
            Inner::Memory(c) => c.seek(pos),
            Inner::File(f) => f.seek(pos),
        }
        .map_err(|e| ClientError::io("seek stream", &e))
    }

    pub fn rewind(&mut self) -> Result<(), ClientError> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Total size in bytes, independent of the current position.
    pub fn size(&mut self) -> Result<u64, ClientError> {
        match &mut self.inner {
            Inner::Memory(c) => Ok(c.get_ref().len() as u64),
            Inner::File(f) => {
                let meta = f
                    .metadata()
                    .map_err(|e| ClientError::io("stat stream file", &e))?;
                Ok(meta.len())
            }
        }
    }

    pub fn is_seekable(&self) -> bool {
        true
    }

    /// Rewind and read the whole stream into memory.
    pub fn contents(&mut self) -> Result<Vec<u8>, ClientError> {
        self.rewind()?;
        let mut out = Vec::new();
        match &mut self.inner {
            Inner::Memory(c) => c
                .read_to_end(&mut out)
                .map_err(|e| ClientError::io("read stream", &e))?,
            Inner::File(f) => f
                .read_to_end(&mut out)
                .map_err(|e| ClientError::io("read stream", &e))?,
        };
        Ok(out)
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::empty()
    }
}

/// A read-only concatenation of streams, consumed in order.
#[derive(Debug, Default)]
pub struct AppendStream {
    parts: Vec<Stream>,
    current: usize,
}

impl AppendStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stream to the end of the sequence.
    pub fn push(&mut self, stream: Stream) {
        self.parts.push(stream);
    }

    pub fn is_seekable(&self) -> bool {
        self.parts.iter().all(|p| p.is_seekable())
    }

    /// Read up to `n` bytes; advances to the next part only once the
    /// current one is exhausted.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, ClientError> {
        while self.current < self.parts.len() {
            let chunk = self.parts[self.current].read(n)?;
            if !chunk.is_empty() {
                return Ok(chunk);
            }
            self.current += 1;
        }
        Ok(Vec::new())
    }

    pub fn rewind(&mut self) -> Result<(), ClientError> {
        for part in &mut self.parts {
            part.rewind()?;
        }
        self.current = 0;
        Ok(())
    }

    /// Seek to an absolute offset by rewinding and discarding. Only
    /// forward positioning from the start is supported.
    pub fn seek_start(&mut self, offset: u64) -> Result<(), ClientError> {
        self.rewind()?;
        let mut remaining = offset;
        while remaining > 0 {
            let step = remaining.min(8192) as usize;
            let chunk = self.read(step)?;
            if chunk.is_empty() {
                break;
            }
            remaining -= chunk.len() as u64;
        }
        Ok(())
    }

    pub fn size(&mut self) -> Result<u64, ClientError> {
        let mut total = 0u64;
        for part in &mut self.parts {
            total += part.size()?;
        }
        Ok(total)
    }

    /// Rewind and read the whole sequence into memory.
    pub fn contents(&mut self) -> Result<Vec<u8>, ClientError> {
        self.rewind()?;
        let mut out = Vec::new();
        loop {
            let chunk = self.read(8192)?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// A message body.
#[derive(Debug)]
pub enum Body {
    Stream(Stream),
    Append(AppendStream),
}

impl Body {
    pub fn empty() -> Self {
        Body::Stream(Stream::empty())
    }

    pub fn is_seekable(&self) -> bool {
        match self {
            Body::Stream(s) => s.is_seekable(),
            Body::Append(a) => a.is_seekable(),
        }
    }

    pub fn size(&mut self) -> Result<u64, ClientError> {
        match self {
            Body::Stream(s) => s.size(),
            Body::Append(a) => a.size(),
        }
    }

    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, ClientError> {
        match self {
            Body::Stream(s) => s.read(n),
            Body::Append(a) => a.read(n),
        }
    }

    pub fn rewind(&mut self) -> Result<(), ClientError> {
        match self {
            Body::Stream(s) => s.rewind(),
            Body::Append(a) => a.rewind(),
        }
    }

    pub fn contents(&mut self) -> Result<Vec<u8>, ClientError> {
        match self {
            Body::Stream(s) => s.contents(),
            Body::Append(a) => a.contents(),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl From<Stream> for Body {
    fn from(s: Stream) -> Self {
        Body::Stream(s)
    }
}

impl From<AppendStream> for Body {
    fn from(a: AppendStream) -> Self {
        Body::Append(a)
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::Stream(Stream::from_bytes(data))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Stream(Stream::from_bytes(s.as_bytes().to_vec()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Stream(Stream::from_bytes(s.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_memory_stream_read_write() {
        let mut s = Stream::empty();
        s.write(b"hello world").unwrap();
        s.rewind().unwrap();
        assert_eq!(s.read(5).unwrap(), b"hello");
        assert_eq!(s.read(64).unwrap(), b" world");
        assert_eq!(s.read(64).unwrap(), b"");
        assert_eq!(s.size().unwrap(), 11);
    }

    #[test]
    fn test_contents_rewinds_first() {
        let mut s = Stream::from_bytes(b"abcdef".to_vec());
        s.read(3).unwrap();
        assert_eq!(s.contents().unwrap(), b"abcdef");
    }

    #[test]
    fn test_file_stream() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"file data").unwrap();
        tmp.flush().unwrap();
        let mut s = Stream::open(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(s.size().unwrap(), 9);
        assert_eq!(s.contents().unwrap(), b"file data");
    }

    #[test]
    fn test_open_missing_file_is_transport_error() {
        let err = Stream::open("/nonexistent/easyreq-test").unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }

    #[test]
    fn test_append_stream_crosses_parts() {
        let mut a = AppendStream::new();
        a.push(Stream::from_bytes(b"one".to_vec()));
        a.push(Stream::from_bytes(b"two".to_vec()));
        a.push(Stream::from_bytes(b"three".to_vec()));

        assert_eq!(a.size().unwrap(), 11);
        // A read never spans a part boundary.
        assert_eq!(a.read(64).unwrap(), b"one");
        assert_eq!(a.read(2).unwrap(), b"tw");
        assert_eq!(a.read(64).unwrap(), b"o");
        assert_eq!(a.contents().unwrap(), b"onetwothree");
    }

    #[test]
    fn test_append_stream_seek_start() {
        let mut a = AppendStream::new();
        a.push(Stream::from_bytes(b"abc".to_vec()));
        a.push(Stream::from_bytes(b"def".to_vec()));
        a.seek_start(4).unwrap();
        assert_eq!(a.contents_from_here(), b"ef");
    }

    impl AppendStream {
        fn contents_from_here(&mut self) -> Vec<u8> {
            let mut out = Vec::new();
            loop {
                let chunk = self.read(8).unwrap();
                if chunk.is_empty() {
                    break;
                }
                out.extend_from_slice(&chunk);
            }
            out
        }
    }
}
