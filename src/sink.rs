//! Abstract character sinks the writer writes to.

use crate::error::Result;

/// A destination for encoded CSV text.
pub trait CharSink {
    fn write_str(&mut self, s: &str) -> Result<()>;

    fn write_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.write_str(c.encode_utf8(&mut buf))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl CharSink for String {
    fn write_str(&mut self, s: &str) -> Result<()> {
        String::push_str(self, s);
        Ok(())
    }
}

impl CharSink for Vec<u8> {
    fn write_str(&mut self, s: &str) -> Result<()> {
        self.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

/// A [`CharSink`] that encodes to UTF-8 and writes through a `std::io::Write`.
pub struct IoCharSink<W> {
    inner: W,
}

impl<W: std::io::Write> IoCharSink<W> {
    pub fn new(inner: W) -> IoCharSink<W> {
        IoCharSink { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: std::io::Write> CharSink for IoCharSink<W> {
    fn write_str(&mut self, s: &str) -> Result<()> {
        self.inner.write_all(s.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// The async twin of [`IoCharSink`], writing through a `futures::io::AsyncWrite`.
#[cfg(feature = "stream")]
pub struct AsyncIoCharSink<W> {
    inner: W,
}

#[cfg(feature = "stream")]
impl<W: futures::io::AsyncWrite + Unpin> AsyncIoCharSink<W> {
    pub fn new(inner: W) -> AsyncIoCharSink<W> {
        AsyncIoCharSink { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub async fn write_str(&mut self, s: &str) -> Result<()> {
        use futures::io::AsyncWriteExt;

        self.inner.write_all(s.as_bytes()).await?;
        Ok(())
    }

    pub async fn write_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.write_str(c.encode_utf8(&mut buf)).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        use futures::io::AsyncWriteExt;

        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_sink_appends() {
        let mut sink = String::new();
        sink.write_str("a,").unwrap();
        sink.write_char('b').unwrap();
        assert_eq!(sink, "a,b");
    }

    #[test]
    fn io_sink_writes_utf8_bytes() {
        let mut out = Vec::new();
        {
            let mut sink = IoCharSink::new(&mut out);
            sink.write_str("héllo").unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "héllo");
    }
}
