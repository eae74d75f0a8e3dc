use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

use crate::config::file::Stream;

/// 内存中的共享输出缓冲区，克隆后指向同一块数据
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以字符串形式取出当前内容（非 UTF-8 字节会被替换）
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 控制台类 handler 的输出目标
#[derive(Debug, Clone)]
pub enum ConsoleSink {
    Stderr,
    Stdout,
    Buffer(SharedBuffer),
}

impl ConsoleSink {
    /// 只有真正连接到终端的流才输出颜色，重定向到文件或管道时不输出
    pub fn supports_ansi(&self) -> bool {
        match self {
            ConsoleSink::Stderr => io::stderr().is_terminal(),
            ConsoleSink::Stdout => io::stdout().is_terminal(),
            ConsoleSink::Buffer(_) => false,
        }
    }
}

impl From<Stream> for ConsoleSink {
    fn from(stream: Stream) -> Self {
        match stream {
            Stream::Stderr => ConsoleSink::Stderr,
            Stream::Stdout => ConsoleSink::Stdout,
        }
    }
}

pub enum SinkWriter {
    Stderr(io::Stderr),
    Stdout(io::Stdout),
    Buffer(SharedBuffer),
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::Stderr(w) => w.write(buf),
            SinkWriter::Stdout(w) => w.write(buf),
            SinkWriter::Buffer(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Stderr(w) => w.flush(),
            SinkWriter::Stdout(w) => w.flush(),
            SinkWriter::Buffer(w) => w.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            ConsoleSink::Stderr => SinkWriter::Stderr(io::stderr()),
            ConsoleSink::Stdout => SinkWriter::Stdout(io::stdout()),
            ConsoleSink::Buffer(buffer) => SinkWriter::Buffer(buffer.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_clones_share_contents() {
        let buffer = SharedBuffer::new();
        let sink = ConsoleSink::Buffer(buffer.clone());

        sink.make_writer().write_all(b"hello ").unwrap();
        sink.make_writer().write_all(b"world").unwrap();

        assert_eq!(buffer.contents(), "hello world");
        assert!(!sink.supports_ansi());
    }

    #[test]
    fn ansi_follows_terminal_detection() {
        assert_eq!(ConsoleSink::Stdout.supports_ansi(), io::stdout().is_terminal());
        assert_eq!(ConsoleSink::Stderr.supports_ansi(), io::stderr().is_terminal());
    }
}
