use std::io;

use smolrpc_core::{RpcMessage, MAX_HELLO_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Reads and writes smolrpc frames over an already-connected, already-split
/// stream half. Owns the accumulation buffer so a TCP read that straddles
/// two frames (or delivers less than one) is handled transparently: callers
/// only ever see complete hellos and complete messages.
pub struct FramedReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncReadExt + Unpin> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        FramedReader {
            reader,
            buf: Vec::new(),
        }
    }

    async fn fill_until(&mut self, n: usize) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        while self.buf.len() < n {
            let read = self.reader.read(&mut chunk).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection",
                ));
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    /// Read the hello prelude (`hello_size: u32` + 4 magic bytes) and,
    /// once `hello_size` itself is satisfied, the complete hello body
    /// (magic included). Rejects a `hello_size` above [`MAX_HELLO_SIZE`]
    /// before waiting for the rest of it to arrive.
    pub async fn read_hello(&mut self) -> io::Result<Vec<u8>> {
        self.fill_until(8).await?;
        let hello_size = u32::from_be_bytes(self.buf[0..4].try_into().unwrap()) as usize;
        if hello_size > MAX_HELLO_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hello of {hello_size} bytes exceeds the {MAX_HELLO_SIZE} byte cap"),
            ));
        }
        if hello_size < 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "hello_size smaller than the prelude it must include",
            ));
        }
        self.fill_until(hello_size).await?;
        let hello = self.buf[0..hello_size].to_vec();
        self.buf.drain(0..hello_size);
        Ok(hello)
    }

    /// Read one complete, length-prefixed `rpc_message` frame.
    pub async fn read_message(&mut self) -> io::Result<RpcMessage> {
        self.fill_until(4).await?;
        let mut message_size = u32::from_be_bytes(self.buf[0..4].try_into().unwrap()) as usize;
        while self.buf.len() < message_size {
            self.fill_until(message_size).await?;
            message_size = u32::from_be_bytes(self.buf[0..4].try_into().unwrap()) as usize;
        }
        let frame = self.buf[0..message_size].to_vec();
        self.buf.drain(0..message_size);
        RpcMessage::decode_framed(&frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

/// Thin wrapper over a writer half so the rest of the crate writes whole
/// pre-encoded frames rather than juggling `AsyncWriteExt` imports.
pub struct FramedWriter<W> {
    writer: W,
}

impl<W: AsyncWriteExt + Unpin> FramedWriter<W> {
    pub fn new(writer: W) -> Self {
        FramedWriter { writer }
    }

    pub async fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await
    }
}
