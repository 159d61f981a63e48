use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_serial::SerialPortBuilderExt;

mod response;

pub use response::{classify, ResponseEvent};

/// Byte-oriented duplex channel to the stage controller.
///
/// All three calls are non-blocking: the session loop polls on its own
/// cadence and must never stall on the wire. Failures are not retried
/// here; they propagate to the session.
pub trait Transport {
    /// Whether at least one complete response line is buffered.
    fn has_pending(&self) -> bool;

    /// Queue one newline-terminated command frame. The frame is written
    /// and flushed whole, never split across writes.
    fn write_line(&mut self, line: Bytes) -> Result<(), Error>;

    /// Take the next complete buffered response line, if any.
    fn try_read_line(&mut self) -> Result<Option<Bytes>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stage connection closed")]
    Disconnected,
}

/// Handle for asynchronous serial communication with the stage controller.
///
/// Owns a background task that writes queued command frames and splits
/// inbound bytes into complete lines. Dropping the handle stops it.
pub struct Stage {
    outgoing: mpsc::UnboundedSender<Bytes>,
    incoming: mpsc::UnboundedReceiver<Bytes>,
    com_task: tokio::task::JoinHandle<Result<(), Error>>,
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.com_task.abort()
    }
}

/// Loop for handling sending/receiving in the background.
async fn stage_com_task<S>(
    mut port: S,
    mut outgoing: mpsc::UnboundedReceiver<Bytes>,
    incoming: mpsc::UnboundedSender<Bytes>,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(256);
    tracing::debug!("started background stage communications");
    loop {
        tokio::select! {
            Some(line) = outgoing.recv() => {
                port.write_all(&line).await?;
                port.flush().await?;
                tracing::debug!("sent `{}` to stage", String::from_utf8_lossy(&line).trim());
            },
            read = port.read_buf(&mut buf) => {
                if read? == 0 {
                    break Err(Error::Disconnected);
                }
                while let Some(n) = buf.iter().position(|b| *b == b'\n') {
                    let line = buf.split_to(n + 1).freeze();
                    tracing::debug!("received `{}` from stage", String::from_utf8_lossy(&line).trim());
                    let _ = incoming.send(line); // session gone, keep draining
                }
            },
            else => break Err(Error::Disconnected),
        }
    }
}

impl Stage {
    /// Open a serial port and start communicating over it.
    pub fn open(path: &str, baud: u32) -> Result<Self, Error> {
        let port = tokio_serial::new(path, baud)
            .open_native_async()
            .map_err(std::io::Error::from)?;
        Ok(Self::new(port))
    }

    /// Create a new stage handle from an open port.
    ///
    /// Generic over the stream so tests can run against an in-memory
    /// duplex pipe instead of real hardware.
    pub fn new<S>(port: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming) = mpsc::unbounded_channel();
        let com_task = tokio::task::spawn(stage_com_task(port, outgoing_rx, incoming_tx));
        Self {
            outgoing,
            incoming,
            com_task,
        }
    }
}

impl Transport for Stage {
    fn has_pending(&self) -> bool {
        !self.incoming.is_empty()
    }

    fn write_line(&mut self, line: Bytes) -> Result<(), Error> {
        self.outgoing.send(line).map_err(|_| Error::Disconnected)
    }

    fn try_read_line(&mut self) -> Result<Option<Bytes>, Error> {
        match self.incoming.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(Error::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    #[tokio::test]
    async fn writes_whole_frames() {
        let (port, mut far) = duplex(256);
        let mut stage = Stage::new(port);

        stage
            .write_line(Bytes::from_static(b"MANUAL,SCAN\n"))
            .unwrap();

        let mut buf = [0u8; 32];
        let n = timeout(Duration::from_secs(1), far.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"MANUAL,SCAN\n");
    }

    #[tokio::test]
    async fn reassembles_split_lines() {
        let (port, mut far) = duplex(256);
        let mut stage = Stage::new(port);

        far.write_all(b"BU").await.unwrap();
        far.write_all(b"SY\nDO").await.unwrap();

        let first = timeout(Duration::from_secs(1), async {
            loop {
                if let Some(line) = stage.try_read_line().unwrap() {
                    break line;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(&first[..], b"BUSY\n");

        // second line is still incomplete
        assert!(stage.try_read_line().unwrap().is_none());
        assert!(!stage.has_pending());

        far.write_all(b"NE\n").await.unwrap();
        let second = timeout(Duration::from_secs(1), async {
            loop {
                if let Some(line) = stage.try_read_line().unwrap() {
                    break line;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(&second[..], b"DONE\n");
    }

    #[tokio::test]
    async fn closed_port_surfaces_disconnect() {
        let (port, far) = duplex(256);
        let mut stage = Stage::new(port);
        drop(far);

        let err = timeout(Duration::from_secs(1), async {
            loop {
                match stage.try_read_line() {
                    Ok(None) => tokio::task::yield_now().await,
                    Ok(Some(_)) => panic!("no line was ever sent"),
                    Err(err) => break err,
                }
            }
        })
        .await
        .unwrap();
        assert!(matches!(err, Error::Disconnected));
    }
}
