use std::io;

use sockfwd_core::DrainMode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Working buffer for each copy direction (32KB)
const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// How one copy direction ended
#[derive(Debug)]
pub enum CopyStatus {
    /// The source reached end of stream
    Eof,
    /// Reading or writing failed
    Error(io::Error),
    /// Still running when the other direction ended the session
    Abandoned,
}

impl CopyStatus {
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    fn from_result(result: io::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Eof,
            Err(e) => Self::Error(e),
        }
    }
}

/// Bytes moved in one direction and how that direction ended
#[derive(Debug)]
pub struct DirectionOutcome {
    pub bytes: u64,
    pub status: CopyStatus,
}

/// Result of splicing one inbound connection to one outbound connection
#[derive(Debug)]
pub struct RelayOutcome {
    pub inbound_to_outbound: DirectionOutcome,
    pub outbound_to_inbound: DirectionOutcome,
}

impl RelayOutcome {
    /// `(inbound -> outbound, outbound -> inbound)` byte counts
    pub fn bytes(&self) -> (u64, u64) {
        (self.inbound_to_outbound.bytes, self.outbound_to_inbound.bytes)
    }
}

/// Direction that ended first in full-duplex mode
enum Finished {
    Upload(io::Result<()>),
    Download(io::Result<()>),
}

/// Copy `reader` into `writer` until end of stream, keeping a running total
async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    total: &mut u64,
    propagate_eof: bool,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;

        *total += n as u64;
    }

    if propagate_eof {
        // The peer may already be gone; the copy itself still succeeded
        let _ = writer.shutdown().await;
    }

    Ok(())
}

/// Copy bytes between `inbound` and `outbound` in both directions
///
/// With [`DrainMode::HalfDuplex`] the relay returns as soon as either
/// direction ends and the other direction is reported as
/// [`CopyStatus::Abandoned`], even if it still had data in flight. With
/// [`DrainMode::FullDuplex`] end of stream is forwarded as a write shutdown
/// and the relay waits for both directions, unless one of them fails, which
/// ends the session like in half-duplex mode.
///
/// Both connections are closed when this returns.
pub async fn relay<I, O>(inbound: I, outbound: O, drain: DrainMode) -> RelayOutcome
where
    I: AsyncRead + AsyncWrite,
    O: AsyncRead + AsyncWrite,
{
    let (mut in_reader, mut in_writer) = tokio::io::split(inbound);
    let (mut out_reader, mut out_writer) = tokio::io::split(outbound);

    let mut uploaded = 0u64;
    let mut downloaded = 0u64;

    let (upload, download) = match drain {
        DrainMode::HalfDuplex => {
            tokio::select! {
                result = copy_half(&mut in_reader, &mut out_writer, &mut uploaded, false) => {
                    (CopyStatus::from_result(result), CopyStatus::Abandoned)
                }
                result = copy_half(&mut out_reader, &mut in_writer, &mut downloaded, false) => {
                    (CopyStatus::Abandoned, CopyStatus::from_result(result))
                }
            }
        }
        DrainMode::FullDuplex => {
            let upload = copy_half(&mut in_reader, &mut out_writer, &mut uploaded, true);
            let download = copy_half(&mut out_reader, &mut in_writer, &mut downloaded, true);
            tokio::pin!(upload, download);

            let first = tokio::select! {
                result = &mut upload => Finished::Upload(result),
                result = &mut download => Finished::Download(result),
            };

            // Only a clean EOF keeps the other direction running
            match first {
                Finished::Upload(Ok(())) => (CopyStatus::Eof, CopyStatus::from_result(download.await)),
                Finished::Upload(Err(e)) => (CopyStatus::Error(e), CopyStatus::Abandoned),
                Finished::Download(Ok(())) => (CopyStatus::from_result(upload.await), CopyStatus::Eof),
                Finished::Download(Err(e)) => (CopyStatus::Abandoned, CopyStatus::Error(e)),
            }
        }
    };

    RelayOutcome {
        inbound_to_outbound: DirectionOutcome {
            bytes: uploaded,
            status: upload,
        },
        outbound_to_inbound: DirectionOutcome {
            bytes: downloaded,
            status: download,
        },
    }
}
