//! Unidirectional byte pump with half-close
//!
//! A copy task moves bytes from one connection's read half to the other
//! connection's write half until the source reports end-of-stream. At that
//! point it stops reading the source and shuts down the destination's write
//! half, so the far side sees end-of-stream too. The source's write half and
//! the destination's read half belong to the opposite direction and are left
//! alone.

use bytes::BytesMut;
use tcp_relay_shared::{limits, CopyError, CopyOutcome, Direction};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

/// Copy `reader` into `writer` until end-of-stream or an I/O error
///
/// Returns the number of bytes delivered to `writer`. Errors end this
/// direction only and are carried in the outcome.
pub async fn copy<R, W>(direction: Direction, reader: &mut R, writer: &mut W) -> CopyOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(limits::COPY_BUFFER_SIZE);
    let mut total: u64 = 0;

    loop {
        buf.clear();
        let n = match reader.read_buf(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!(%direction, bytes = total, error = %e, "read failed");
                pass_on_failure(direction, writer).await;
                return CopyOutcome::failed(direction, total, CopyError::Read(e));
            }
        };

        if n == 0 {
            break;
        }

        if let Err(e) = writer.write_all(&buf[..n]).await {
            warn!(%direction, bytes = total, error = %e, "write failed");
            pass_on_failure(direction, writer).await;
            return CopyOutcome::failed(direction, total, CopyError::Write(e));
        }
        if let Err(e) = writer.flush().await {
            warn!(%direction, bytes = total, error = %e, "flush failed");
            pass_on_failure(direction, writer).await;
            return CopyOutcome::failed(direction, total, CopyError::Write(e));
        }

        total += n as u64;
        trace!(%direction, chunk = n, bytes = total, "forwarded");
    }

    // End-of-stream: propagate it to the destination's peer
    debug!(%direction, bytes = total, "end of stream, half-closing");
    if let Err(e) = writer.shutdown().await {
        // Peer may already be gone; the bytes counted were still delivered
        debug!(%direction, error = %e, "half-close failed");
        return CopyOutcome::failed(direction, total, CopyError::Shutdown(e));
    }

    CopyOutcome::eof(direction, total)
}

/// Best-effort FIN to the destination after this direction failed
///
/// Without it the destination's peer keeps waiting for data that will never
/// come, and the opposite direction never reaches its own end-of-stream.
async fn pass_on_failure<W>(direction: Direction, writer: &mut W)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if let Err(e) = writer.shutdown().await {
        debug!(%direction, error = %e, "half-close after failure failed");
    }
}
