//! One client/remote pairing, from dial through joint cleanup

use super::copy::copy;
use crate::transport::Dialer;
use std::net::SocketAddr;
use std::sync::Arc;
use tcp_relay_shared::{
    CopyOutcome, Direction, SessionEvent, SessionReport, SessionStateMachine, TransitionResult,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// What a copy task hands back when it ends: its outcome plus the halves it owned
struct Completion {
    outcome: CopyOutcome,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

/// Relays one accepted connection to the remote
pub struct RelaySession<D: Dialer> {
    id: u64,
    peer: SocketAddr,
    inbound: TcpStream,
    dialer: Arc<D>,
    fsm: SessionStateMachine,
}

impl<D: Dialer> RelaySession<D> {
    pub fn new(id: u64, peer: SocketAddr, inbound: TcpStream, dialer: Arc<D>) -> Self {
        Self {
            id,
            peer,
            inbound,
            dialer,
            fsm: SessionStateMachine::new(),
        }
    }

    /// Run the session to completion
    ///
    /// Never fails: dial and copy errors end up in the report.
    pub async fn run(self) -> SessionReport {
        let RelaySession {
            id,
            peer,
            inbound,
            dialer,
            mut fsm,
        } = self;
        let started = Instant::now();
        let mut report = SessionReport {
            id,
            peer,
            client_to_remote: 0,
            remote_to_client: 0,
            dial_error: None,
            copy_errors: Vec::new(),
            elapsed: Default::default(),
        };

        let outbound = match dialer.dial().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(remote = %dialer.name(), error = %e, "dial failed, closing inbound");
                // Dropping the stream fully closes the client connection
                drop(inbound);
                transition(&mut fsm, SessionEvent::DialFailed);
                report.dial_error = Some(e);
                report.elapsed = started.elapsed();
                return report;
            }
        };
        debug!(remote = %dialer.name(), "dialed remote");
        transition(&mut fsm, SessionEvent::Dialed);

        let (in_read, in_write) = inbound.into_split();
        let (out_read, out_write) = outbound.into_split();

        // Two slots: each task reports exactly once
        let (done_tx, mut done_rx) = mpsc::channel::<Completion>(2);
        spawn_direction(Direction::ClientToRemote, in_read, out_write, done_tx.clone());
        spawn_direction(Direction::RemoteToClient, out_read, in_write, done_tx);

        let mut slots: [Option<Completion>; 2] = [None, None];
        while !fsm.both_finished() {
            match done_rx.recv().await {
                Some(completion) => {
                    let direction = completion.outcome.direction;
                    debug!(%direction, bytes = completion.outcome.bytes, "direction finished");
                    transition(&mut fsm, SessionEvent::DirectionFinished(direction));
                    slots[direction.index()] = Some(completion);
                }
                None => {
                    // A task ended without reporting; its halves are already dropped
                    for direction in [Direction::ClientToRemote, Direction::RemoteToClient] {
                        if slots[direction.index()].is_none() {
                            error!(%direction, "copy task vanished");
                            transition(&mut fsm, SessionEvent::DirectionFinished(direction));
                            record(&mut report, CopyOutcome::aborted(direction));
                        }
                    }
                }
            }
        }

        // Both tasks have returned: take the halves back and close each connection once
        let [c2r, r2c] = slots;
        let (in_read, out_write) = match c2r {
            Some(c) => {
                let Completion { outcome, reader, writer } = c;
                record(&mut report, outcome);
                (Some(reader), Some(writer))
            }
            None => (None, None),
        };
        let (out_read, in_write) = match r2c {
            Some(c) => {
                let Completion { outcome, reader, writer } = c;
                record(&mut report, outcome);
                (Some(reader), Some(writer))
            }
            None => (None, None),
        };
        close(in_read, in_write);
        close(out_read, out_write);
        transition(&mut fsm, SessionEvent::Closed);

        report.elapsed = started.elapsed();
        info!(
            client_to_remote = report.client_to_remote,
            remote_to_client = report.remote_to_client,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "done with connection"
        );
        report
    }
}

fn transition(fsm: &mut SessionStateMachine, event: SessionEvent) {
    if let TransitionResult::Invalid { from, event } = fsm.process_event(event) {
        error!(?from, ?event, "invalid session transition");
    }
}

/// Start one copy direction as its own task, inheriting the session span
fn spawn_direction(
    direction: Direction,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    done: mpsc::Sender<Completion>,
) {
    tokio::spawn(
        async move {
            let outcome = copy(direction, &mut reader, &mut writer).await;
            let completion = Completion {
                outcome,
                reader,
                writer,
            };
            // The session holds the receiver until both slots are filled
            let _ = done.send(completion).await;
        }
        .in_current_span(),
    );
}

fn record(report: &mut SessionReport, outcome: CopyOutcome) {
    match outcome.direction {
        Direction::ClientToRemote => report.client_to_remote = outcome.bytes,
        Direction::RemoteToClient => report.remote_to_client = outcome.bytes,
    }
    if let Some(e) = outcome.error {
        report.copy_errors.push(e);
    }
}

/// Fully close a connection from whichever halves survived
fn close(reader: Option<OwnedReadHalf>, writer: Option<OwnedWriteHalf>) {
    if let (Some(reader), Some(writer)) = (reader, writer) {
        match reader.reunite(writer) {
            Ok(stream) => drop(stream),
            Err(e) => warn!(error = %e, "cannot reunite connection halves"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TcpDialer;
    use std::time::Duration;
    use tcp_relay_shared::{DialError, Endpoint};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const DEADLINE: Duration = Duration::from_secs(5);

    /// Drop the stream with SO_LINGER 0 so the peer gets a reset instead of a FIN
    #[allow(deprecated)]
    fn reset(stream: TcpStream) {
        stream.set_linger(Some(Duration::ZERO)).unwrap();
        drop(stream);
    }

    /// Accept one client and run a session for it against `remote`
    async fn start_session(
        remote: SocketAddr,
    ) -> (TcpStream, tokio::task::JoinHandle<SessionReport>) {
        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let front_addr = front.local_addr().unwrap();
        let dialer = Arc::new(TcpDialer::new(Endpoint::Resolved(remote)));

        let (client, accepted) = tokio::join!(TcpStream::connect(front_addr), front.accept());
        let (inbound, peer) = accepted.unwrap();
        let handle = tokio::spawn(RelaySession::new(1, peer, inbound, dialer).run());
        (client.unwrap(), handle)
    }

    #[tokio::test]
    async fn test_ping_pong_session() {
        let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = remote.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            socket.write_all(b"pong").await.unwrap();
            received
        });

        let (mut client, session) = start_session(remote_addr).await;
        client.write_all(b"ping").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();

        assert_eq!(server.await.unwrap(), b"ping");
        assert_eq!(reply, b"pong");

        let report = session.await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.client_to_remote, 4);
        assert_eq!(report.remote_to_client, 4);
    }

    #[tokio::test]
    async fn test_dial_failure_closes_inbound() {
        let refused = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let (mut client, session) = start_session(refused).await;

        let report = session.await.unwrap();
        assert!(matches!(report.dial_error, Some(DialError::Connect { .. })));
        assert_eq!(report.total(), 0);

        // Inbound was closed without relaying anything
        let mut buf = Vec::new();
        let n = client.read_to_end(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_half_close_keeps_reverse_direction_open() {
        const UPLOAD: usize = 1024 * 1024;
        const DOWNLOAD: usize = 2 * 1024 * 1024;

        let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = remote.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();

            // Client has stopped sending; keep streaming back
            let chunk = vec![0xabu8; 64 * 1024];
            for _ in 0..DOWNLOAD / chunk.len() {
                socket.write_all(&chunk).await.unwrap();
            }
            received.len()
        });

        let (client, session) = start_session(remote_addr).await;
        let (mut client_read, mut client_write) = client.into_split();

        let upload = tokio::spawn(async move {
            client_write.write_all(&vec![0x5au8; UPLOAD]).await.unwrap();
            client_write.shutdown().await.unwrap();
            client_write
        });

        let mut downloaded = Vec::new();
        client_read.read_to_end(&mut downloaded).await.unwrap();
        let _client_write = upload.await.unwrap();

        assert_eq!(server.await.unwrap(), UPLOAD);
        assert_eq!(downloaded.len(), DOWNLOAD);
        assert!(downloaded.iter().all(|b| *b == 0xab));

        let report = session.await.unwrap();
        assert_eq!(report.client_to_remote, UPLOAD as u64);
        assert_eq!(report.remote_to_client, DOWNLOAD as u64);
    }

    #[tokio::test]
    async fn test_remote_eof_first_keeps_upload_open() {
        let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = remote.accept().await.unwrap();
            // Say hello and stop sending, but keep reading
            socket.write_all(b"hello").await.unwrap();
            socket.shutdown().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let (mut client, session) = start_session(remote_addr).await;

        let mut greeting = Vec::new();
        client.read_to_end(&mut greeting).await.unwrap();
        assert_eq!(greeting, b"hello");

        // Remote finished sending long ago; upload still goes through
        client.write_all(b"late upload").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(server.await.unwrap(), b"late upload");
        let report = session.await.unwrap();
        assert_eq!(report.remote_to_client, 5);
        assert_eq!(report.client_to_remote, 11);
    }

    #[tokio::test]
    async fn test_client_reset_still_closes_session() {
        let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();

        let (got_partial_tx, got_partial_rx) = tokio::sync::oneshot::channel();
        let server = tokio::spawn(async move {
            let (mut socket, _) = remote.accept().await.unwrap();
            let mut partial = [0u8; 7];
            socket.read_exact(&mut partial).await.unwrap();
            let _ = got_partial_tx.send(());

            // The client's reset must arrive here as end-of-stream
            let mut rest = Vec::new();
            let eof = timeout(DEADLINE, socket.read_to_end(&mut rest)).await;
            (partial, eof.is_ok())
        });

        let (mut client, session) = start_session(remote_addr).await;
        client.write_all(b"partial").await.unwrap();
        got_partial_rx.await.unwrap();
        reset(client);

        let (partial, saw_eof) = server.await.unwrap();
        assert_eq!(&partial, b"partial");
        assert!(saw_eof, "remote never saw end-of-stream after client reset");

        let report = timeout(DEADLINE, session)
            .await
            .expect("session did not finish after client reset")
            .unwrap();
        assert_eq!(report.client_to_remote, 7);
        assert!(!report.copy_errors.is_empty());
    }

    #[tokio::test]
    async fn test_remote_reset_still_closes_session() {
        let remote = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let remote_addr = remote.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = remote.accept().await.unwrap();
            let mut request = [0u8; 3];
            socket.read_exact(&mut request).await.unwrap();
            reset(socket);
        });

        let (mut client, session) = start_session(remote_addr).await;
        client.write_all(b"get").await.unwrap();
        server.await.unwrap();

        // The client sees the remote's failure as end-of-stream, not a hang
        let mut reply = Vec::new();
        let read = timeout(DEADLINE, client.read_to_end(&mut reply)).await;
        assert!(read.is_ok(), "client never saw end-of-stream after remote reset");
        assert!(reply.is_empty());
        drop(client);

        let report = timeout(DEADLINE, session)
            .await
            .expect("session did not finish after remote reset")
            .unwrap();
        assert_eq!(report.client_to_remote, 3);
        assert!(!report.copy_errors.is_empty());
    }
}
