// HTTP-FLV subscriber session

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{
        mpsc::{channel, Receiver, Sender},
        watch, Mutex,
    },
};

use crate::log::Logger;
use crate::utils::{gen_unique_key, ConnStat};

use super::{parse_http_header, FlvTag};

/// Fixed HTTP response sent to every subscriber
const FLV_HTTP_RESPONSE_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\n\
Cache-Control: no-cache\r\n\
Content-Type: video/x-flv\r\n\
Connection: close\r\n\
Expires: -1\r\n\
Pragma: no-cache\r\n\
\r\n";

/// FLV file header: signature, version 1, audio+video flags, header size 9,
/// plus the initial zero PreviousTagSize
const FLV_HEADER: [u8; 13] = [
    0x46, 0x4C, 0x56, 0x01, 0x05, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00,
];

// Capacity of the outbound packet queue
const OUT_QUEUE_SIZE: usize = 1024;

// Buffer size for reading the HTTP request
const READ_BUF_SIZE: usize = 4096;

// Size of the throwaway buffer used by the disconnect probe
const PROBE_READ_SIZE: usize = 128;

/// Error on a subscriber session
#[derive(Debug, Error)]
pub enum SubSessionError {
    /// The connection failed
    #[error("{0}")]
    Io(#[from] io::Error),

    /// The request line is not a plain HTTP/1.1 GET
    #[error("invalid http request line: {line}")]
    InvalidRequestLine { line: String },

    /// The request URI is not of the /app/stream.flv form
    #[error("invalid stream uri: {uri}")]
    InvalidUri { uri: String },

    /// The session was disposed
    #[error("session closed")]
    SessionClosed,

    /// run_loop was entered twice, or before construction finished handing
    /// over the socket halves
    #[error("the session is already running")]
    AlreadyRunning,
}

/// Shared teardown state of a session, cloned into every task that may
/// need to dispose it
struct SessionCloser<TW> {
    write_stream: Arc<Mutex<TW>>,
    closed: Arc<AtomicBool>,
    closed_sender: Arc<watch::Sender<bool>>,
    closed_receiver: watch::Receiver<bool>,
    logger: Arc<Logger>,
}

impl<TW> Clone for SessionCloser<TW> {
    fn clone(&self) -> SessionCloser<TW> {
        SessionCloser {
            write_stream: self.write_stream.clone(),
            closed: self.closed.clone(),
            closed_sender: self.closed_sender.clone(),
            closed_receiver: self.closed_receiver.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<TW: AsyncWrite + Send + Unpin> SessionCloser<TW> {
    /// True once dispose ran
    fn has_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Runs the shutdown sequence exactly once: flips the closed flag,
    /// signals every waiter and shuts the connection down. Later calls
    /// are no-ops
    async fn dispose(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.logger
            .log_info(&format!("lifecycle dispose session. reason={}", reason));

        let _ = self.closed_sender.send(true);

        let mut write_stream = self.write_stream.lock().await;
        if let Err(e) = write_stream.shutdown().await {
            self.logger
                .log_error(&format!("could not shut the connection down: {}", e));
        }
    }
}

/// HTTP-FLV subscriber session
///
/// Owns one accepted client connection. The remote side sends a single GET
/// request and from then on only consumes: media tags are pushed by the
/// upstream dispatcher through write_packet and pumped onto the socket by
/// run_loop. Any of the involved tasks may dispose the session; the
/// shutdown sequence runs exactly once.
pub struct FlvSubSession<TR, TW>
where
    TR: AsyncRead + Send + Unpin + 'static,
    TW: AsyncWrite + Send + Unpin + 'static,
{
    /// Unique key identifying the session in logs
    pub unique_key: String,

    /// Application name from the request URI
    pub app_name: String,

    /// Stream name from the request URI
    pub stream_name: String,

    /// Raw request URI
    pub uri: String,

    /// Request headers
    pub headers: HashMap<String, String>,

    /// Connection stats collaborator
    pub conn_stat: ConnStat,

    // Write timeout (seconds) recorded into conn_stat when the loop starts
    write_timeout_sec: u64,

    // Read half; the disconnect probe takes it when run_loop starts
    read_stream: Option<BufReader<TR>>,

    // Producer end of the outbound queue
    out_sender: Sender<Vec<u8>>,

    // Consumer end of the outbound queue, taken by run_loop
    out_receiver: Option<Receiver<Vec<u8>>>,

    closer: SessionCloser<TW>,

    logger: Arc<Logger>,
}

impl<TR, TW> FlvSubSession<TR, TW>
where
    TR: AsyncRead + Send + Unpin + 'static,
    TW: AsyncWrite + Send + Unpin + 'static,
{
    /// Creates new FlvSubSession over an accepted connection
    ///
    /// # Arguments
    ///
    /// * `read_stream` - Read half of the connection
    /// * `write_stream` - Write half of the connection
    /// * `remote_addr` - Remote address, for the lifecycle log
    /// * `write_timeout_sec` - Write timeout recorded into the stats collaborator
    /// * `parent_logger` - Logger to derive the session logger from
    pub fn new(
        read_stream: TR,
        write_stream: TW,
        remote_addr: &str,
        write_timeout_sec: u64,
        parent_logger: &Logger,
    ) -> FlvSubSession<TR, TW> {
        let unique_key = gen_unique_key("FLVSUB");
        let logger = Arc::new(parent_logger.make_child_logger(&format!("[{}] ", unique_key)));

        logger.log_info(&format!(
            "lifecycle new session. remote_addr={}",
            remote_addr
        ));

        let (out_sender, out_receiver) = channel(OUT_QUEUE_SIZE);
        let (closed_sender, closed_receiver) = watch::channel(false);

        FlvSubSession {
            unique_key,
            app_name: String::new(),
            stream_name: String::new(),
            uri: String::new(),
            headers: HashMap::new(),
            conn_stat: ConnStat::new(),
            write_timeout_sec,
            read_stream: Some(BufReader::with_capacity(READ_BUF_SIZE, read_stream)),
            out_sender,
            out_receiver: Some(out_receiver),
            closer: SessionCloser {
                write_stream: Arc::new(Mutex::new(write_stream)),
                closed: Arc::new(AtomicBool::new(false)),
                closed_sender: Arc::new(closed_sender),
                closed_receiver,
                logger: logger.clone(),
            },
            logger,
        }
    }

    /// Reads and validates the subscriber's GET request, filling in uri,
    /// app_name, stream_name and headers
    ///
    /// Any failure disposes the session and surfaces the error.
    pub async fn read_request(&mut self) -> Result<(), SubSessionError> {
        match self.read_request_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.closer.dispose(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn read_request_inner(&mut self) -> Result<(), SubSessionError> {
        let read_stream = match self.read_stream.as_mut() {
            Some(read_stream) => read_stream,
            None => return Err(SubSessionError::AlreadyRunning),
        };

        let (first_line, headers) = parse_http_header(read_stream).await?;
        self.headers = headers;

        let items: Vec<String> = first_line.split(' ').map(|s| s.to_string()).collect();
        if items.len() != 3 || items[0] != "GET" {
            return Err(SubSessionError::InvalidRequestLine { line: first_line });
        }

        let uri = items[1].clone();
        if !uri.ends_with(".flv") {
            return Err(SubSessionError::InvalidUri { uri });
        }

        let parts: Vec<String> = uri.split('/').map(|s| s.to_string()).collect();
        if parts.len() != 3 {
            return Err(SubSessionError::InvalidUri { uri });
        }

        let file_parts: Vec<String> = parts[2].split('.').map(|s| s.to_string()).collect();
        if file_parts.len() < 2 {
            return Err(SubSessionError::InvalidUri { uri });
        }

        self.app_name = parts[1].clone();
        self.stream_name = file_parts[0].clone();
        self.uri = uri;

        Ok(())
    }

    /// Enqueues the fixed HTTP 200 response header
    pub async fn write_http_response_header(&self) {
        self.logger.log_info("<----- http response header");
        self.write_packet(FLV_HTTP_RESPONSE_HEADER.to_vec()).await;
    }

    /// Enqueues the 13 byte FLV file header
    pub async fn write_flv_header(&self) {
        self.logger.log_info("<----- flv header");
        self.write_packet(FLV_HEADER.to_vec()).await;
    }

    /// Enqueues one FLV tag
    pub async fn write(&self, tag: &FlvTag) {
        self.write_packet(tag.raw.clone()).await;
    }

    /// Enqueues an outbound buffer
    ///
    /// No-op once the session is closed. When the queue is full the call
    /// waits for room but gives up as soon as the session closes, so
    /// producers never block past disposal.
    pub async fn write_packet(&self, pkt: Vec<u8>) {
        if self.closer.has_closed() {
            return;
        }

        let mut closed_receiver = self.closer.closed_receiver.clone();

        tokio::select! {
            _ = self.out_sender.send(pkt) => {}
            _ = closed_receiver.wait_for(|closed| *closed) => {}
        }
    }

    /// Runs the session: spawns the disconnect probe on the read half and
    /// pumps the outbound queue onto the socket until the session ends
    ///
    /// Only ever returns an error; a subscription ends by disposal.
    pub async fn run_loop(&mut self) -> Result<(), SubSessionError> {
        self.conn_stat.start(0, self.write_timeout_sec);

        let read_stream = match self.read_stream.take() {
            Some(read_stream) => read_stream,
            None => return Err(SubSessionError::AlreadyRunning),
        };

        self.spawn_disconnect_probe(read_stream);

        self.run_write_loop().await
    }

    /// Disposes the session. Idempotent
    pub async fn dispose(&self, reason: &str) {
        self.closer.dispose(reason).await;
    }

    /// True once the session has been disposed
    pub fn has_closed(&self) -> bool {
        self.closer.has_closed()
    }

    // A subscriber never sends again after its request, so one pending read
    // is enough to surface disconnection. Any outcome of the read, data
    // included, ends the session
    fn spawn_disconnect_probe(&self, mut read_stream: BufReader<TR>) {
        let closer = self.closer.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            let mut buf = [0_u8; PROBE_READ_SIZE];
            let mut closed_receiver = closer.closed_receiver.clone();

            let outcome = tokio::select! {
                res = read_stream.read(&mut buf) => Some(res),
                _ = closed_receiver.wait_for(|closed| *closed) => None,
            };

            if let Some(res) = outcome {
                let reason = match res {
                    Ok(0) => "peer closed the connection".to_string(),
                    Ok(n) => format!("unexpected {} bytes from subscriber", n),
                    Err(e) => {
                        logger.log_error(&format!("read failed: {}", e));
                        e.to_string()
                    }
                };
                closer.dispose(&reason).await;
            }
        });
    }

    async fn run_write_loop(&mut self) -> Result<(), SubSessionError> {
        let mut out_receiver = match self.out_receiver.take() {
            Some(out_receiver) => out_receiver,
            None => return Err(SubSessionError::AlreadyRunning),
        };

        let mut closed_receiver = self.closer.closed_receiver.clone();

        enum WriteLoopEvent {
            Closed,
            Packet(Option<Vec<u8>>),
        }

        loop {
            let event = tokio::select! {
                _ = closed_receiver.wait_for(|closed| *closed) => WriteLoopEvent::Closed,
                pkt = out_receiver.recv() => WriteLoopEvent::Packet(pkt),
            };

            match event {
                WriteLoopEvent::Closed => {
                    return Err(SubSessionError::SessionClosed);
                }
                WriteLoopEvent::Packet(pkt) => {
                    let pkt = match pkt {
                        Some(pkt) => pkt,
                        None => return Err(SubSessionError::SessionClosed),
                    };

                    if self.closer.has_closed() {
                        return Err(SubSessionError::SessionClosed);
                    }

                    let write_res = {
                        let mut write_stream = self.closer.write_stream.lock().await;
                        write_stream.write_all(&pkt).await
                    };

                    match write_res {
                        Ok(()) => {
                            self.conn_stat.write(pkt.len());
                        }
                        Err(e) => {
                            self.closer.dispose(&format!("write failed: {}", e)).await;
                            return Err(e.into());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, split, AsyncWriteExt, ReadHalf, WriteHalf};

    type TestSession = FlvSubSession<ReadHalf<tokio::io::DuplexStream>, WriteHalf<tokio::io::DuplexStream>>;

    async fn make_session(request: &[u8]) -> (TestSession, tokio::io::DuplexStream) {
        let (mut client, server) = duplex(64 * 1024);
        let (server_read, server_write) = split(server);

        client.write_all(request).await.unwrap();

        let logger = Logger::new_disabled();
        let session = FlvSubSession::new(server_read, server_write, "127.0.0.1:8080", 10, &logger);

        (session, client)
    }

    #[tokio::test]
    async fn test_read_request_parses_uri() {
        let (mut session, _client) =
            make_session(b"GET /live/stream1.flv HTTP/1.1\r\nHost: example.org\r\n\r\n").await;

        session.read_request().await.unwrap();

        assert_eq!(session.app_name, "live");
        assert_eq!(session.stream_name, "stream1");
        assert_eq!(session.uri, "/live/stream1.flv");
        assert_eq!(
            session.headers.get("Host").map(String::as_str),
            Some("example.org")
        );
        assert!(!session.has_closed());
    }

    #[tokio::test]
    async fn test_read_request_rejects_non_get() {
        let (mut session, _client) =
            make_session(b"POST /live/stream1.flv HTTP/1.1\r\n\r\n").await;

        let res = session.read_request().await;

        assert!(matches!(res, Err(SubSessionError::InvalidRequestLine { .. })));
        assert!(session.has_closed());
    }

    #[tokio::test]
    async fn test_read_request_rejects_non_flv_uri() {
        let (mut session, _client) = make_session(b"GET /live/stream1.mp4 HTTP/1.1\r\n\r\n").await;

        let res = session.read_request().await;

        assert!(matches!(res, Err(SubSessionError::InvalidUri { .. })));
        assert!(session.has_closed());
    }

    #[tokio::test]
    async fn test_read_request_rejects_deep_uri() {
        let (mut session, _client) =
            make_session(b"GET /a/b/stream1.flv HTTP/1.1\r\n\r\n").await;

        let res = session.read_request().await;

        assert!(matches!(res, Err(SubSessionError::InvalidUri { .. })));
        assert!(session.has_closed());
    }

    #[tokio::test]
    async fn test_egress_pumps_queue_in_order() {
        let (mut session, mut client) =
            make_session(b"GET /live/stream1.flv HTTP/1.1\r\n\r\n").await;

        session.read_request().await.unwrap();

        session.write_http_response_header().await;
        session.write_flv_header().await;

        let tag = FlvTag::from_raw(vec![
            8, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0xAA, 0xBB, 0xCC,
        ])
        .unwrap();
        let tag_raw = tag.raw.clone();
        session.write(&tag).await;

        let handle = tokio::spawn(async move {
            let res = session.run_loop().await;
            (session, res)
        });

        let mut response = vec![0_u8; FLV_HTTP_RESPONSE_HEADER.len()];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(response, FLV_HTTP_RESPONSE_HEADER);

        let mut flv_header = vec![0_u8; FLV_HEADER.len()];
        client.read_exact(&mut flv_header).await.unwrap();
        assert_eq!(flv_header, FLV_HEADER);

        let mut tag_bytes = vec![0_u8; tag_raw.len()];
        client.read_exact(&mut tag_bytes).await.unwrap();
        assert_eq!(tag_bytes, tag_raw);

        // Client goes away; the probe disposes and the loop ends
        drop(client);

        let (session, res) = handle.await.unwrap();
        assert!(res.is_err());
        assert!(session.has_closed());
        assert_eq!(session.conn_stat.wrote_count(), 3);
        assert_eq!(
            session.conn_stat.wrote_bytes(),
            (FLV_HTTP_RESPONSE_HEADER.len() + FLV_HEADER.len() + tag_raw.len()) as u64
        );
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (session, _client) = make_session(b"").await;

        session.dispose("first").await;
        session.dispose("second").await;
        session.dispose("third").await;

        assert!(session.has_closed());
    }

    #[tokio::test]
    async fn test_write_packet_after_dispose_is_noop() {
        let (session, _client) = make_session(b"").await;

        session.dispose("test").await;

        // Must return immediately, neither blocking nor panicking
        tokio::time::timeout(Duration::from_secs(1), session.write_packet(vec![1, 2, 3]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_packet_gives_up_when_disposed_while_full() {
        let (session, _client) = make_session(b"").await;

        // Fill the queue without a consumer
        for _ in 0..OUT_QUEUE_SIZE {
            session.write_packet(vec![0]).await;
        }

        let disposer = {
            let closer = session.closer.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                closer.dispose("external").await;
            })
        };

        // Queue is full; the call must end once the session closes
        tokio::time::timeout(Duration::from_secs(5), session.write_packet(vec![1]))
            .await
            .unwrap();

        disposer.await.unwrap();
        assert!(session.has_closed());
    }

    #[tokio::test]
    async fn test_disconnect_probe_disposes_on_client_eof() {
        let (mut session, client) =
            make_session(b"GET /live/stream1.flv HTTP/1.1\r\n\r\n").await;

        session.read_request().await.unwrap();

        let handle = tokio::spawn(async move {
            let res = session.run_loop().await;
            (session, res)
        });

        drop(client);

        let (session, res) = handle.await.unwrap();
        assert!(matches!(res, Err(SubSessionError::SessionClosed)));
        assert!(session.has_closed());
    }
}
