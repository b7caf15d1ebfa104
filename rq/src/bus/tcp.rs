//! Cross-process bus over two well-known TCP endpoints
//!
//! The coordinator binds both listeners; providers connect (the same
//! topology the two ports imply in the config). Frames are newline-
//! delimited JSON with a size guard.
//!
//! - **broadcast endpoint:** providers connect and hold the connection;
//!   a background accept task keeps the subscriber set; each broadcast
//!   writes the command line to every live subscriber and drops dead ones.
//! - **reply endpoint:** one short-lived connection per answer. The
//!   provider connects, writes its reply frame, and reads the `ACK` line;
//!   the coordinator accepts, reads, and answers on the same connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use super::{Ack, AckWait, BusError, CoordinatorBus, MAX_FRAME_SIZE, ProviderBus, ReplyDelivery, ReplyWait};
use crate::protocol::{ACK_TOKEN, ProviderReply};

/// Read one newline-delimited frame with the size guard applied
async fn read_frame<R>(reader: &mut BufReader<R>) -> Result<Option<String>, BusError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;

    if bytes_read == 0 {
        return Ok(None);
    }
    if bytes_read > MAX_FRAME_SIZE {
        return Err(BusError::FrameTooLarge {
            size: bytes_read,
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(Some(line.trim().to_string()))
}

/// Coordinator endpoint: owns both listeners
pub struct TcpCoordinatorBus {
    broadcast_addr: SocketAddr,
    reply_listener: TcpListener,
    subscribers: Arc<Mutex<Vec<TcpStream>>>,
    accept_task: JoinHandle<()>,
}

impl TcpCoordinatorBus {
    /// Bind the broadcast and reply endpoints and start accepting subscribers
    pub async fn bind(broadcast_addr: &str, reply_addr: &str) -> Result<Self, BusError> {
        let broadcast_listener = TcpListener::bind(broadcast_addr).await.map_err(|source| BusError::Bind {
            addr: broadcast_addr.to_string(),
            source,
        })?;
        let reply_listener = TcpListener::bind(reply_addr).await.map_err(|source| BusError::Bind {
            addr: reply_addr.to_string(),
            source,
        })?;

        let bound_broadcast = broadcast_listener.local_addr()?;
        debug!(broadcast = %bound_broadcast, reply = %reply_listener.local_addr()?, "TcpCoordinatorBus::bind: listeners bound");

        let subscribers: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));
        let accept_task = tokio::spawn(accept_subscribers(broadcast_listener, Arc::clone(&subscribers)));

        Ok(Self {
            broadcast_addr: bound_broadcast,
            reply_listener,
            subscribers,
            accept_task,
        })
    }

    /// Address of the bound broadcast endpoint
    pub fn broadcast_addr(&self) -> SocketAddr {
        self.broadcast_addr
    }

    /// Address of the bound reply endpoint
    pub fn reply_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.reply_listener.local_addr()?)
    }

    /// Number of currently connected broadcast subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    async fn accept_one_reply(&self) -> Result<ReplyDelivery, ReplyFault> {
        let (stream, peer) = self
            .reply_listener
            .accept()
            .await
            .map_err(|e| ReplyFault::Fatal(BusError::Io(e)))?;
        debug!(%peer, "TcpCoordinatorBus: reply connection accepted");

        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(ReplyFault::Recoverable(peer, None)),
            Err(BusError::FrameTooLarge { size, max }) => {
                warn!(%peer, size, max, "TcpCoordinatorBus: oversized reply frame");
                return Err(ReplyFault::Recoverable(peer, Some(write_half)));
            }
            Err(e) => return Err(ReplyFault::Fatal(e)),
        };

        match serde_json::from_str::<ProviderReply>(&frame) {
            Ok(reply) => Ok(ReplyDelivery::new(reply, Box::new(TcpAck { stream: write_half }))),
            Err(e) => {
                warn!(%peer, error = %e, "TcpCoordinatorBus: undecodable reply frame");
                Err(ReplyFault::Recoverable(peer, Some(write_half)))
            }
        }
    }
}

impl Drop for TcpCoordinatorBus {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// A reply connection that produced no usable reply
///
/// Recoverable faults still get a best-effort `ACK` line so the peer's
/// own ack wait resolves; the collect deadline keeps running.
enum ReplyFault {
    Recoverable(SocketAddr, Option<OwnedWriteHalf>),
    Fatal(BusError),
}

async fn accept_subscribers(listener: TcpListener, subscribers: Arc<Mutex<Vec<TcpStream>>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "TcpCoordinatorBus: broadcast subscriber connected");
                subscribers.lock().await.push(stream);
            }
            Err(e) => {
                warn!(error = %e, "TcpCoordinatorBus: broadcast accept failed");
            }
        }
    }
}

/// Ack path back over the accepted reply connection
struct TcpAck {
    stream: OwnedWriteHalf,
}

#[async_trait]
impl Ack for TcpAck {
    async fn ack(mut self: Box<Self>) -> Result<(), BusError> {
        self.stream.write_all(ACK_TOKEN.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CoordinatorBus for TcpCoordinatorBus {
    async fn broadcast(&mut self, command: &str) -> Result<(), BusError> {
        let frame = format!("{command}\n");
        let mut subscribers = self.subscribers.lock().await;

        let mut live = Vec::with_capacity(subscribers.len());
        for mut stream in subscribers.drain(..) {
            match stream.write_all(frame.as_bytes()).await {
                Ok(()) => live.push(stream),
                Err(e) => {
                    warn!(error = %e, "TcpCoordinatorBus::broadcast: dropping dead subscriber");
                }
            }
        }
        debug!(command, subscribers = live.len(), "TcpCoordinatorBus::broadcast: sent");
        *subscribers = live;
        Ok(())
    }

    async fn next_reply(&mut self, wait: Duration) -> Result<ReplyWait, BusError> {
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(ReplyWait::TimedOut);
            }

            match timeout(remaining, self.accept_one_reply()).await {
                Err(_) => return Ok(ReplyWait::TimedOut),
                Ok(Ok(delivery)) => return Ok(ReplyWait::Delivered(delivery)),
                Ok(Err(ReplyFault::Fatal(e))) => return Err(e),
                Ok(Err(ReplyFault::Recoverable(peer, write_half))) => {
                    // Bad frame from one peer must not hang it or end the
                    // round; ack best-effort and keep the deadline running
                    if let Some(write_half) = write_half {
                        let _ = Box::new(TcpAck { stream: write_half }).ack().await;
                    }
                    warn!(%peer, "TcpCoordinatorBus::next_reply: discarded unusable reply connection");
                    continue;
                }
            }
        }
    }
}

/// Provider endpoint: connects to both coordinator listeners
pub struct TcpProviderBus {
    reply_addr: String,
    cmd_reader: BufReader<TcpStream>,
    exchange: Option<BufReader<OwnedReadHalf>>,
}

impl TcpProviderBus {
    /// Connect to the coordinator's broadcast endpoint
    ///
    /// The reply endpoint is dialed lazily, once per answer.
    pub async fn connect(broadcast_addr: &str, reply_addr: &str) -> Result<Self, BusError> {
        let stream = TcpStream::connect(broadcast_addr).await.map_err(|source| BusError::Connect {
            addr: broadcast_addr.to_string(),
            source,
        })?;
        debug!(broadcast = broadcast_addr, "TcpProviderBus::connect: subscribed");

        Ok(Self {
            reply_addr: reply_addr.to_string(),
            cmd_reader: BufReader::new(stream),
            exchange: None,
        })
    }
}

#[async_trait]
impl ProviderBus for TcpProviderBus {
    async fn next_command(&mut self) -> Result<String, BusError> {
        match read_frame(&mut self.cmd_reader).await? {
            Some(command) => {
                debug!(%command, "TcpProviderBus::next_command: received");
                Ok(command)
            }
            None => Err(BusError::Closed),
        }
    }

    async fn send_reply(&mut self, reply: &ProviderReply) -> Result<(), BusError> {
        let frame = serde_json::to_string(reply)?;

        let stream = TcpStream::connect(&self.reply_addr).await.map_err(|source| BusError::Connect {
            addr: self.reply_addr.clone(),
            source,
        })?;
        let (read_half, mut write_half) = stream.into_split();

        write_half.write_all(frame.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;
        debug!(provider = %reply.provider_name, count = reply.count, "TcpProviderBus::send_reply: sent");

        self.exchange = Some(BufReader::new(read_half));
        Ok(())
    }

    async fn await_ack(&mut self, wait: Option<Duration>) -> Result<AckWait, BusError> {
        let mut reader = self.exchange.take().ok_or(BusError::NoExchange)?;

        let frame = match wait {
            Some(wait) => match timeout(wait, read_frame(&mut reader)).await {
                Ok(result) => result?,
                Err(_) => return Ok(AckWait::TimedOut),
            },
            None => read_frame(&mut reader).await?,
        };

        match frame {
            // Any token completes the handshake; content is not interpreted
            Some(token) => {
                debug!(%token, "TcpProviderBus::await_ack: confirmed");
                Ok(AckWait::Confirmed)
            }
            None => Err(BusError::Closed),
        }
    }
}
