//! Client connection to the bus gateway.
//!
//! [`TcpTransport`] is the cheap, cloneable handle given to the registry: it
//! only pushes bytes into an unbounded queue. [`BusConnection`] owns the
//! other end of that queue together with the socket. While connected it
//! multiplexes three things on one task: reading chunks into the frame
//! decoder, draining the outbound queue and writing the optional keepalive.
//! A frame whose write fails is kept and written first on the next connection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use minido_app::decoder::FrameDecoder;
use minido_app::ports::{EventPublisher, HistoryStore, TransportBridge};
use minido_app::router::FrameRouter;
use minido_domain::error::MinidoError;

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Raw bytes written periodically when the keepalive is enabled.
pub const KEEPALIVE: [u8; 5] = [0x31, 0x00, 0x00, 0x01, 0x00];

const READ_CHUNK: usize = 256;

/// Outbound handle implementing [`TransportBridge`].
#[derive(Debug, Clone)]
pub struct TcpTransport {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

/// Receiving end of the outbound queue, consumed by [`BusConnection`].
#[derive(Debug)]
pub struct Outbound {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl TcpTransport {
    /// Create the queue shared by the transport handle and the connection.
    #[must_use]
    pub fn channel() -> (Self, Outbound) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, Outbound { receiver })
    }
}

impl TransportBridge for TcpTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), MinidoError> {
        self.sender
            .send(bytes)
            .map_err(|_| TransportError::QueueClosed.into())
    }
}

/// Long-running connection task.
pub struct BusConnection<H, T, P> {
    config: TransportConfig,
    outbound: Outbound,
    unsent: Option<Vec<u8>>,
    router: FrameRouter<H, T, P>,
}

impl<H, T, P> BusConnection<H, T, P>
where
    H: HistoryStore,
    T: TransportBridge,
    P: EventPublisher,
{
    pub fn new(config: TransportConfig, outbound: Outbound, router: FrameRouter<H, T, P>) -> Self {
        Self {
            config,
            outbound,
            unsent: None,
            router,
        }
    }

    /// Connect, serve until the connection drops, wait, and start over. Never returns.
    pub async fn run(mut self) {
        let delay = self.config.reconnect_delay();
        loop {
            match TcpStream::connect(&self.config.address).await {
                Ok(stream) => {
                    tracing::info!(address = %self.config.address, "connected to bus gateway");
                    match self.serve(stream).await {
                        Ok(()) => tracing::warn!(address = %self.config.address, "bus gateway closed the connection"),
                        Err(error) => tracing::warn!(address = %self.config.address, %error, "bus connection lost"),
                    }
                }
                Err(error) => {
                    tracing::warn!(address = %self.config.address, %error, "cannot reach bus gateway");
                }
            }
            tracing::debug!(delay_secs = delay.as_secs(), "reconnecting after delay");
            tokio::time::sleep(delay).await;
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> Result<(), TransportError> {
        let (mut reader, mut writer) = stream.into_split();
        let mut decoder = FrameDecoder::new();
        let mut keepalive = self.config.keepalive().map(keepalive_interval);
        let mut chunk = [0_u8; READ_CHUNK];

        if let Some(bytes) = self.unsent.take() {
            tracing::debug!(len = bytes.len(), "writing frame left over from previous connection");
            write_frame(&mut writer, &mut self.unsent, bytes).await?;
        }

        loop {
            tokio::select! {
                read = reader.read(&mut chunk) => {
                    let count = read?;
                    if count == 0 {
                        return Ok(());
                    }
                    for frame in decoder.push(&chunk[..count]) {
                        let routed = self.router.dispatch(&frame);
                        tracing::trace!(dest = frame.dest, src = frame.src, command = frame.command, ?routed, "frame routed");
                    }
                }
                Some(bytes) = self.outbound.receiver.recv() => {
                    tracing::trace!(len = bytes.len(), "writing frame");
                    write_frame(&mut writer, &mut self.unsent, bytes).await?;
                }
                () = tick(keepalive.as_mut()) => {
                    tracing::trace!("writing keepalive");
                    writer.write_all(&KEEPALIVE).await?;
                }
            }
        }
    }
}

/// Write `bytes`, parking them in `unsent` when the write fails.
async fn write_frame<W>(
    writer: &mut W,
    unsent: &mut Option<Vec<u8>>,
    bytes: Vec<u8>,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if let Err(error) = writer.write_all(&bytes).await {
        *unsent = Some(bytes);
        return Err(error.into());
    }
    Ok(())
}

fn keepalive_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
