//! # Corrupting Relay
//!
//! Sits on the sender's host between a WTP sender and receiver. The sender
//! is pointed at the relay instead of the receiver; the relay forwards its
//! datagrams (possibly corrupted) to the receiver and sends the receiver's
//! replies back.
//!
//! The sender's ephemeral port is only known once it has sent something,
//! so replies that arrive before that are dropped. Every sender datagram
//! re-learns the port: a sender that rebinds mid-transfer is followed, and
//! replies already in flight to the old port are lost.

use std::io;
use std::net::{IpAddr, SocketAddr};

use rand::Rng;
use tokio::net::UdpSocket;

use crate::corrupt::{Corruption, corrupt};

const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    /// Datagrams from this IP (any port) are treated as the sender's.
    pub sender_ip: IpAddr,
    pub receiver: SocketAddr,
    /// Probability of corrupting each sender datagram. `None` forwards verbatim.
    pub corrupt: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderPort {
    Unknown,
    Learned(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Empty,
    /// Receiver traffic before any sender datagram was seen.
    SenderUnknown,
    /// Neither the receiver nor the sender's IP.
    Stranger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ToSender(SocketAddr),
    ToReceiver(SocketAddr),
    Drop(DropReason),
}

/// Addressing state machine, independent of any socket.
#[derive(Debug, Clone)]
pub struct RelayState {
    sender_ip: IpAddr,
    receiver: SocketAddr,
    sender_port: SenderPort,
}

impl RelayState {
    pub fn new(sender_ip: IpAddr, receiver: SocketAddr) -> Self {
        Self {
            sender_ip,
            receiver,
            sender_port: SenderPort::Unknown,
        }
    }

    pub fn sender_port(&self) -> SenderPort {
        self.sender_port
    }

    pub fn route(&mut self, from: SocketAddr) -> Route {
        // Receiver first: on a shared host the receiver also matches sender_ip.
        if from == self.receiver {
            return match self.sender_port {
                SenderPort::Learned(port) => Route::ToSender(SocketAddr::new(self.sender_ip, port)),
                SenderPort::Unknown => Route::Drop(DropReason::SenderUnknown),
            };
        }

        if from.ip() == self.sender_ip {
            let learned = SenderPort::Learned(from.port());
            if self.sender_port != learned {
                tracing::info!(
                    previous = ?self.sender_port,
                    port = from.port(),
                    "learned sender port"
                );
                self.sender_port = learned;
            }
            return Route::ToReceiver(self.receiver);
        }

        Route::Drop(DropReason::Stranger)
    }
}

pub struct Relay<R> {
    socket: UdpSocket,
    state: RelayState,
    corrupt: Option<f64>,
    rng: R,
}

impl<R: Rng> Relay<R> {
    pub async fn bind(config: RelayConfig, rng: R) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.bind).await?;
        tracing::info!(
            bind = %socket.local_addr()?,
            sender_ip = %config.sender_ip,
            receiver = %config.receiver,
            corrupt = ?config.corrupt,
            "relay listening"
        );
        Ok(Self {
            socket,
            state: RelayState::new(config.sender_ip, config.receiver),
            corrupt: config.corrupt,
            rng,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Decide where a datagram goes, corrupting it in place when it is
    /// headed for the receiver.
    pub fn process(&mut self, datagram: &mut [u8], from: SocketAddr) -> Route {
        if datagram.is_empty() {
            return Route::Drop(DropReason::Empty);
        }

        let route = self.state.route(from);
        match route {
            Route::ToSender(_) => {}
            Route::ToReceiver(_) => {
                if let Some(p) = self.corrupt
                    && let Some(change) = corrupt(datagram, p, &mut self.rng)
                {
                    let Corruption { index, old, new } = change;
                    tracing::info!(index, old, new, "corrupted datagram");
                }
            }
            Route::Drop(reason) => tracing::trace!(%from, ?reason, "dropped datagram"),
        }
        route
    }

    /// Forward datagrams until the socket fails. Each datagram is handled to
    /// completion before the next receive.
    pub async fn run(mut self) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            let dest = match self.process(&mut buf[..len], from) {
                Route::ToSender(addr) | Route::ToReceiver(addr) => addr,
                Route::Drop(_) => continue,
            };
            if let Err(e) = self.socket.send_to(&buf[..len], dest).await {
                tracing::warn!(error = %e, %dest, "forward failed");
            }
        }
    }
}
