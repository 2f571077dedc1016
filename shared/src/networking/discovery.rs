//! Coordinator discovery over UDP multicast.
//!
//! The coordinator announces itself on a well-known group; whoever is
//! announcing is the coordinator. Only the datagram's source address matters,
//! the payload is informational.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4},
    ops::ControlFlow,
    time::Duration,
};

use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::{error::NetworkingError, result::NetworkingResult};

pub const DEFAULT_GROUP: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 0), 5000);
pub const ANNOUNCEMENT: &str = "mandelbrot-head-node";
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_DATAGRAM_SIZE: usize = 8192;

pub struct Broadcaster {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Broadcaster {
    /// Opens a socket connected to `target`, normally a multicast group.
    pub async fn connect(target: SocketAddr) -> NetworkingResult<Self> {
        let bind_addr: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Sends `message` every `interval` until `cancel` fires.
    ///
    /// Send failures are logged and retried on the next tick; multicast
    /// routes come and go with interfaces.
    pub async fn broadcast(
        &self,
        message: &str,
        interval: Duration,
        cancel: CancellationToken,
    ) -> NetworkingResult<()> {
        info!("Broadcasting on {}", self.target);
        let mut ticker = tokio::time::interval(interval);
        let mut sent = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Broadcast on {} stopped after {} announcements", self.target, sent);
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.socket.send(message.as_bytes()).await {
                        Ok(_) => sent += 1,
                        Err(e) => warn!("Failed to announce on {}: {}", self.target, e),
                    }
                }
            }
        }
    }
}

pub struct Listener {
    socket: UdpSocket,
}

impl Listener {
    /// Binds the group's port with address reuse, so several render nodes on
    /// one host can listen, and joins the group on the default interface.
    pub async fn join(group: SocketAddrV4) -> NetworkingResult<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, group.port())).into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket.join_multicast_v4(*group.ip(), Ipv4Addr::UNSPECIFIED)?;
        debug!("Joined multicast group {}", group);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> NetworkingResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Reads one datagram per wake until `stop` fires or `on_datagram`
    /// breaks. The handler gets the source, the byte count and the payload.
    pub async fn listen<F>(&self, stop: CancellationToken, mut on_datagram: F) -> NetworkingResult<()>
    where
        F: FnMut(SocketAddr, usize, &[u8]) -> ControlFlow<()>,
    {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                received = self.socket.recv_from(&mut buffer) => {
                    let (len, source) = received?;
                    if on_datagram(source, len, &buffer[..len]).is_break() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Waits for the first announcement on `group` and returns its sender's IP.
pub async fn discover_coordinator(group: SocketAddrV4, cancel: CancellationToken) -> NetworkingResult<IpAddr> {
    let listener = Listener::join(group).await?;
    info!("Waiting for a coordinator on {}", group);
    first_source(&listener, cancel).await
}

async fn first_source(listener: &Listener, cancel: CancellationToken) -> NetworkingResult<IpAddr> {
    let mut coordinator = None;
    listener
        .listen(cancel, |source, len, payload| {
            debug!(
                "Announcement from {} ({} bytes): {}",
                source,
                len,
                String::from_utf8_lossy(payload).trim_end()
            );
            coordinator = Some(source.ip());
            ControlFlow::Break(())
        })
        .await?;

    coordinator.ok_or(NetworkingError::DiscoveryCancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unicast loopback stands in for the group so the tests do not depend on
    // the host's multicast routing.
    async fn loopback_listener() -> Listener {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        Listener { socket }
    }

    #[tokio::test]
    async fn broadcaster_repeats_until_cancelled() {
        let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let broadcaster = Broadcaster::connect(receiver.local_addr().unwrap()).await.unwrap();
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                broadcaster
                    .broadcast(ANNOUNCEMENT, Duration::from_millis(10), cancel)
                    .await
            })
        };

        let mut buffer = [0u8; 64];
        for _ in 0..3 {
            let len = receiver.recv(&mut buffer).await.unwrap();
            assert_eq!(&buffer[..len], ANNOUNCEMENT.as_bytes());
        }

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn listener_reports_the_source_address() {
        let listener = loopback_listener().await;
        let target = listener.local_addr().unwrap();

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        sender.send_to(b"hello", target).await.unwrap();

        let ip = first_source(&listener, CancellationToken::new()).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn listener_keeps_reading_until_told_to_stop() {
        let listener = loopback_listener().await;
        let target = listener.local_addr().unwrap();
        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        for _ in 0..3 {
            sender.send_to(b"ping", target).await.unwrap();
        }

        let mut seen = 0;
        listener
            .listen(CancellationToken::new(), |_, len, _| {
                assert_eq!(len, 4);
                seen += 1;
                if seen == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
            .unwrap();
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn two_listeners_on_one_host_share_the_group() {
        let group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 0), 5177);
        let first = Listener::join(group).await.unwrap();
        let second = Listener::join(group).await.unwrap();

        let broadcaster = Broadcaster::connect(SocketAddr::V4(group)).await.unwrap();
        let cancel = CancellationToken::new();
        let announcing = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                broadcaster
                    .broadcast(ANNOUNCEMENT, Duration::from_millis(20), cancel)
                    .await
            })
        };

        let deadline = Duration::from_secs(5);
        let (a, b) = tokio::join!(
            tokio::time::timeout(deadline, first_source(&first, CancellationToken::new())),
            tokio::time::timeout(deadline, first_source(&second, CancellationToken::new()))
        );
        cancel.cancel();
        announcing.await.unwrap().unwrap();

        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn discover_coordinator_finds_the_announcer() {
        let group = SocketAddrV4::new(Ipv4Addr::new(239, 0, 0, 0), 5178);
        let broadcaster = Broadcaster::connect(SocketAddr::V4(group)).await.unwrap();
        let cancel = CancellationToken::new();
        let announcing = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                broadcaster
                    .broadcast(ANNOUNCEMENT, Duration::from_millis(20), cancel)
                    .await
            })
        };

        let found = tokio::time::timeout(
            Duration::from_secs(5),
            discover_coordinator(group, CancellationToken::new()),
        )
        .await
        .unwrap();
        cancel.cancel();
        announcing.await.unwrap().unwrap();

        assert!(found.unwrap().is_ipv4());
    }

    #[tokio::test]
    async fn cancelled_discovery_reports_no_coordinator() {
        let listener = loopback_listener().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            first_source(&listener, cancel).await,
            Err(NetworkingError::DiscoveryCancelled)
        ));
    }
}
