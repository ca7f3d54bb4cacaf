//! Scripted peers for driving a relay over real sockets.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use shared_types::{AckToken, PeerRole};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use vr_01_transport::domain::wire::{
    self, Acknowledgement, EventDocument, Frame, Handshake, PROTOCOL_VERSION,
};
use vr_01_transport::{framed, FrameStream};

const MAX_FRAME: usize = 64 * 1024;

/// How long a scenario waits for something that should happen.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// How long a scenario waits to be sure something does not happen.
pub const QUIET: Duration = Duration::from_millis(300);

/// A VOEvent document with the given identity and role.
pub fn voevent(ivorn: &str, role: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<voe:VOEvent xmlns:voe="http://www.ivoa.net/xml/VOEvent/v2.0" ivorn="{ivorn}" role="{role}" version="2.0">
  <Who><AuthorIVORN>ivo://author.test/client</AuthorIVORN></Who>
  <What><Param name="mag" value="17.2"/></What>
</voe:VOEvent>"#
    )
}

/// Poll `check` until it holds or `wait` runs out.
pub async fn eventually(wait: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + wait;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// One end of a transport session, played by the test.
pub struct TestPeer {
    frames: FrameStream<TcpStream>,
    identity: String,
    remote: Handshake,
}

impl TestPeer {
    /// Connect and complete the handshake as `role`.
    pub async fn connect(addr: SocketAddr, identity: &str, role: PeerRole) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut frames = framed(stream, MAX_FRAME);

        let hello = Frame::Handshake(Handshake {
            origin: identity.to_string(),
            destination: None,
            role,
            version: PROTOCOL_VERSION.to_string(),
            timestamp: None,
        });
        frames.send(Bytes::from(wire::encode(&hello))).await?;

        let reply = match timeout(PATIENCE, frames.next()).await {
            Ok(Some(Ok(bytes))) => wire::decode(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?,
            Ok(Some(Err(e))) => return Err(e),
            Ok(None) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Err(_) => return Err(io::ErrorKind::TimedOut.into()),
        };
        let remote = match reply {
            Frame::Handshake(hs) => hs,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected handshake, got {}", other.kind()),
                ))
            }
        };

        Ok(Self {
            frames,
            identity: identity.to_string(),
            remote,
        })
    }

    /// The relay's side of the handshake.
    pub fn remote(&self) -> &Handshake {
        &self.remote
    }

    pub async fn send_raw(&mut self, body: impl Into<Bytes>) -> io::Result<()> {
        self.frames.send(body.into()).await
    }

    /// Submit an event and wait for its acknowledgement.
    pub async fn publish(&mut self, ivorn: &str, role: &str) -> Option<Acknowledgement> {
        self.send_raw(voevent(ivorn, role)).await.ok()?;
        self.next_ack().await
    }

    /// Next frame, or `None` on timeout or a closed connection.
    pub async fn next_frame(&mut self, wait: Duration) -> Option<Frame> {
        match timeout(wait, self.frames.next()).await {
            Ok(Some(Ok(bytes))) => wire::decode(&bytes).ok(),
            _ => None,
        }
    }

    /// Next acknowledgement, answering keep-alives on the way.
    pub async fn next_ack(&mut self) -> Option<Acknowledgement> {
        let deadline = Instant::now() + PATIENCE;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.next_frame(left).await? {
                Frame::Ack(ack) => return Some(ack),
                Frame::KeepAlive(_) => self.answer_keepalive().await.ok()?,
                _ => {}
            }
        }
    }

    /// Next forwarded event within `wait`. Each event is acknowledged and
    /// keep-alives are answered, the way a well-behaved subscriber does.
    pub async fn next_event(&mut self, wait: Duration) -> Option<EventDocument> {
        let deadline = Instant::now() + wait;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.next_frame(left).await? {
                Frame::Event(document) => {
                    let ack = Frame::ack(
                        &self.identity,
                        AckToken::for_ivorn(&document.ivorn),
                        None,
                    );
                    self.send_raw(wire::encode(&ack)).await.ok()?;
                    return Some(document);
                }
                Frame::KeepAlive(_) => self.answer_keepalive().await.ok()?,
                _ => {}
            }
        }
    }

    /// Every event that arrives within `wait`.
    pub async fn drain_events(&mut self, wait: Duration) -> Vec<EventDocument> {
        let deadline = Instant::now() + wait;
        let mut events = Vec::new();
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return events;
            }
            match self.next_event(left).await {
                Some(event) => events.push(event),
                None => return events,
            }
        }
    }

    /// Whether the relay closes the connection within `wait`, ignoring
    /// whatever it sends first.
    pub async fn closed_within(&mut self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match timeout(left, self.frames.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) => return true,
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    async fn answer_keepalive(&mut self) -> io::Result<()> {
        let reply = Frame::keepalive_ack(&self.identity);
        self.send_raw(wire::encode(&reply)).await
    }
}

/// A connection that sees EOF before any frame arrives.
pub async fn refused(addr: SocketAddr) -> bool {
    let Ok(stream) = TcpStream::connect(addr).await else {
        return true;
    };
    let mut frames = framed(stream, MAX_FRAME);
    matches!(
        timeout(PATIENCE, frames.next()).await,
        Ok(None) | Ok(Some(Err(_)))
    )
}
