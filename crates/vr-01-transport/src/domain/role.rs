//! Local session roles and what each may exchange.

use std::fmt;

use shared_types::PeerRole;

/// Direction of an outbound feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedDirection {
    /// Receive events from the remote broker.
    Subscribe,
    /// Push accepted events to the remote broker's author endpoint.
    Publish,
}

/// The part a session plays on this side of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    /// Inbound connection on the author endpoint.
    AuthorServer,
    /// Inbound connection on the subscriber endpoint.
    SubscriberServer,
    /// Outbound connection to a remote broker.
    UpstreamClient(FeedDirection),
}

impl SessionRole {
    /// Role this side declares in its handshake.
    pub fn declared_role(&self) -> PeerRole {
        match self {
            SessionRole::AuthorServer | SessionRole::SubscriberServer => PeerRole::Broker,
            SessionRole::UpstreamClient(FeedDirection::Subscribe) => PeerRole::Subscriber,
            SessionRole::UpstreamClient(FeedDirection::Publish) => PeerRole::Author,
        }
    }

    /// Whether a remote declaring `remote` may hold this session.
    pub fn accepts(&self, remote: PeerRole) -> bool {
        match self {
            SessionRole::AuthorServer => matches!(remote, PeerRole::Author | PeerRole::Broker),
            SessionRole::SubscriberServer => {
                matches!(remote, PeerRole::Subscriber | PeerRole::Broker)
            }
            SessionRole::UpstreamClient(FeedDirection::Subscribe) => {
                matches!(remote, PeerRole::Broker | PeerRole::Author)
            }
            SessionRole::UpstreamClient(FeedDirection::Publish) => remote == PeerRole::Broker,
        }
    }

    /// Event frames from the remote are routed.
    pub fn receives_events(&self) -> bool {
        matches!(
            self,
            SessionRole::AuthorServer | SessionRole::UpstreamClient(FeedDirection::Subscribe)
        )
    }

    /// Forwarded events are written to the remote.
    pub fn sends_events(&self) -> bool {
        !self.receives_events()
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionRole::AuthorServer => "author-server",
            SessionRole::SubscriberServer => "subscriber-server",
            SessionRole::UpstreamClient(FeedDirection::Subscribe) => "upstream-subscribe",
            SessionRole::UpstreamClient(FeedDirection::Publish) => "upstream-publish",
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
