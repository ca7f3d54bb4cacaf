use std::collections::HashSet;

use vr_01_transport::{PeerAuthorizer, PeerIdentity, SessionRole};

/// Admits only listed peer identities. An empty list admits every peer.
#[derive(Debug, Clone, Default)]
pub struct IdentityAllowList {
    allowed: HashSet<String>,
}

impl IdentityAllowList {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: identities
                .into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.trim().is_empty())
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl PeerAuthorizer for IdentityAllowList {
    fn authorize(&self, peer: &PeerIdentity, _role: SessionRole) -> Result<(), String> {
        if self.is_open() || self.allowed.contains(&peer.origin) {
            Ok(())
        } else {
            Err(format!("identity {} is not on the allow-list", peer.origin))
        }
    }
}
