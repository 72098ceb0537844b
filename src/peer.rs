//! Peer discovery and contact directory interfaces.
//!
//! Discovery (mDNS or otherwise) and persistent contact storage live in the
//! host application; the core consumes them through these traits. In-memory
//! implementations are provided for hosts that assemble their own lists and
//! for tests.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use crate::error::ChatError;

/// A peer advertised on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Advertised peer name.
    pub name: String,
    /// Network address.
    pub addr: IpAddr,
    /// TCP port the peer listens on.
    pub port: u16,
}

impl PeerInfo {
    pub fn new(name: impl Into<String>, addr: IpAddr, port: u16) -> Self {
        Self {
            name: name.into(),
            addr,
            port,
        }
    }

    /// The address to dial.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

/// Produces a snapshot of peers currently advertised on the local network,
/// excluding the local node itself.
pub trait PeerDiscovery: Send + Sync {
    fn discover(&self, local_name: &str) -> Vec<PeerInfo>;
}

/// Discovery over a fixed peer list.
#[derive(Debug, Default, Clone)]
pub struct StaticPeers {
    peers: Vec<PeerInfo>,
}

impl StaticPeers {
    pub fn new(peers: Vec<PeerInfo>) -> Self {
        Self { peers }
    }
}

impl PeerDiscovery for StaticPeers {
    fn discover(&self, local_name: &str) -> Vec<PeerInfo> {
        self.peers
            .iter()
            .filter(|p| p.name != local_name)
            .cloned()
            .collect()
    }
}

/// Looks up the pre-shared password for a contact.
pub trait ContactDirectory: Send + Sync {
    /// The password for `peer_name`, or [`ChatError::UnknownPeer`] if no
    /// password is on file.
    fn password_for(&self, peer_name: &str) -> Result<String, ChatError>;

    /// Whether `peer_name` is a known contact.
    fn is_contact(&self, peer_name: &str) -> bool {
        self.password_for(peer_name).is_ok()
    }
}

/// In-memory contact directory.
#[derive(Debug, Default, Clone)]
pub struct MemoryContacts {
    passwords: HashMap<String, String>,
}

impl MemoryContacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact with its pre-shared password.
    pub fn with_contact(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.passwords.insert(name.into(), password.into());
        self
    }
}

impl ContactDirectory for MemoryContacts {
    fn password_for(&self, peer_name: &str) -> Result<String, ChatError> {
        self.passwords
            .get(peer_name)
            .cloned()
            .ok_or_else(|| ChatError::UnknownPeer(peer_name.to_string()))
    }
}

/// Discovery snapshot filtered to known contacts.
pub fn discover_contacts<D, C>(discovery: &D, contacts: &C, local_name: &str) -> Vec<PeerInfo>
where
    D: PeerDiscovery + ?Sized,
    C: ContactDirectory + ?Sized,
{
    discovery
        .discover(local_name)
        .into_iter()
        .filter(|p| contacts.is_contact(&p.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers() -> StaticPeers {
        StaticPeers::new(vec![
            PeerInfo::new("alice", "10.0.0.1".parse().unwrap(), 8080),
            PeerInfo::new("bob", "10.0.0.2".parse().unwrap(), 8080),
            PeerInfo::new("mallory", "10.0.0.3".parse().unwrap(), 8080),
        ])
    }

    #[test]
    fn test_discovery_excludes_local_node() {
        let found = peers().discover("alice");

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.name != "alice"));
    }

    #[test]
    fn test_unknown_peer_has_no_password() {
        let contacts = MemoryContacts::new().with_contact("bob", "hunter2");

        assert_eq!(contacts.password_for("bob").unwrap(), "hunter2");
        assert!(matches!(
            contacts.password_for("mallory"),
            Err(ChatError::UnknownPeer(_))
        ));
    }

    #[test]
    fn test_discover_contacts_filters_strangers() {
        let contacts = MemoryContacts::new().with_contact("bob", "hunter2");

        let found = discover_contacts(&peers(), &contacts, "alice");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "bob");
    }
}
