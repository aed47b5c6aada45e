use async_trait::async_trait;
use cachemesh_core::{Endpoint, TopologySnapshot};
use std::io;
use tracing::{debug, warn};

use super::MembershipSource;
use crate::errors::{CacheError, Result};

/// Membership resolved from DNS names on every lookup
///
/// Each configured `host:port` may resolve to several addresses; all of them
/// become servers. Addresses of one name are sorted so that DNS round-robin
/// ordering does not look like a topology change. Names that fail to resolve
/// are skipped; the lookup only fails when none of them resolve.
#[derive(Debug, Clone)]
pub struct DnsMembership {
    names: Vec<Endpoint>,
}

impl DnsMembership {
    #[must_use]
    pub fn new(names: Vec<Endpoint>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl MembershipSource for DnsMembership {
    async fn lookup(&self, service: &str) -> Result<TopologySnapshot> {
        let mut resolved = Vec::new();
        let mut failures = 0usize;

        for name in &self.names {
            match tokio::net::lookup_host((name.host(), name.port())).await {
                Ok(addrs) => {
                    let mut addrs: Vec<Endpoint> = addrs.map(Endpoint::from).collect();
                    addrs.sort();
                    for addr in addrs {
                        if !resolved.contains(&addr) {
                            resolved.push(addr);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(service, name = %name, error = %e, "Could not resolve cache server");
                }
            }
        }

        if failures > 0 && failures == self.names.len() {
            return Err(CacheError::discovery(
                service,
                io::Error::new(io::ErrorKind::NotFound, "no cache server name resolved"),
            ));
        }

        debug!(service, servers = resolved.len(), "Resolved cache servers");
        Ok(TopologySnapshot::new(resolved))
    }
}
