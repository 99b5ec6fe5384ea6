//! Cross-component tests: real peers, real channels, no mocks below the
//! channel port.

pub mod cycles;
pub mod flows;
pub mod properties;

use std::sync::Arc;

use graphwire::{MemoryChannel, Peer, RpcConfig, TypeRegistry};

/// A client and a server peer over a fresh memory channel pair.
pub fn peer_pair(types: Arc<TypeRegistry>, config: RpcConfig) -> (Arc<Peer>, Arc<Peer>) {
    let (left, right) = MemoryChannel::named_pair("client", "server");
    let client = Peer::new(Arc::new(left), types.clone(), config.clone())
        .unwrap_or_else(|e| panic!("client peer: {e}"));
    let server =
        Peer::new(Arc::new(right), types, config).unwrap_or_else(|e| panic!("server peer: {e}"));
    (Arc::new(client), Arc::new(server))
}
