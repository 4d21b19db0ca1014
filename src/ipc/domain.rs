//! Session-dependent methods, registered once the session is ready.
//!
//! While the session reloads they answer with the not-initialized error.

use super::protocol::ErrorObject;
use super::registry::{adapt, MethodRegistry};
use crate::peer::InputPeer;
use crate::session::{Identity, SessionSupervisor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Names of the methods installed by [`register_domain`].
pub const DOMAIN_METHODS: &[&str] = &["get_me", "resolve_peer"];

#[derive(Debug, Default, Deserialize)]
struct ResolvePeerParams {
    #[serde(default)]
    peer: String,
}

#[derive(Debug, Serialize)]
struct ResolvePeerResult {
    peer: String,
    input_peer: InputPeer,
}

pub fn register_domain(registry: &MethodRegistry, supervisor: Arc<SessionSupervisor>) {
    let me = Arc::clone(&supervisor);
    registry.register(
        "get_me",
        adapt(move |_: serde_json::Value| {
            let supervisor = Arc::clone(&me);
            async move {
                let session = supervisor.current_session()?;
                let identity: Identity = session.identity().await?;
                Ok::<_, ErrorObject>(identity)
            }
        }),
    );

    registry.register(
        "resolve_peer",
        adapt(move |params: ResolvePeerParams| {
            let supervisor = Arc::clone(&supervisor);
            async move {
                if params.peer.trim().is_empty() {
                    return Err(ErrorObject::invalid_params("peer is required"));
                }
                let input_peer = supervisor.resolve_peer(&params.peer).await?;
                Ok(ResolvePeerResult {
                    peer: params.peer,
                    input_peer,
                })
            }
        }),
    );
}
