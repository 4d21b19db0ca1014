//! JSON-RPC over a Unix socket.
//!
//! ## Architecture
//!
//! - **Protocol (`protocol.rs`)**: request, response and error types.
//! - **Registry (`registry.rs`)**: name -> handler map and the `adapt` helper.
//! - **Dispatcher (`dispatcher.rs`)**: decodes a line and runs its handler.
//! - **Server (`server.rs`)**: socket lifecycle and per-connection tasks.
//! - **Client (`client.rs`)**: one-shot calls used by the CLI.
//! - **Methods (`builtin.rs`, `domain.rs`)**: administrative and session methods.

pub mod builtin;
pub mod client;
pub mod dispatcher;
pub mod domain;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::{is_server_running, ClientError, IpcClient};
pub use protocol::{ErrorObject, Request, Response};
pub use registry::{adapt, Handler, MethodRegistry};
pub use server::{ShutdownReport, SocketServer};
