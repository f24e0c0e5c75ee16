//! Request/response RPC over a shared filesystem mailbox.
//!
//! The transport doubles as the permission boundary: the sender identity on
//! each request comes from the datasite client that owns the mailbox write,
//! so handlers can derive roles from it without further authentication.
//!
//! Guarantees: at-least-once delivery with de-duplication by request id, no
//! per-endpoint ordering, silent drop of expired requests.

pub mod client;
pub mod mailbox;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use client::FileTransport;
pub use protocol::{
    endpoint, RpcRequest, RpcResponse, HEALTH_ENDPOINT, VERB_CREATE, VERB_DELETE, VERB_DELETE_ALL,
    VERB_GET_ALL, VERB_GET_ONE, VERB_UPDATE,
};
pub use registry::{EndpointHandler, EndpointRegistry, HandlerFuture};
pub use server::RpcServer;
pub use transport::{call_typed, MockTransport, RpcTransport, DEFAULT_EXPIRY};
