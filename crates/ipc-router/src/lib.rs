//! Clinic Desktop IPC Router
//!
//! Routes calls from the sandboxed UI process to handlers in the privileged
//! main process.
//!
//! # Architecture
//!
//! ```text
//! UI process ──(transport)──► listener ──► context + session lookup
//!                                              │
//!                                              ▼
//!                              middleware 1 ► ... ► handler
//! ```
//!
//! - `registry`: `IpcRouter`, the route table and per-call dispatch
//! - `middleware`: chain composition; `layers` holds the stock stages
//! - `context` / `session`: per-call context and the session boundary
//! - `namespace` / `generator`: the nested API surface and the preload
//!   declaration file derived from it
//! - `transport`: the wire boundary, with in-memory and stdio transports

pub mod channel;
pub mod context;
pub mod error;
pub mod generator;
pub mod layers;
pub mod middleware;
pub mod namespace;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transport;

pub use channel::{ChannelName, RouteDescriptor};
pub use context::{InvocationContext, NoopReply, ReplyHandle, SenderId};
pub use error::{GeneratorError, IpcError, IpcResult, RegistryError, TransportError};
pub use generator::{GeneratedArtifacts, GeneratorConfig, PreloadArtifacts};
pub use middleware::{compose, handler_fn, middleware_fn, BoxedHandler, Middleware, Next};
pub use namespace::{build_namespace_tree, NamespaceNode, NamespaceTree};
pub use registry::{IpcRouter, NamespaceHandle, Registration};
pub use schema::{Field, ModuleSchema, SchemaPair, SchemaResolution, TypeSchema};
pub use session::{extract_token, Session, SessionStore, UserIdentity};
pub use transport::{MemoryTransport, StdioTransport, Transport};
