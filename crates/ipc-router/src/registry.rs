//! Route registry and dispatcher
//!
//! # Lifecycle
//!
//! 1. The host constructs one `IpcRouter` over a transport (and optionally a
//!    session store) at startup.
//! 2. Route modules are registered; each registration compiles its
//!    middleware chain once and installs one transport listener.
//! 3. After startup the route table is only read. Each inbound call gets a
//!    fresh context, a best-effort session lookup, and then runs the
//!    compiled chain. Handler results and errors pass through untouched.
//!
//! There is no unregister; routes live as long as the router.

use crate::channel::{ChannelName, RouteDescriptor};
use crate::context::{InvocationContext, NoopReply, ReplyHandle, SenderId};
use crate::error::{GeneratorError, IpcResult, RegistryError};
use crate::generator::{self, GeneratedArtifacts, GeneratorConfig, PreloadArtifacts};
use crate::middleware::{compose, BoxedHandler, Middleware};
use crate::namespace::{build_namespace_tree, NamespaceTree};
use crate::schema::ModuleSchema;
use crate::session::{extract_token, SessionStore};
use crate::transport::{unknown_channel, InboundCall, Listener, Transport};
use futures::FutureExt;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

static NO_SCHEMA: ModuleSchema = ModuleSchema::None;

/// Session store shared by the router and every listener it installed,
/// read at call time
type StoreSlot = Arc<RwLock<Option<Arc<dyn SessionStore>>>>;

/// Outcome of a `register` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The channel already had a route; nothing was changed
    AlreadyRegistered,
}

struct Route {
    descriptor: RouteDescriptor,
    handler: BoxedHandler,
}

/// Live view of the registered channel set.
///
/// Handlers that serve the namespace hold one of these; every `tree()`
/// call reflects the routes registered up to that moment.
#[derive(Clone, Default)]
pub struct NamespaceHandle {
    channels: Arc<RwLock<BTreeSet<String>>>,
}

impl NamespaceHandle {
    pub fn tree(&self) -> NamespaceTree {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        build_namespace_tree(channels.iter().map(String::as_str))
    }

    fn insert(&self, channel: &str) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.insert(channel.to_string());
    }
}

pub struct IpcRouter {
    transport: Arc<dyn Transport>,
    session_store: StoreSlot,
    routes: BTreeMap<String, Route>,
    modules: BTreeMap<String, ModuleSchema>,
    namespace: NamespaceHandle,
}

impl IpcRouter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            session_store: StoreSlot::default(),
            routes: BTreeMap::new(),
            modules: BTreeMap::new(),
            namespace: NamespaceHandle::default(),
        }
    }

    /// Attach the session store. Applies to routes registered before and after.
    pub fn with_session_store(self, store: Arc<dyn SessionStore>) -> Self {
        *self.session_store.write().unwrap_or_else(|e| e.into_inner()) = Some(store);
        self
    }

    /// Register a route without schema information
    pub fn register(
        &mut self,
        descriptor: RouteDescriptor,
        middlewares: &[Middleware],
        handler: BoxedHandler,
    ) -> Result<Registration, RegistryError> {
        self.register_with_schema(descriptor, ModuleSchema::None, middlewares, handler)
    }

    /// Register a route and declare its module's schema.
    ///
    /// The first non-empty schema declared for a module is authoritative.
    pub fn register_with_schema(
        &mut self,
        descriptor: RouteDescriptor,
        schema: ModuleSchema,
        middlewares: &[Middleware],
        handler: BoxedHandler,
    ) -> Result<Registration, RegistryError> {
        let channel = descriptor.channel.clone();

        if self.routes.contains_key(channel.as_str()) {
            tracing::warn!(
                op = "ipc.register.duplicate",
                channel = %channel,
                "Channel already registered, keeping the original route"
            );
            return Ok(Registration::AlreadyRegistered);
        }

        if let Some(existing) = self.conflicting_channel(&channel) {
            return Err(RegistryError::PrefixConflict {
                channel: channel.to_string(),
                existing,
            });
        }

        let handler = compose(middlewares, handler);
        let listener = self.listener_for(&channel, handler.clone());
        self.transport.handle(channel.as_str(), listener)?;

        self.declare_module(&descriptor.source_module, schema);

        tracing::info!(
            op = "ipc.register",
            channel = %channel,
            module = %descriptor.source_module,
            middlewares = middlewares.len(),
            "Route registered"
        );

        self.namespace.insert(channel.as_str());
        self.routes
            .insert(channel.to_string(), Route { descriptor, handler });
        Ok(Registration::Registered)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.routes.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered channels, sorted
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Route descriptors, sorted by channel
    pub fn descriptors(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.values().map(|route| &route.descriptor)
    }

    pub fn module_schema(&self, source_module: &str) -> &ModuleSchema {
        self.modules.get(source_module).unwrap_or(&NO_SCHEMA)
    }

    /// Namespace tree of the current route set, rebuilt on every call
    pub fn namespace_tree(&self) -> NamespaceTree {
        self.namespace.tree()
    }

    /// Handle that keeps following the route set after it is handed out
    pub fn namespace_handle(&self) -> NamespaceHandle {
        self.namespace.clone()
    }

    /// Dispatch a call in-process, bypassing the transport.
    ///
    /// Context construction is identical to a transport-delivered call.
    pub async fn invoke(&self, channel: &str, sender: SenderId, args: Value) -> IpcResult {
        let route = self
            .routes
            .get(channel)
            .ok_or_else(|| unknown_channel(channel))?;
        let store = current_store(&self.session_store);
        let ctx = build_context(
            &route.descriptor.channel,
            sender,
            Arc::new(NoopReply),
            &args,
            store.as_deref(),
        )
        .await;
        (route.handler)(ctx, args).await
    }

    /// Render the preload declaration file and namespace JSON in memory
    pub fn render_preload_types(&self) -> PreloadArtifacts {
        let routes: Vec<_> = self
            .descriptors()
            .map(|d| (d, self.module_schema(&d.source_module)))
            .collect();
        generator::render(&self.namespace_tree(), &routes)
    }

    /// Regenerate both preload artifacts on disk, overwriting previous output
    pub fn generate_preload_types(
        &self,
        config: &GeneratorConfig,
    ) -> Result<GeneratedArtifacts, GeneratorError> {
        generator::write_artifacts(config, &self.render_preload_types())
    }

    fn conflicting_channel(&self, channel: &ChannelName) -> Option<String> {
        self.routes
            .values()
            .map(|route| &route.descriptor.channel)
            .find(|existing| existing.is_prefix_of(channel) || channel.is_prefix_of(existing))
            .map(|existing| existing.to_string())
    }

    fn declare_module(&mut self, source_module: &str, schema: ModuleSchema) {
        let existing = self.modules.entry(source_module.to_string()).or_default();
        if *existing == ModuleSchema::None {
            *existing = schema;
        } else if schema != ModuleSchema::None && *existing != schema {
            tracing::warn!(
                op = "ipc.register.schema_conflict",
                module = %source_module,
                "Module schema already declared, keeping the first declaration"
            );
        }
    }

    fn listener_for(&self, channel: &ChannelName, handler: BoxedHandler) -> Listener {
        let channel = channel.clone();
        let slot = self.session_store.clone();

        Arc::new(move |call: InboundCall| {
            let channel = channel.clone();
            let handler = handler.clone();
            let store = current_store(&slot);

            async move {
                let InboundCall {
                    sender,
                    reply,
                    args,
                } = call;
                let ctx = build_context(&channel, sender, reply, &args, store.as_deref()).await;
                handler(ctx, args).await
            }
            .boxed()
        })
    }
}

fn current_store(slot: &StoreSlot) -> Option<Arc<dyn SessionStore>> {
    slot.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Build the per-call context. Session problems never fail the call.
async fn build_context(
    channel: &ChannelName,
    sender: SenderId,
    reply: Arc<dyn ReplyHandle>,
    args: &Value,
    store: Option<&dyn SessionStore>,
) -> InvocationContext {
    let mut ctx = InvocationContext::new(channel.as_str(), sender, reply);

    let Some(store) = store else {
        return ctx;
    };

    if let Some(access_token) = store.resolve_access_token(ctx.sender()).await {
        ctx = ctx.with_access_token(access_token);
    }

    if let Some(token) = extract_token(args) {
        match store.lookup(token).await {
            Some(session) if !session.is_expired() => {
                tracing::debug!(
                    op = "ipc.session.resolved",
                    channel = %channel,
                    user_id = %session.user_id,
                    "Session attached"
                );
                ctx = ctx.with_session(session);
            }
            Some(_) => {
                tracing::debug!(op = "ipc.session.expired", channel = %channel, "Session expired, continuing anonymously");
            }
            None => {
                tracing::debug!(op = "ipc.session.unresolved", channel = %channel, "Token did not resolve, continuing anonymously");
            }
        }
    }

    ctx
}
