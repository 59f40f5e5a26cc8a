//! IPC introspection
//!
//! Handles: ipc:namespace

use ipc_router::{handler_fn, IpcRouter, ModuleSchema, RegistryError, RouteDescriptor, SchemaPair, TypeSchema};

/// Register `ipc:namespace`. The tree is recomputed from the live route set
/// on every call, so routes registered afterwards show up too.
pub fn register(router: &mut IpcRouter) -> Result<(), RegistryError> {
    let namespace = router.namespace_handle();

    router.register_with_schema(
        RouteDescriptor::from_channel("ipc:namespace")?,
        ModuleSchema::Single(SchemaPair::new(TypeSchema::Null, TypeSchema::record(TypeSchema::Unknown))),
        &[],
        handler_fn(move |_ctx, _args| {
            let tree = namespace.tree().to_json();
            async move { Ok(tree) }
        }),
    )?;

    Ok(())
}
