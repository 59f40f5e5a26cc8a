//! Auth routes
//!
//! Handles: auth:login, auth:logout, auth:session
//!
//! `auth:login` is a handoff, not a credential check: the UI signs in
//! against the clinic backend and passes the resulting `accessToken`. The
//! host mints a local session around that token and binds it to the
//! calling window. Passwords never reach this process, and sessions carry
//! no roles until the backend token is verified by whatever consumes it.

use super::{optional_str, payload, required_str};
use crate::session_store::MemorySessionStore;
use ipc_router::{
    handler_fn, layers, Field, IpcRouter, ModuleSchema, RegistryError, RouteDescriptor, SchemaPair, Session,
    TypeSchema,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn register(router: &mut IpcRouter, sessions: Arc<MemorySessionStore>) -> Result<(), RegistryError> {
    let schema = schema();

    let store = sessions.clone();
    router.register_with_schema(
        RouteDescriptor::from_channel("auth:login")?,
        schema.clone(),
        &[layers::logging()],
        handler_fn(move |ctx, args| {
            let store = store.clone();
            async move {
                let p = payload(&args);
                let username = required_str(p, "username")?;
                let access_token = required_str(p, "accessToken")?.to_string();

                store.bind_access_token(ctx.sender(), access_token.clone());
                let session = store.create(
                    username,
                    optional_str(p, "displayName").map(str::to_string),
                    Vec::new(),
                    Some(access_token),
                );

                Ok(json!({
                    "token": session.token,
                    "userId": session.user_id,
                    "displayName": session.display_name,
                    "roles": session.roles,
                    "expiresAt": session.expires_at.to_rfc3339(),
                }))
            }
        }),
    )?;

    let store = sessions;
    router.register_with_schema(
        RouteDescriptor::from_channel("auth:logout")?,
        schema.clone(),
        &[layers::logging(), layers::require_session()],
        handler_fn(move |ctx, _args| {
            let store = store.clone();
            async move {
                let revoked = match ctx.session() {
                    Some(session) => store.revoke(&session.token),
                    None => false,
                };
                store.unbind_access_token(ctx.sender());
                Ok(json!({ "revoked": revoked }))
            }
        }),
    )?;

    router.register_with_schema(
        RouteDescriptor::from_channel("auth:session")?,
        schema,
        &[layers::logging()],
        handler_fn(|ctx, _args| async move { Ok(ctx.session().map(session_view).unwrap_or(Value::Null)) }),
    )?;

    Ok(())
}

fn session_view(session: &Session) -> Value {
    json!({
        "userId": session.user_id,
        "displayName": session.display_name,
        "roles": session.roles,
        "expiresAt": session.expires_at.to_rfc3339(),
    })
}

fn session_shape() -> Vec<Field> {
    vec![
        Field::required("userId", TypeSchema::String),
        Field::required("displayName", TypeSchema::nullable(TypeSchema::String)),
        Field::required("roles", TypeSchema::array(TypeSchema::String)),
        Field::required("expiresAt", TypeSchema::String),
    ]
}

fn schema() -> ModuleSchema {
    let mut login_result = vec![Field::required("token", TypeSchema::String)];
    login_result.extend(session_shape());

    ModuleSchema::per_operation([
        (
            "login",
            SchemaPair::new(
                TypeSchema::object([
                    Field::required("username", TypeSchema::String),
                    Field::required("accessToken", TypeSchema::String),
                    Field::optional("displayName", TypeSchema::String),
                ]),
                TypeSchema::object(login_result),
            ),
        ),
        (
            "logout",
            SchemaPair::new(
                TypeSchema::object([Field::required("token", TypeSchema::String)]),
                TypeSchema::object([Field::required("revoked", TypeSchema::Boolean)]),
            ),
        ),
        (
            "session",
            SchemaPair::new(
                TypeSchema::object([Field::optional("token", TypeSchema::String)]),
                TypeSchema::nullable(TypeSchema::object(session_shape())),
            ),
        ),
    ])
}
