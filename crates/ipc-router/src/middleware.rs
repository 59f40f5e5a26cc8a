//! Middleware composition
//!
//! A route is a terminal handler wrapped by an ordered list of middleware.
//! `compose` folds the list once, at registration, into a single handler:
//! the first middleware is outermost and the terminal handler innermost.
//! Every stage is a boxed future, so sync and async stages compose the same
//! way and each stage is awaited before its caller continues.

use crate::context::InvocationContext;
use crate::error::IpcResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// A compiled, callable handler (terminal or composed)
pub type BoxedHandler =
    Arc<dyn Fn(InvocationContext, Value) -> BoxFuture<'static, IpcResult> + Send + Sync>;

/// A middleware stage
pub type Middleware =
    Arc<dyn Fn(InvocationContext, Value, Next) -> BoxFuture<'static, IpcResult> + Send + Sync>;

/// The remainder of the chain as seen from one middleware
#[derive(Clone)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    /// Invoke the remaining middleware and the terminal handler
    pub fn run(self, ctx: InvocationContext, args: Value) -> BoxFuture<'static, IpcResult> {
        (self.inner)(ctx, args)
    }
}

/// Lift an async closure into a terminal handler
pub fn handler_fn<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(InvocationContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IpcResult> + Send + 'static,
{
    Arc::new(move |ctx, args| f(ctx, args).boxed())
}

/// Lift an async closure into a middleware stage
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(InvocationContext, Value, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IpcResult> + Send + 'static,
{
    Arc::new(move |ctx, args, next| f(ctx, args, next).boxed())
}

/// Fold `middlewares` around `handler`.
///
/// With no middleware the returned handler is `handler` itself.
pub fn compose(middlewares: &[Middleware], handler: BoxedHandler) -> BoxedHandler {
    middlewares.iter().rev().fold(handler, |next, middleware| {
        let middleware = Arc::clone(middleware);
        let composed: BoxedHandler = Arc::new(move |ctx: InvocationContext, args: Value| {
            let next = Next {
                inner: Arc::clone(&next),
            };
            middleware(ctx, args, next)
        });
        composed
    })
}
