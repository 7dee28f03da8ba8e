//! Command registry: command name to handler, built once at startup.
//!
//! Registration is explicit — the registry is constructed with a builder
//! and handed to the listener by value. There is no reflection, no
//! decorators, and no runtime re-registration. Registering two handlers
//! under the same name is a startup-time configuration error.

use crate::errors::{HandlerError, RpcError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Transport-level metadata handed to a handler alongside its payload.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Command name that routed here.
    pub command: String,
    /// Correlation id of the request being handled.
    pub correlation_id: String,
    /// Destination the request arrived on.
    pub inbound_destination: String,
}

/// A registered command handler.
///
/// Receives the decoded payload and returns a result or a typed failure.
/// Handlers may suspend on downstream I/O; the listener never requires
/// synchronous completion.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle one command invocation.
    ///
    /// # Errors
    ///
    /// Returns a `HandlerError` that travels back to the caller in an error
    /// reply; it never terminates the consume loop.
    async fn handle(&self, ctx: HandlerContext, payload: Value) -> Result<Value, HandlerError>;
}

/// Wrap an async closure as a [`CommandHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(HandlerContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(HandlerContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: HandlerContext, payload: Value) -> Result<Value, HandlerError> {
        (self.f)(ctx, payload).await
    }
}

/// Immutable command-name-to-handler map.
///
/// Built once via [`CommandRegistryBuilder`], read-only thereafter. A
/// lookup miss is a distinct failure mode handled by the listener, never a
/// silent no-op.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    /// Look up the handler for a command name (exact match).
    #[must_use]
    pub fn get(&self, command: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(command)
    }

    /// Registered command names, for startup logging.
    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Builder for [`CommandRegistry`].
#[derive(Default)]
pub struct CommandRegistryBuilder {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistryBuilder {
    /// Register a handler under an exact command name.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::DuplicateCommand` if the name is already taken.
    pub fn register(
        mut self,
        command: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<Self, RpcError> {
        let command = command.into();
        if self.handlers.contains_key(&command) {
            return Err(RpcError::DuplicateCommand(command));
        }
        self.handlers.insert(command, handler);
        Ok(self)
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_handler() -> Arc<dyn CommandHandler> {
        handler_fn(|_ctx, payload| async move { Ok(payload) })
    }

    #[tokio::test]
    async fn test_registered_handler_is_invoked() {
        let registry = CommandRegistry::builder()
            .register("echo", echo_handler())
            .unwrap()
            .build();

        let handler = registry.get("echo").expect("handler should be registered");
        let ctx = HandlerContext {
            command: "echo".to_string(),
            correlation_id: "corr-1".to_string(),
            inbound_destination: "test.commands".to_string(),
        };

        let result = handler.handle(ctx, json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let registry = CommandRegistry::builder().build();
        assert!(registry.get("does-not-exist").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration_is_a_build_error() {
        let result = CommandRegistry::builder()
            .register("create-rider", echo_handler())
            .unwrap()
            .register("create-rider", echo_handler());

        assert!(matches!(
            result,
            Err(RpcError::DuplicateCommand(name)) if name == "create-rider"
        ));
    }

    #[test]
    fn test_exact_name_match_only() {
        let registry = CommandRegistry::builder()
            .register("get-rider", echo_handler())
            .unwrap()
            .build();

        assert!(registry.get("get-rider").is_some());
        assert!(registry.get("get-Rider").is_none());
        assert!(registry.get("get-rider ").is_none());
    }

    #[tokio::test]
    async fn test_handler_error_propagates_as_value() {
        let registry = CommandRegistry::builder()
            .register(
                "always-fails",
                handler_fn(|_ctx, _payload| async move {
                    Err(HandlerError::internal("nope"))
                }),
            )
            .unwrap()
            .build();

        let handler = registry.get("always-fails").unwrap();
        let ctx = HandlerContext {
            command: "always-fails".to_string(),
            correlation_id: "corr-2".to_string(),
            inbound_destination: "test.commands".to_string(),
        };

        let err = handler.handle(ctx, json!({})).await.unwrap_err();
        assert_eq!(err.kind, "internal");
    }

    #[test]
    fn test_command_names_listed() {
        let registry = CommandRegistry::builder()
            .register("a", echo_handler())
            .unwrap()
            .register("b", echo_handler())
            .unwrap()
            .build();

        let mut names: Vec<&str> = registry.command_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }
}
