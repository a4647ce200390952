//! Request Router
//!
//! The single boundary through which the presentation layer reaches host
//! capabilities. Handlers are registered declaratively under a channel name;
//! `dispatch` always resolves to a [`CommandResponse`], whatever happens
//! inside the handler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::response::CommandResponse;
use crate::utils::error::{AppError, AppResult};

type Handler<C> = Box<dyn Fn(Arc<C>, Value) -> BoxFuture<'static, AppResult<Value>> + Send + Sync>;

/// Channel registry over a shared context `C`.
pub struct RequestRouter<C> {
    context: Arc<C>,
    handlers: HashMap<String, Handler<C>>,
}

impl<C: Send + Sync + 'static> RequestRouter<C> {
    pub fn new(context: Arc<C>) -> Self {
        Self {
            context,
            handlers: HashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Register a handler for `channel`.
    ///
    /// Registering a channel twice is a programming error: it is logged,
    /// reported, and the first handler stays in place.
    pub fn route<A, O, F, Fut>(&mut self, channel: &str, handler: F) -> AppResult<()>
    where
        A: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(Arc<C>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<O>> + Send + 'static,
    {
        if self.handlers.contains_key(channel) {
            tracing::error!(channel = %channel, "channel registered twice; keeping the first handler");
            return Err(AppError::DuplicateChannel(channel.to_string()));
        }

        let handler = Arc::new(handler);
        let channel_name = channel.to_string();
        let erased: Handler<C> = Box::new(
            move |context: Arc<C>, payload: Value| -> BoxFuture<'static, AppResult<Value>> {
                let handler = Arc::clone(&handler);
                let channel_name = channel_name.clone();
                Box::pin(async move {
                    let args: A = decode_args(payload).map_err(|e| {
                        AppError::validation(format!(
                            "invalid arguments for '{}': {}",
                            channel_name, e
                        ))
                    })?;
                    let output = handler(context, args).await?;
                    Ok(serde_json::to_value(output)?)
                })
            },
        );
        self.handlers.insert(channel.to_string(), erased);
        Ok(())
    }

    /// Invoke the handler of `channel` with a JSON payload.
    ///
    /// The handler runs on its own task so a panic is reported as an error
    /// envelope instead of unwinding into the caller.
    pub async fn dispatch(&self, channel: &str, payload: Value) -> CommandResponse<Value> {
        let Some(handler) = self.handlers.get(channel) else {
            tracing::warn!(channel = %channel, "unknown channel");
            return CommandResponse::err(AppError::UnknownChannel(channel.to_string()).to_string());
        };

        let future = handler(Arc::clone(&self.context), payload);
        let response = match tokio::spawn(future).await {
            Ok(result) => CommandResponse::from(result),
            Err(e) if e.is_panic() => {
                CommandResponse::err(AppError::internal(format!("handler for '{}' panicked", channel)).to_string())
            }
            Err(e) => CommandResponse::err(AppError::internal(e.to_string()).to_string()),
        };

        if let Some(error) = response.error() {
            tracing::warn!(channel = %channel, "channel failed: {}", error);
        }
        response
    }

    /// Registered channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.handlers.keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }
}

/// Decode handler arguments. A missing payload also satisfies argument
/// structs whose fields all have defaults.
fn decode_args<A: DeserializeOwned>(payload: Value) -> Result<A, serde_json::Error> {
    match payload {
        Value::Null => serde_json::from_value(Value::Null)
            .or_else(|_| serde_json::from_value(Value::Object(serde_json::Map::new()))),
        other => serde_json::from_value(other),
    }
}

impl<C> std::fmt::Debug for RequestRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("channels", &self.handlers.len())
            .finish()
    }
}
