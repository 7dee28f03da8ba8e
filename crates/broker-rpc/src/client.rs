//! Client proxy: turns `(command, payload)` into a correlated message
//! exchange over the broker.
//!
//! Each proxy targets one service's inbound destination and owns a private
//! reply destination plus the pending-call table. A background task
//! demultiplexes replies to their pending calls by correlation id; a
//! `oneshot` channel per call guarantees exactly one resolution (success,
//! error, or timeout).
//!
//! Timing out a call cancels *waiting* only — work already dispatched to
//! the remote handler keeps running, and its late reply is discarded here.
//! The proxy holds no retry logic; only the caller knows whether a command
//! is safely re-issuable.

use crate::envelope::{self, Envelope, ReplyStatus};
use crate::errors::{HandlerError, RpcError, UNKNOWN_COMMAND_KIND};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before the reply task retries a failed subscription.
const RESUBSCRIBE_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Cap on the resubscribe backoff.
const RESUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Pending-call table: correlation id to result channel.
type PendingCalls = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, RpcError>>>>>;

/// Client proxy bound to one target service.
pub struct CommandClient {
    transport: Arc<dyn Transport>,
    target_destination: String,
    reply_destination: String,
    default_timeout: Duration,
    pending: PendingCalls,
    cancel: CancellationToken,
}

impl CommandClient {
    /// Create a proxy for `target_destination` and start its reply task.
    ///
    /// The reply subscription is established before this returns, so a
    /// reply to the very first `send` cannot be lost.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` if the reply subscription cannot be
    /// established.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        target_destination: impl Into<String>,
        default_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let target_destination = target_destination.into();

        let suffix = uuid::Uuid::new_v4().to_string();
        let short_suffix = suffix.get(..8).unwrap_or("00000000");
        let reply_destination = format!("{target_destination}.reply.{short_suffix}");

        let subscription = transport.subscribe(&reply_destination).await?;

        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        tokio::spawn(run_reply_task(
            Arc::clone(&transport),
            subscription,
            reply_destination.clone(),
            Arc::clone(&pending),
            cancel.clone(),
        ));

        info!(
            target: "rpc.client",
            target_destination = %target_destination,
            reply_destination = %reply_destination,
            "Client proxy connected"
        );

        Ok(Self {
            transport,
            target_destination,
            reply_destination,
            default_timeout,
            pending,
            cancel,
        })
    }

    /// The private destination this proxy receives replies on.
    #[must_use]
    pub fn reply_destination(&self) -> &str {
        &self.reply_destination
    }

    /// Issue a command with the proxy's default timeout.
    ///
    /// # Errors
    ///
    /// See [`CommandClient::send_with_timeout`].
    pub async fn send(&self, command: &str, payload: Value) -> Result<Value, RpcError> {
        self.send_with_timeout(command, payload, self.default_timeout)
            .await
    }

    /// Issue a command and wait for its reply or the deadline.
    ///
    /// Concurrent sends on the same proxy are independent: each gets its
    /// own correlation id and timeout.
    ///
    /// # Errors
    ///
    /// - `RpcError::Transport` — the request could not be published.
    /// - `RpcError::Timeout` — no reply within `timeout`; a late reply is
    ///   discarded.
    /// - `RpcError::UnknownCommand` — the remote has no handler for this
    ///   command.
    /// - `RpcError::Remote` — the remote handler failed.
    pub async fn send_with_timeout(
        &self,
        command: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(correlation_id.clone(), tx);
        }

        let request = Envelope::request(&correlation_id, command, payload, &self.reply_destination);
        let bytes = envelope::encode(&request)?;

        if let Err(e) = self.transport.publish(&self.target_destination, &bytes).await {
            // Never leave a pending call that can no longer be resolved.
            let mut pending = self.pending.lock().await;
            pending.remove(&correlation_id);
            return Err(e);
        }

        debug!(
            target: "rpc.client",
            command = %command,
            correlation_id = %correlation_id,
            "Request published"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => Err(RpcError::ChannelClosed),
            Err(_elapsed) => {
                // Cancel waiting only; the remote handler may still finish
                // and its late reply will be discarded by the reply task.
                let mut pending = self.pending.lock().await;
                pending.remove(&correlation_id);

                warn!(
                    target: "rpc.client",
                    command = %command,
                    correlation_id = %correlation_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Call timed out"
                );

                Err(RpcError::Timeout {
                    command: command.to_string(),
                    elapsed_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Typed convenience wrapper around [`CommandClient::send`].
    ///
    /// # Errors
    ///
    /// Same as [`CommandClient::send`], plus `RpcError::Decode` when the
    /// request does not serialize or the reply does not match `R`.
    pub async fn call<P, R>(&self, command: &str, payload: &P) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)
            .map_err(|e| RpcError::Decode(format!("request payload unserializable: {e}")))?;

        let reply = self.send(command, payload).await?;

        serde_json::from_value(reply)
            .map_err(|e| RpcError::Decode(format!("reply payload mismatch: {e}")))
    }

    /// Stop the reply task. Outstanding calls fail with `ChannelClosed`.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CommandClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reply-destination consume loop.
///
/// Owns the subscription and the pending-call table for the proxy's
/// lifetime. On subscription failure it resubscribes with exponential
/// backoff; per-message errors never terminate the loop.
async fn run_reply_task(
    transport: Arc<dyn Transport>,
    mut subscription: Box<dyn crate::transport::Subscription>,
    reply_destination: String,
    pending: PendingCalls,
    cancel: CancellationToken,
) {
    let mut backoff = RESUBSCRIBE_BACKOFF_BASE;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(
                    target: "rpc.client",
                    reply_destination = %reply_destination,
                    "Reply task shutting down"
                );
                // Fail outstanding calls promptly instead of letting each
                // wait out its deadline.
                let mut pending = pending.lock().await;
                pending.clear();
                return;
            }
            received = subscription.next_message() => {
                match received {
                    Ok(Some(message)) => {
                        backoff = RESUBSCRIBE_BACKOFF_BASE;

                        resolve_reply(&message.payload, &pending, &reply_destination).await;

                        if let Some(tag) = message.delivery_tag.as_deref() {
                            if let Err(e) = transport.ack(&reply_destination, tag).await {
                                warn!(
                                    target: "rpc.client",
                                    error = %e,
                                    reply_destination = %reply_destination,
                                    "Failed to ack reply"
                                );
                            }
                        }
                    }
                    Ok(None) | Err(_) => {
                        if let Err(e) = &received {
                            error!(
                                target: "rpc.client",
                                error = %e,
                                reply_destination = %reply_destination,
                                "Reply subscription failed, resubscribing"
                            );
                        }

                        tokio::select! {
                            () = cancel.cancelled() => return,
                            () = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(RESUBSCRIBE_BACKOFF_MAX);

                        match transport.subscribe(&reply_destination).await {
                            Ok(sub) => {
                                subscription = sub;
                                info!(
                                    target: "rpc.client",
                                    reply_destination = %reply_destination,
                                    "Reply subscription re-established"
                                );
                            }
                            Err(e) => {
                                warn!(
                                    target: "rpc.client",
                                    error = %e,
                                    reply_destination = %reply_destination,
                                    "Resubscribe failed, will retry"
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Decode one reply and resolve its pending call, if any.
async fn resolve_reply(bytes: &[u8], pending: &PendingCalls, reply_destination: &str) {
    let reply = match envelope::decode(bytes) {
        Ok(env) => env,
        Err(e) => {
            // Malformed reply: skip and keep consuming.
            warn!(
                target: "rpc.client",
                error = %e,
                reply_destination = %reply_destination,
                "Discarding undecodable reply"
            );
            return;
        }
    };

    let Some(status) = reply.status else {
        warn!(
            target: "rpc.client",
            command = %reply.command,
            correlation_id = %reply.correlation_id,
            "Request envelope on reply destination, discarding"
        );
        return;
    };

    let sender = {
        let mut pending = pending.lock().await;
        pending.remove(&reply.correlation_id)
    };

    let Some(sender) = sender else {
        // Stale or duplicate reply (e.g. the call already timed out).
        // Documented behavior: discard, signal, take no further action.
        debug!(
            target: "rpc.client",
            command = %reply.command,
            correlation_id = %reply.correlation_id,
            "Discarding reply with no pending call"
        );
        return;
    };

    let result = match status {
        ReplyStatus::Ok => Ok(reply.payload),
        ReplyStatus::Error => {
            let error = reply.error.unwrap_or_else(|| {
                HandlerError::internal("error reply carried no error detail")
            });
            if error.kind == UNKNOWN_COMMAND_KIND {
                Err(RpcError::UnknownCommand(reply.command.clone()))
            } else {
                Err(RpcError::Remote(error))
            }
        }
    };

    // A dropped receiver just means the caller gave up; nothing to do.
    let _ = sender.send(result);
}
