//! Command listener: turns inbound broker messages into command dispatch.
//!
//! One listener consumes one service's inbound destination. Per message it
//! decodes the envelope, looks the command up in the registry, invokes the
//! handler on a spawned task (slow handlers never block unrelated
//! messages), and publishes the result — or a typed error — back to the
//! envelope's reply destination with the same correlation id.
//!
//! Errors local to one message (decode failure, unknown command, handler
//! failure) are contained: they become error replies or logged skips, never
//! a dead consume loop. Transport errors propagate to the run loop, which
//! reconnects with exponential backoff.

use crate::envelope::{self, Envelope};
use crate::errors::{HandlerError, RpcError, UNKNOWN_COMMAND_KIND};
use crate::registry::{CommandRegistry, HandlerContext};
use crate::transport::{InboundMessage, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before the consume loop retries a failed subscription.
const RESUBSCRIBE_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Cap on the resubscribe backoff.
const RESUBSCRIBE_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Consume loop for one inbound destination.
pub struct CommandListener {
    transport: Arc<dyn Transport>,
    registry: Arc<CommandRegistry>,
    inbound_destination: String,
}

impl CommandListener {
    /// Build a listener over a registry constructed at startup.
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: CommandRegistry,
        inbound_destination: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            registry: Arc::new(registry),
            inbound_destination: inbound_destination.into(),
        }
    }

    /// Run the consume loop until cancelled.
    ///
    /// Never returns on per-message errors. Subscription failures trigger
    /// reconnection with exponential backoff; only cancellation ends the
    /// loop.
    pub async fn run(self, cancel: CancellationToken) {
        let mut commands: Vec<&str> = self.registry.command_names().collect();
        commands.sort_unstable();
        info!(
            target: "rpc.listener",
            inbound_destination = %self.inbound_destination,
            commands = ?commands,
            "Command listener starting"
        );

        let mut backoff = RESUBSCRIBE_BACKOFF_BASE;

        'reconnect: loop {
            let mut subscription = tokio::select! {
                () = cancel.cancelled() => break 'reconnect,
                subscribed = self.transport.subscribe(&self.inbound_destination) => {
                    match subscribed {
                        Ok(sub) => {
                            backoff = RESUBSCRIBE_BACKOFF_BASE;
                            sub
                        }
                        Err(e) => {
                            warn!(
                                target: "rpc.listener",
                                error = %e,
                                inbound_destination = %self.inbound_destination,
                                backoff_ms = backoff.as_millis() as u64,
                                "Subscribe failed, retrying"
                            );
                            tokio::select! {
                                () = cancel.cancelled() => break 'reconnect,
                                () = tokio::time::sleep(backoff) => {}
                            }
                            backoff = (backoff * 2).min(RESUBSCRIBE_BACKOFF_MAX);
                            continue 'reconnect;
                        }
                    }
                }
            };

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break 'reconnect,
                    received = subscription.next_message() => {
                        match received {
                            Ok(Some(message)) => self.dispatch(message),
                            Ok(None) => {
                                warn!(
                                    target: "rpc.listener",
                                    inbound_destination = %self.inbound_destination,
                                    "Subscription ended, resubscribing"
                                );
                                continue 'reconnect;
                            }
                            Err(e) => {
                                error!(
                                    target: "rpc.listener",
                                    error = %e,
                                    inbound_destination = %self.inbound_destination,
                                    "Subscription failed, resubscribing"
                                );
                                tokio::select! {
                                    () = cancel.cancelled() => break 'reconnect,
                                    () = tokio::time::sleep(backoff) => {}
                                }
                                backoff = (backoff * 2).min(RESUBSCRIBE_BACKOFF_MAX);
                                continue 'reconnect;
                            }
                        }
                    }
                }
            }
        }

        info!(
            target: "rpc.listener",
            inbound_destination = %self.inbound_destination,
            "Command listener stopped"
        );
    }

    /// Decode one message and hand it to its handler on a spawned task.
    ///
    /// Every failure mode here is contained; the consume loop keeps going.
    fn dispatch(&self, message: InboundMessage) {
        let request = match envelope::decode(&message.payload) {
            Ok(env) => env,
            Err(e) => {
                warn!(
                    target: "rpc.listener",
                    error = %e,
                    inbound_destination = %self.inbound_destination,
                    "Skipping undecodable message"
                );
                // A message that cannot be decoded can never be handled;
                // acknowledge it so the durable binding does not redeliver
                // it forever.
                self.spawn_ack(message.delivery_tag);
                return;
            }
        };

        if request.is_reply() {
            warn!(
                target: "rpc.listener",
                command = %request.command,
                correlation_id = %request.correlation_id,
                "Reply envelope on inbound destination, skipping"
            );
            self.spawn_ack(message.delivery_tag);
            return;
        }

        let Some(reply_to) = request.reply_to.clone() else {
            warn!(
                target: "rpc.listener",
                command = %request.command,
                correlation_id = %request.correlation_id,
                "Request without reply_to, skipping"
            );
            self.spawn_ack(message.delivery_tag);
            return;
        };

        let handler = self.registry.get(&request.command).cloned();
        let transport = Arc::clone(&self.transport);
        let inbound_destination = self.inbound_destination.clone();
        let delivery_tag = message.delivery_tag;

        // One task per message: a slow handler must not hold up unrelated
        // messages.
        tokio::spawn(async move {
            let reply = match handler {
                Some(handler) => {
                    let ctx = HandlerContext {
                        command: request.command.clone(),
                        correlation_id: request.correlation_id.clone(),
                        inbound_destination: inbound_destination.clone(),
                    };

                    debug!(
                        target: "rpc.listener",
                        command = %request.command,
                        correlation_id = %request.correlation_id,
                        "Dispatching command"
                    );

                    match handler.handle(ctx, request.payload).await {
                        Ok(result) => {
                            Envelope::ok_reply(&request.correlation_id, &request.command, result)
                        }
                        Err(handler_error) => {
                            debug!(
                                target: "rpc.listener",
                                command = %request.command,
                                correlation_id = %request.correlation_id,
                                kind = %handler_error.kind,
                                "Handler returned error"
                            );
                            Envelope::error_reply(
                                &request.correlation_id,
                                &request.command,
                                handler_error,
                            )
                        }
                    }
                }
                None => {
                    warn!(
                        target: "rpc.listener",
                        command = %request.command,
                        correlation_id = %request.correlation_id,
                        "No handler registered"
                    );
                    Envelope::error_reply(
                        &request.correlation_id,
                        &request.command,
                        HandlerError::new(
                            UNKNOWN_COMMAND_KIND,
                            format!("no handler registered for '{}'", request.command),
                        ),
                    )
                }
            };

            if let Err(e) = publish_reply(&transport, &reply_to, &reply).await {
                // Leave the message unacknowledged: on the durable binding
                // it will be redelivered and handled again (at-least-once).
                error!(
                    target: "rpc.listener",
                    error = %e,
                    command = %reply.command,
                    correlation_id = %reply.correlation_id,
                    reply_to = %reply_to,
                    "Failed to publish reply, message left unacknowledged"
                );
                return;
            }

            // Ack strictly after the reply is out.
            if let Some(tag) = delivery_tag.as_deref() {
                if let Err(e) = transport.ack(&inbound_destination, tag).await {
                    warn!(
                        target: "rpc.listener",
                        error = %e,
                        delivery_tag = %tag,
                        "Failed to ack handled message"
                    );
                }
            }
        });
    }

    /// Acknowledge a message that will never produce a reply.
    fn spawn_ack(&self, delivery_tag: Option<String>) {
        let Some(tag) = delivery_tag else { return };
        let transport = Arc::clone(&self.transport);
        let destination = self.inbound_destination.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.ack(&destination, &tag).await {
                warn!(
                    target: "rpc.listener",
                    error = %e,
                    delivery_tag = %tag,
                    "Failed to ack skipped message"
                );
            }
        });
    }
}

/// Encode and publish one reply envelope.
async fn publish_reply(
    transport: &Arc<dyn Transport>,
    reply_to: &str,
    reply: &Envelope,
) -> Result<(), RpcError> {
    let bytes = envelope::encode(reply)?;
    transport.publish(reply_to, &bytes).await
}
