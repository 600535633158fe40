//! Channel multiplexer: one backend binding per channel, shared by every
//! element interested in it.

use crate::client::{BindOptions, Binding, MessageClient, MessageHandler};
use crate::element::StreamElement;
use crate::render::Renderer;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::types::{ElementId, MessageId, StreamMessage};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::delivery::{DeliveryCursor, DeliveryFilter};
use super::types::{AcquireOutcome, MultiplexerConfig};

/// A teardown scheduled after interest in a channel dropped to zero.
struct PendingTeardown {
    /// Distinguishes this teardown from earlier, superseded ones.
    generation: u64,
    handle: TaskHandle,
}

/// Internal per-channel state.
struct ChannelSubscription {
    binding: Box<dyn Binding>,
    /// Shared with the binding's handler; dropped with this record.
    cursor: Arc<DeliveryCursor>,
    /// Elements currently wanting this channel; the size is the refcount.
    elements: HashSet<ElementId>,
    /// Present iff `elements` is empty and the teardown has not fired.
    pending_teardown: Option<PendingTeardown>,
}

/// Registry of live channel subscriptions.
///
/// Owned by the host for its whole lifetime and shared with multiplexers by
/// `Arc`. It is the single source of truth for which channels are bound:
/// at most one entry, and so one binding, exists per channel.
#[derive(Default)]
pub struct SubscriptionRegistry {
    channels: Mutex<HashMap<String, ChannelSubscription>>,
    next_generation: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels currently bound (including those awaiting teardown).
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Number of elements currently interested in `channel`.
    pub fn interest(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, |sub| sub.elements.len())
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.lock().contains_key(channel)
    }

    pub fn has_pending_teardown(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .get(channel)
            .map_or(false, |sub| sub.pending_teardown.is_some())
    }

    /// Highest destructive message id admitted on `channel`.
    pub fn last_seen(&self, channel: &str) -> Option<MessageId> {
        self.channels
            .lock()
            .get(channel)
            .and_then(|sub| sub.cursor.last_seen())
    }

    /// Unbind every channel and cancel pending teardowns.
    ///
    /// Returns the number of bindings released.
    pub fn shutdown(&self) -> usize {
        let mut channels = self.channels.lock();
        let count = channels.len();

        for (channel, mut sub) in channels.drain() {
            if let Some(pending) = sub.pending_teardown.take() {
                pending.handle.cancel();
            }
            sub.binding.unbind();
            tracing::debug!(%channel, "unsubscribed on shutdown");
        }

        count
    }

    /// Run a scheduled teardown, unless it was superseded.
    fn fire_teardown(&self, channel: &str, generation: u64) {
        let mut channels = self.channels.lock();

        let due = channels.get(channel).map_or(false, |sub| {
            sub.elements.is_empty()
                && sub
                    .pending_teardown
                    .as_ref()
                    .map_or(false, |p| p.generation == generation)
        });
        if !due {
            tracing::debug!(%channel, generation, "teardown superseded");
            return;
        }

        if let Some(mut sub) = channels.remove(channel) {
            sub.binding.unbind();
            tracing::debug!(%channel, "unsubscribed");
        }
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Coalesces element subscriptions into one backend binding per channel.
///
/// When the last interested element releases a channel, the binding is kept
/// for `unsubscribe_delay` so that an element re-attaching in the meantime
/// (a page navigation swapping equivalent elements) reuses it.
#[derive(Clone)]
pub struct Multiplexer {
    registry: Arc<SubscriptionRegistry>,
    client: Arc<dyn MessageClient>,
    renderer: Option<Arc<dyn Renderer>>,
    scheduler: Arc<dyn Scheduler>,
    config: MultiplexerConfig,
}

impl Multiplexer {
    /// Create a multiplexer over `registry`.
    ///
    /// `renderer` is `None` when the host cannot render streams; elements
    /// then never connect.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        client: Arc<dyn MessageClient>,
        renderer: Option<Arc<dyn Renderer>>,
        scheduler: Arc<dyn Scheduler>,
        config: MultiplexerConfig,
    ) -> Self {
        Self {
            registry,
            client,
            renderer,
            scheduler,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &MultiplexerConfig {
        &self.config
    }

    /// Register `element`'s interest in `channel`, binding the channel if
    /// nobody else has.
    ///
    /// Never fails to the caller: a missing channel or token, a missing
    /// renderer, or a refused binding leave the element disconnected.
    pub fn acquire(
        &self,
        channel: &str,
        token: &str,
        element: &dyn StreamElement,
    ) -> AcquireOutcome {
        if channel.is_empty() || token.is_empty() {
            return AcquireOutcome::Inert;
        }

        let Some(renderer) = &self.renderer else {
            tracing::warn!(%channel, "stream source: renderer is not available");
            return AcquireOutcome::HostUnavailable;
        };

        let outcome = {
            let mut channels = self.registry.channels.lock();

            match channels.get_mut(channel) {
                Some(sub) => {
                    if let Some(pending) = sub.pending_teardown.take() {
                        pending.handle.cancel();
                        tracing::debug!(%channel, "teardown cancelled");
                    }
                    sub.elements.insert(element.id());
                    AcquireOutcome::Joined
                }
                None => {
                    let cursor = Arc::new(DeliveryCursor::new());
                    let filter =
                        DeliveryFilter::new(channel, Arc::clone(&cursor), Arc::clone(renderer));
                    let handler: MessageHandler = Arc::new(move |message: &StreamMessage| {
                        filter.handle(message);
                    });

                    match self.client.bind(
                        &self.config.event,
                        handler,
                        BindOptions::with_token(channel, token),
                    ) {
                        Ok(binding) => {
                            channels.insert(
                                channel.to_string(),
                                ChannelSubscription {
                                    binding,
                                    cursor,
                                    elements: HashSet::from([element.id()]),
                                    pending_teardown: None,
                                },
                            );
                            tracing::debug!(%channel, "subscribed");
                            AcquireOutcome::Created
                        }
                        Err(err) => {
                            tracing::error!(%channel, %err, "failed to bind channel");
                            AcquireOutcome::Failed
                        }
                    }
                }
            }
        };

        if outcome.is_connected() {
            element.subscription_connected();
        }
        outcome
    }

    /// Drop `element`'s interest in `channel`.
    ///
    /// When no interest remains, teardown is scheduled after the configured
    /// delay. The element is marked disconnected even if the channel was
    /// never bound.
    pub fn release(&self, channel: &str, element: &dyn StreamElement) {
        {
            let mut channels = self.registry.channels.lock();

            if let Some(sub) = channels.get_mut(channel) {
                sub.elements.remove(&element.id());

                if sub.elements.is_empty() && sub.pending_teardown.is_none() {
                    let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);
                    let registry: Weak<SubscriptionRegistry> = Arc::downgrade(&self.registry);
                    let name = channel.to_string();

                    let handle = self.scheduler.schedule(
                        self.config.unsubscribe_delay,
                        Box::new(move || {
                            if let Some(registry) = registry.upgrade() {
                                registry.fire_teardown(&name, generation);
                            }
                        }),
                    );
                    sub.pending_teardown = Some(PendingTeardown { generation, handle });
                    tracing::debug!(%channel, generation, "teardown scheduled");
                }
            }
        }

        element.subscription_disconnected();
    }

    pub fn channel_count(&self) -> usize {
        self.registry.channel_count()
    }

    pub fn interest(&self, channel: &str) -> usize {
        self.registry.interest(channel)
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.registry.is_subscribed(channel)
    }

    pub fn has_pending_teardown(&self, channel: &str) -> bool {
        self.registry.has_pending_teardown(channel)
    }

    pub fn last_seen(&self, channel: &str) -> Option<MessageId> {
        self.registry.last_seen(channel)
    }
}
