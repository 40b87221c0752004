//! Command envelopes and the in-process command bus.
//!
//! `send` acknowledges acceptance only. Commands for one order are executed
//! one at a time by a worker task owned by that order; different orders run
//! in parallel. Every committed event is fanned out to subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, MessageId};
use event_store::{EventRecord, EventStore, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::Instrument;

use crate::aggregate::Aggregate;
use crate::command::CommandResult;
use crate::error::{DomainError, ErrorKind};
use crate::order::{Order, OrderError, OrderEvent, OrderService, OrderState, RegistrationCommand};

/// Delivery wrapper around one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub message_id: MessageId,

    /// Id of the message that caused this one, if any.
    pub correlation_id: Option<MessageId>,

    pub sent_at: DateTime<Utc>,
    pub command: RegistrationCommand,
}

impl CommandEnvelope {
    pub fn new(command: impl Into<RegistrationCommand>) -> Self {
        Self {
            message_id: MessageId::new(),
            correlation_id: None,
            sent_at: Utc::now(),
            command: command.into(),
        }
    }

    pub fn with_correlation(mut self, correlation_id: MessageId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn order_id(&self) -> AggregateId {
        self.command.order_id()
    }
}

/// Errors returned by the command bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The command is malformed and was not enqueued.
    #[error("Invalid request: {0}")]
    InvalidRequest(OrderError),

    /// The command was processed and failed.
    #[error("Command failed: {0}")]
    Command(#[from] DomainError),

    /// The order worker stopped before replying.
    #[error("Order worker stopped before replying")]
    WorkerStopped,
}

impl BusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BusError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            BusError::Command(e) => e.kind(),
            BusError::WorkerStopped => ErrorKind::Internal,
        }
    }
}

/// Accepts command envelopes for asynchronous, at-least-once processing.
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// Enqueues the envelope. Returns once it is accepted, not once it ran.
    async fn send(&self, envelope: CommandEnvelope) -> Result<(), BusError>;
}

/// What a processed command did to its order.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub order_id: AggregateId,
    pub state: OrderState,
    pub version: Version,

    /// Events committed by the command; empty for a tolerated replay.
    pub events: Vec<OrderEvent>,
}

impl CommandOutcome {
    fn from_result(order_id: AggregateId, result: CommandResult<Order>) -> Self {
        Self {
            order_id,
            state: result.aggregate.state(),
            version: result.aggregate.version(),
            events: result.events,
        }
    }
}

/// Configuration for the in-process bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Times a command is re-run after losing a concurrency race.
    pub conflict_retries: u32,

    /// How long an order worker waits for work before retiring.
    pub worker_idle: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
            worker_idle: Duration::from_secs(60),
        }
    }
}

type Reply = oneshot::Sender<Result<CommandOutcome, DomainError>>;

struct Delivery {
    envelope: CommandEnvelope,
    reply: Option<Reply>,
}

struct BusInner<S: EventStore> {
    service: OrderService<S>,
    config: BusConfig,
    workers: Mutex<HashMap<AggregateId, mpsc::UnboundedSender<Delivery>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<EventRecord>>>,
}

/// Command bus that executes commands inside the current process.
pub struct InProcessCommandBus<S: EventStore> {
    inner: Arc<BusInner<S>>,
}

impl<S: EventStore> Clone for InProcessCommandBus<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: EventStore + 'static> InProcessCommandBus<S> {
    pub fn new(store: S, config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                service: OrderService::new(store),
                config,
                workers: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the order service commands are executed with.
    pub fn service(&self) -> &OrderService<S> {
        &self.inner.service
    }

    /// Registers a receiver for every event committed after this call.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<EventRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().await.push(tx);
        rx
    }

    /// Wraps the command in a fresh envelope and sends it.
    pub async fn dispatch(&self, command: impl Into<RegistrationCommand>) -> Result<(), BusError> {
        self.send(CommandEnvelope::new(command)).await
    }

    /// Sends the envelope and waits for the command to be processed.
    pub async fn send_and_confirm(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<CommandOutcome, BusError> {
        Self::validate(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.enqueue(Delivery {
            envelope,
            reply: Some(tx),
        })
        .await;

        let result = rx.await.map_err(|_| BusError::WorkerStopped)?;
        Ok(result?)
    }

    /// Number of order workers currently alive.
    pub async fn active_workers(&self) -> usize {
        self.inner.workers.lock().await.len()
    }

    fn validate(envelope: &CommandEnvelope) -> Result<(), BusError> {
        envelope.command.validate().map_err(|e| {
            metrics::counter!(
                "registration_command_failures_total",
                "kind" => ErrorKind::InvalidRequest.as_str()
            )
            .increment(1);
            tracing::debug!(
                message_id = %envelope.message_id,
                command = envelope.command.name(),
                error = %e,
                "Rejected malformed command"
            );
            BusError::InvalidRequest(e)
        })
    }

    /// Hands the delivery to the order's worker, starting one if needed.
    ///
    /// Sends happen under the worker map lock, which is what lets a worker
    /// retire without losing queued commands.
    async fn enqueue(&self, delivery: Delivery) {
        let order_id = delivery.envelope.order_id();
        let mut workers = self.inner.workers.lock().await;

        let delivery = match workers.get(&order_id) {
            Some(tx) => match tx.send(delivery) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => returned,
            },
            None => delivery,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(delivery);
        workers.insert(order_id, tx.clone());

        let inner = Arc::clone(&self.inner);
        let span = tracing::debug_span!("order_worker", %order_id);
        tokio::spawn(run_worker(inner, order_id, tx, rx).instrument(span));
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandBus for InProcessCommandBus<S> {
    async fn send(&self, envelope: CommandEnvelope) -> Result<(), BusError> {
        Self::validate(&envelope)?;
        self.enqueue(Delivery {
            envelope,
            reply: None,
        })
        .await;
        Ok(())
    }
}

async fn run_worker<S: EventStore>(
    inner: Arc<BusInner<S>>,
    order_id: AggregateId,
    own_tx: mpsc::UnboundedSender<Delivery>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
) {
    tracing::debug!("Order worker started");

    loop {
        match tokio::time::timeout(inner.config.worker_idle, rx.recv()).await {
            Ok(Some(delivery)) => process(&inner, delivery).await,
            Ok(None) => break,
            Err(_) => {
                let mut workers = inner.workers.lock().await;
                // A send may have landed between the timeout and the lock.
                if !rx.is_empty() {
                    continue;
                }
                if workers
                    .get(&order_id)
                    .is_some_and(|tx| tx.same_channel(&own_tx))
                {
                    workers.remove(&order_id);
                }
                break;
            }
        }
    }

    tracing::debug!("Order worker retired");
}

async fn process<S: EventStore>(inner: &BusInner<S>, delivery: Delivery) {
    let Delivery { envelope, reply } = delivery;
    let order_id = envelope.order_id();
    let command = envelope.command.name();

    metrics::counter!("registration_commands_total", "command" => command).increment(1);

    let mut attempt = 0;
    let result = loop {
        attempt += 1;
        match inner.service.handle(envelope.command.clone()).await {
            Err(e) if e.is_retryable() && attempt <= inner.config.conflict_retries => {
                tracing::debug!(%order_id, command, attempt, "Concurrency conflict, retrying");
            }
            other => break other,
        }
    };

    let result = match result {
        Ok(result) => {
            tracing::debug!(
                %order_id,
                command,
                message_id = %envelope.message_id,
                events = result.events.len(),
                version = %result.new_version,
                "Command processed"
            );
            publish(inner, &result.records).await;
            Ok(CommandOutcome::from_result(order_id, result))
        }
        Err(e) => {
            let kind = e.kind();
            metrics::counter!("registration_command_failures_total", "kind" => kind.as_str())
                .increment(1);
            match kind {
                ErrorKind::Internal | ErrorKind::ConcurrencyConflict => {
                    tracing::error!(%order_id, command, attempt, error = %e, "Command failed")
                }
                _ => tracing::warn!(%order_id, command, error = %e, "Command rejected"),
            }
            Err(e)
        }
    };

    if let Some(reply) = reply {
        // The sender may have stopped waiting.
        let _ = reply.send(result);
    }
}

async fn publish<S: EventStore>(inner: &BusInner<S>, records: &[EventRecord]) {
    if records.is_empty() {
        return;
    }
    let mut subscribers = inner.subscribers.lock().await;
    subscribers.retain(|tx| records.iter().all(|record| tx.send(record.clone()).is_ok()));
}
