//! Order service providing a simplified API for order operations.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    AssignRegistrantDetails, ConfirmRegistration, ExpireOrder, MarkSeatsReserved,
    MarkSeatsUnavailable, Order, RegisterToConference, RegistrationCommand,
};

/// Service for managing orders.
///
/// Wraps the command handler with one method per registration command. All
/// methods except `register_to_conference` require the order to exist.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Loads an order, returning None if it was never placed.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Dispatches any registration command to its operation.
    pub async fn handle(
        &self,
        command: RegistrationCommand,
    ) -> Result<CommandResult<Order>, DomainError> {
        match command {
            RegistrationCommand::RegisterToConference(cmd) => {
                self.register_to_conference(cmd).await
            }
            RegistrationCommand::AssignRegistrantDetails(cmd) => {
                self.assign_registrant_details(cmd).await
            }
            RegistrationCommand::ConfirmRegistration(cmd) => {
                self.confirm_registration(cmd).await
            }
            RegistrationCommand::MarkSeatsReserved(cmd) => self.mark_seats_reserved(cmd).await,
            RegistrationCommand::MarkSeatsUnavailable(cmd) => {
                self.mark_seats_unavailable(cmd).await
            }
            RegistrationCommand::ExpireOrder(cmd) => self.expire_order(cmd).await,
        }
    }

    /// Places a new order, or accepts an identical replay.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn register_to_conference(
        &self,
        cmd: RegisterToConference,
    ) -> Result<CommandResult<Order>, DomainError> {
        let seats = cmd.validated_seats()?;
        let order_id = cmd.order_id;
        let conference_id = cmd.conference_id;

        self.handler
            .execute(order_id, |order| {
                order.register(order_id, conference_id, seats)
            })
            .await
    }

    /// Sets registrant details on an existing order.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn assign_registrant_details(
        &self,
        cmd: AssignRegistrantDetails,
    ) -> Result<CommandResult<Order>, DomainError> {
        cmd.validate()?;
        let registrant = cmd.registrant();

        self.handler
            .execute_existing(cmd.order_id, |order| {
                order.assign_registrant_details(registrant)
            })
            .await
    }

    /// Confirms payment of a booked order.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn confirm_registration(
        &self,
        cmd: ConfirmRegistration,
    ) -> Result<CommandResult<Order>, DomainError> {
        cmd.validate()?;
        let payment_reference = cmd.payment_reference.trim().to_string();

        self.handler
            .execute_existing(cmd.order_id, |order| {
                order.confirm_payment(&payment_reference)
            })
            .await
    }

    /// Books the order after the seat inventory confirmed.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn mark_seats_reserved(
        &self,
        cmd: MarkSeatsReserved,
    ) -> Result<CommandResult<Order>, DomainError> {
        let expires_at = cmd.expires_at;

        self.handler
            .execute_existing(cmd.order_id, |order| order.mark_seats_reserved(expires_at))
            .await
    }

    /// Rejects the order after the seat inventory declined.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn mark_seats_unavailable(
        &self,
        cmd: MarkSeatsUnavailable,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_existing(cmd.order_id, |order| order.mark_seats_unavailable())
            .await
    }

    /// Expires an unpaid booking.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn expire_order(&self, cmd: ExpireOrder) -> Result<CommandResult<Order>, DomainError> {
        let as_of = cmd.as_of;

        self.handler
            .execute_existing(cmd.order_id, |order| order.expire(as_of))
            .await
    }
}
