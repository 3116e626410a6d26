//! Per-operator session state: the order list, the focused order and the
//! status/location inputs, plus whatever request is currently in flight.
//!
//! Every request is split into a `begin_*` step that validates preconditions
//! and hands out a ticket, and a `finish_*` step that applies the outcome only
//! if the ticket still matches the current focus (or list sequence). The async
//! intent methods simply chain the two around a call to the [`OrderService`].

use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::{Order, OrderStatus, StatusDraft, TrackingCode},
    error::OrderError,
    protocol::{AddressChange, DailyClosingReport},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    sync_client::OrderService,
    tenancy::{TenantSummary, TenantTable, TenantView},
};

pub const MSG_CODE_REQUIRED: &str = "Enter a valid tracking code.";
pub const MSG_NOT_FOUND: &str = "Order not found. Check the tracking code and try again.";
pub const MSG_UNREACHABLE: &str = "The order service is not responding. Try again later.";
pub const MSG_FIELDS_REQUIRED: &str = "Status and location are required.";
pub const MSG_NO_FOCUS: &str = "Search for an order first.";
pub const MSG_BUSY: &str = "Wait for the current request to finish.";
pub const MSG_UPDATE_FAILED: &str = "Could not update the order. Try again later.";
pub const MSG_STATUS_UPDATED: &str = "Status updated.";
pub const MSG_ADDRESS_REQUIRED: &str = "A new address is required.";
pub const MSG_ADDRESS_LOCKED: &str = "Delivered orders cannot change their address.";
pub const MSG_ADDRESS_UPDATED: &str = "Address updated.";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Focused,
    Submitting,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl SessionMessage {
    fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// What happened to an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The request succeeded and its result is now visible.
    Applied,
    /// The request failed; the failure is now the session message.
    Failed,
    /// A precondition failed; nothing was sent.
    Rejected,
    /// The response arrived for a focus or list that has since moved on.
    Stale,
}

/// Observable state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub view: TenantView,
    pub orders: Vec<Order>,
    pub list_revision: u64,
    pub list_loading: bool,
    pub focused: Option<Order>,
    pub status_input: Option<OrderStatus>,
    pub location_input: String,
    pub loading: bool,
    pub message: Option<SessionMessage>,
    pub closing_report: Option<DailyClosingReport>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Changed(Box<SessionSnapshot>),
    /// The service accepted an update; the list should be refreshed.
    OrderUpdated(TrackingCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequest {
    Search,
    Detail,
}

#[derive(Debug)]
pub struct FocusTicket {
    generation: u64,
    request: FocusRequest,
    code: TrackingCode,
}

impl FocusTicket {
    pub fn code(&self) -> &TrackingCode {
        &self.code
    }
}

#[derive(Debug)]
pub struct UpdateTicket {
    generation: u64,
    code: TrackingCode,
    draft: StatusDraft,
}

impl UpdateTicket {
    pub fn code(&self) -> &TrackingCode {
        &self.code
    }

    /// Inputs captured when the update was started.
    pub fn draft(&self) -> &StatusDraft {
        &self.draft
    }
}

#[derive(Debug)]
pub struct AddressTicket {
    generation: u64,
    code: TrackingCode,
    address: String,
}

impl AddressTicket {
    pub fn code(&self) -> &TrackingCode {
        &self.code
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[derive(Debug)]
pub struct ListTicket {
    sequence: u64,
}

pub struct SessionController {
    service: Arc<dyn OrderService>,
    tenants: TenantTable,
    orders: Vec<Order>,
    list_revision: u64,
    list_requested: u64,
    list_applied: u64,
    focused: Option<Order>,
    draft: StatusDraft,
    phase: SessionPhase,
    message: Option<SessionMessage>,
    view: TenantView,
    focus_generation: u64,
    updates_in_flight: HashSet<TrackingCode>,
    closing_report: Option<DailyClosingReport>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(service: Arc<dyn OrderService>, tenants: TenantTable) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            service,
            tenants,
            orders: Vec::new(),
            list_revision: 0,
            list_requested: 0,
            list_applied: 0,
            focused: None,
            draft: StatusDraft::default(),
            phase: SessionPhase::Idle,
            message: None,
            view: TenantView::All,
            focus_generation: 0,
            updates_in_flight: HashSet::new(),
            closing_report: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn focused(&self) -> Option<&Order> {
        self.focused.as_ref()
    }

    pub fn message(&self) -> Option<&SessionMessage> {
        self.message.as_ref()
    }

    pub fn view(&self) -> &TenantView {
        &self.view
    }

    pub fn tenants(&self) -> &TenantTable {
        &self.tenants
    }

    /// Full, unfiltered list as of the last accepted refresh.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn visible_orders(&self) -> Vec<&Order> {
        self.tenants.visible(&self.orders, &self.view)
    }

    pub fn tenant_summary(&self) -> TenantSummary {
        self.tenants.summarize(&self.orders)
    }

    pub fn ambiguous_orders(&self) -> Vec<&Order> {
        self.tenants.ambiguous(&self.orders)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, SessionPhase::Loading | SessionPhase::Submitting)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            view: self.view.clone(),
            orders: self.visible_orders().into_iter().cloned().collect(),
            list_revision: self.list_revision,
            list_loading: self.list_requested != self.list_applied,
            focused: self.focused.clone(),
            status_input: self.draft.status,
            location_input: self.draft.location.clone(),
            loading: self.is_loading(),
            message: self.message.clone(),
            closing_report: self.closing_report.clone(),
        }
    }

    fn publish(&self) {
        if self.events.receiver_count() > 0 {
            let _ = self
                .events
                .send(SessionEvent::Changed(Box::new(self.snapshot())));
        }
    }

    fn warn_user(&mut self, text: impl Into<String>) {
        self.message = Some(SessionMessage::new(MessageKind::Warning, text));
        self.publish();
    }

    fn failure_message(err: &OrderError, transport_text: &str) -> SessionMessage {
        match err {
            OrderError::Validation(detail) => SessionMessage::new(MessageKind::Warning, detail),
            OrderError::NotFound(_) => SessionMessage::new(MessageKind::Error, MSG_NOT_FOUND),
            OrderError::Transport(_) => SessionMessage::new(MessageKind::Error, transport_text),
        }
    }

    // ---- focus: search / select ----

    pub fn begin_search(&mut self, raw_code: &str) -> Option<FocusTicket> {
        match TrackingCode::parse(raw_code) {
            Ok(code) => Some(self.begin_focus(FocusRequest::Search, code)),
            Err(err) => {
                debug!(error = %err, "rejected search input");
                self.warn_user(MSG_CODE_REQUIRED);
                None
            }
        }
    }

    /// Selecting a list row re-fetches the detailed record; summaries carry
    /// neither customer nor line items.
    pub fn begin_select(&mut self, summary: &Order) -> FocusTicket {
        self.begin_focus(FocusRequest::Detail, summary.tracking_code.clone())
    }

    fn begin_focus(&mut self, request: FocusRequest, code: TrackingCode) -> FocusTicket {
        self.focus_generation += 1;
        self.phase = SessionPhase::Loading;
        self.message = None;
        debug!(
            tracking_code = %code,
            generation = self.focus_generation,
            ?request,
            "focus request started"
        );
        self.publish();
        FocusTicket {
            generation: self.focus_generation,
            request,
            code,
        }
    }

    pub fn finish_focus(
        &mut self,
        ticket: FocusTicket,
        outcome: Result<Order, OrderError>,
    ) -> Completion {
        if ticket.generation != self.focus_generation {
            debug!(
                tracking_code = %ticket.code,
                request = ?ticket.request,
                generation = ticket.generation,
                current = self.focus_generation,
                "discarding stale focus response"
            );
            return Completion::Stale;
        }

        self.draft.clear();
        let completion = match outcome {
            Ok(order) => {
                info!(tracking_code = %order.tracking_code, status = %order.status, "order focused");
                self.focused = Some(order);
                self.phase = SessionPhase::Focused;
                self.message = None;
                Completion::Applied
            }
            Err(err) => {
                info!(
                    tracking_code = %ticket.code,
                    request = ?ticket.request,
                    error = %err,
                    "focus request failed"
                );
                self.focused = None;
                self.phase = SessionPhase::Error;
                self.message = Some(Self::failure_message(&err, MSG_UNREACHABLE));
                Completion::Failed
            }
        };
        self.publish();
        completion
    }

    pub async fn search(&mut self, raw_code: &str) -> Completion {
        let Some(ticket) = self.begin_search(raw_code) else {
            return Completion::Rejected;
        };
        let service = Arc::clone(&self.service);
        let outcome = service.fetch_by_code(ticket.code()).await;
        self.finish_focus(ticket, outcome)
    }

    pub async fn select_order(&mut self, summary: &Order) -> Completion {
        let ticket = self.begin_select(summary);
        let service = Arc::clone(&self.service);
        let outcome = service.fetch_detailed_by_code(ticket.code()).await;
        self.finish_focus(ticket, outcome)
    }

    pub fn clear_focus(&mut self) {
        self.focus_generation += 1;
        self.focused = None;
        self.draft.clear();
        self.message = None;
        self.phase = SessionPhase::Idle;
        self.publish();
    }

    // ---- status inputs and update ----

    /// Empty input clears the field; an unknown token is reported and clears it too.
    pub fn set_status(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.draft.status = None;
            self.publish();
            return;
        }
        match OrderStatus::from_wire(value) {
            Ok(status) => {
                self.draft.status = Some(status);
                self.publish();
            }
            Err(_) => {
                self.draft.status = None;
                self.warn_user(format!("Unknown status '{value}'."));
            }
        }
    }

    pub fn set_location(&mut self, value: &str) {
        self.draft.location = value.to_string();
        self.publish();
    }

    /// A mutating request needs a focused order, no focus load in progress,
    /// and no other update in flight for the same tracking code.
    fn ready_for_update(&mut self) -> Option<TrackingCode> {
        let Some(focused) = &self.focused else {
            self.warn_user(MSG_NO_FOCUS);
            return None;
        };
        let code = focused.tracking_code.clone();
        if self.phase == SessionPhase::Loading || self.updates_in_flight.contains(&code) {
            warn!(tracking_code = %code, "update rejected while another request is in flight");
            self.warn_user(MSG_BUSY);
            return None;
        }
        Some(code)
    }

    pub fn begin_submit(&mut self) -> Option<UpdateTicket> {
        let code = self.ready_for_update()?;
        if self.draft.validate().is_err() {
            self.warn_user(MSG_FIELDS_REQUIRED);
            return None;
        }

        self.phase = SessionPhase::Submitting;
        self.message = None;
        self.updates_in_flight.insert(code.clone());
        info!(
            tracking_code = %code,
            status = ?self.draft.status,
            "status update started"
        );
        self.publish();
        Some(UpdateTicket {
            generation: self.focus_generation,
            code,
            draft: self.draft.clone(),
        })
    }

    pub fn finish_submit(
        &mut self,
        ticket: UpdateTicket,
        outcome: Result<Order, OrderError>,
    ) -> Completion {
        self.updates_in_flight.remove(&ticket.code);
        if outcome.is_ok() {
            let _ = self.events.send(SessionEvent::OrderUpdated(ticket.code.clone()));
        }
        if ticket.generation != self.focus_generation {
            debug!(
                tracking_code = %ticket.code,
                succeeded = outcome.is_ok(),
                "discarding stale status update response"
            );
            return Completion::Stale;
        }

        let completion = match outcome {
            Ok(mut order) => {
                if let Some(previous) = self.focused.take() {
                    if order.customer.is_none() {
                        order.customer = previous.customer;
                    }
                    if order.line_items.is_none() {
                        order.line_items = previous.line_items;
                    }
                }
                self.focused = Some(order);
                self.draft.clear();
                self.phase = SessionPhase::Focused;
                self.message = Some(SessionMessage::new(MessageKind::Success, MSG_STATUS_UPDATED));
                Completion::Applied
            }
            Err(err) => {
                warn!(tracking_code = %ticket.code, error = %err, "status update failed");
                self.phase = SessionPhase::Error;
                self.message = Some(Self::failure_message(&err, MSG_UPDATE_FAILED));
                Completion::Failed
            }
        };
        self.publish();
        completion
    }

    pub async fn submit_update(&mut self) -> Completion {
        let Some(ticket) = self.begin_submit() else {
            return Completion::Rejected;
        };
        let service = Arc::clone(&self.service);
        let outcome = service.update_status(ticket.code(), ticket.draft()).await;
        self.finish_submit(ticket, outcome)
    }

    // ---- address change ----

    pub fn begin_address_change(&mut self, address: &str) -> Option<AddressTicket> {
        let code = self.ready_for_update()?;
        let delivered = self
            .focused
            .as_ref()
            .is_some_and(|order| order.status.is_terminal());
        if delivered {
            self.warn_user(MSG_ADDRESS_LOCKED);
            return None;
        }
        let address = address.trim();
        if address.is_empty() {
            self.warn_user(MSG_ADDRESS_REQUIRED);
            return None;
        }

        self.phase = SessionPhase::Submitting;
        self.message = None;
        self.updates_in_flight.insert(code.clone());
        self.publish();
        Some(AddressTicket {
            generation: self.focus_generation,
            code,
            address: address.to_string(),
        })
    }

    pub fn finish_address_change(
        &mut self,
        ticket: AddressTicket,
        outcome: Result<AddressChange, OrderError>,
    ) -> Completion {
        self.updates_in_flight.remove(&ticket.code);
        if ticket.generation != self.focus_generation {
            debug!(tracking_code = %ticket.code, "discarding stale address response");
            return Completion::Stale;
        }

        let completion = match outcome {
            Ok(change) => {
                if let Some(customer) = self
                    .focused
                    .as_mut()
                    .and_then(|order| order.customer.as_mut())
                {
                    customer.address = change.new_address;
                }
                self.phase = SessionPhase::Focused;
                self.message = Some(SessionMessage::new(
                    MessageKind::Success,
                    MSG_ADDRESS_UPDATED,
                ));
                Completion::Applied
            }
            Err(err) => {
                warn!(tracking_code = %ticket.code, error = %err, "address update failed");
                self.phase = SessionPhase::Error;
                self.message = Some(Self::failure_message(&err, MSG_UPDATE_FAILED));
                Completion::Failed
            }
        };
        self.publish();
        completion
    }

    pub async fn submit_address(&mut self, address: &str) -> Completion {
        let Some(ticket) = self.begin_address_change(address) else {
            return Completion::Rejected;
        };
        let service = Arc::clone(&self.service);
        let outcome = service
            .update_address(ticket.code(), ticket.address())
            .await;
        self.finish_address_change(ticket, outcome)
    }

    // ---- list sync ----

    pub fn begin_refresh(&mut self) -> ListTicket {
        self.list_requested += 1;
        self.publish();
        ListTicket {
            sequence: self.list_requested,
        }
    }

    /// Replaces the list wholesale. A response older than the last applied
    /// one is dropped; a failure leaves the current list untouched.
    pub fn finish_refresh(
        &mut self,
        ticket: ListTicket,
        outcome: Result<Vec<Order>, OrderError>,
    ) -> Completion {
        if ticket.sequence <= self.list_applied {
            debug!(
                sequence = ticket.sequence,
                applied = self.list_applied,
                "discarding stale order list"
            );
            return Completion::Stale;
        }
        self.list_applied = ticket.sequence;

        let completion = match outcome {
            Ok(orders) => {
                self.orders = orders;
                self.list_revision += 1;
                let ambiguous = self.tenants.ambiguous(&self.orders).len();
                if ambiguous > 0 {
                    warn!(ambiguous, "orders match more than one tenant rule");
                }
                info!(
                    count = self.orders.len(),
                    revision = self.list_revision,
                    "order list replaced"
                );
                Completion::Applied
            }
            Err(err) => {
                warn!(error = %err, "order list refresh failed");
                self.message = Some(SessionMessage::new(MessageKind::Error, MSG_UNREACHABLE));
                Completion::Failed
            }
        };
        self.publish();
        completion
    }

    pub async fn refresh_orders(&mut self) -> Completion {
        let ticket = self.begin_refresh();
        let service = Arc::clone(&self.service);
        let outcome = service.fetch_all().await;
        self.finish_refresh(ticket, outcome)
    }

    /// Session start: load the list once.
    pub async fn start(&mut self) -> Completion {
        self.refresh_orders().await
    }

    // ---- views and reports ----

    pub fn switch_view(&mut self, label: &str) {
        match self.tenants.resolve_view(label) {
            Ok(view) => {
                debug!(view = %view, "tenant view switched");
                self.view = view;
                self.publish();
            }
            Err(err) => {
                debug!(error = %err, "rejected tenant view");
                self.warn_user(format!("Unknown view '{}'.", label.trim()));
            }
        }
    }

    pub async fn load_daily_closing(&mut self) -> Completion {
        let service = Arc::clone(&self.service);
        let completion = match service.fetch_daily_closing().await {
            Ok(report) => {
                self.closing_report = Some(report);
                Completion::Applied
            }
            Err(err) => {
                warn!(error = %err, "daily closing report failed");
                self.message = Some(SessionMessage::new(MessageKind::Error, MSG_UNREACHABLE));
                Completion::Failed
            }
        };
        self.publish();
        completion
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
