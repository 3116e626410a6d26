use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OrderError;

/// Uppercase, non-empty, alphanumeric lookup key for one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingCode(String);

impl TrackingCode {
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OrderError::validation("tracking code is required"));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(OrderError::validation(format!(
                "tracking code '{trimmed}' must be alphanumeric"
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Serialize for TrackingCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TrackingCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Delivery lifecycle, declared in its forward order.
///
/// The service is authoritative for which transitions are legal; the client
/// offers every variant as a target regardless of the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    Received,
    DateSet,
    InTransit,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Received,
        OrderStatus::DateSet,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ];

    /// Token understood by the order service.
    pub fn token(self) -> &'static str {
        match self {
            OrderStatus::Received => "RECIBIDA",
            OrderStatus::DateSet => "FECHA_SET",
            OrderStatus::InTransit => "EN_CAMINO",
            OrderStatus::Delivered => "ENTREGADO",
        }
    }

    /// Long description the service stores alongside the token.
    pub fn description(self) -> &'static str {
        match self {
            OrderStatus::Received => "Solicitud Recibida",
            OrderStatus::DateSet => "Fecha de Envío Establecida",
            OrderStatus::InTransit => "El producto fue enviado y está en camino",
            OrderStatus::Delivered => "El producto fue entregado al cliente",
        }
    }

    pub fn label(self) -> String {
        normalize_status_label(Some(self.token()))
    }

    pub fn tag(self) -> StatusTag {
        match self {
            OrderStatus::Received => StatusTag::Received,
            OrderStatus::DateSet => StatusTag::Scheduled,
            OrderStatus::InTransit => StatusTag::InTransit,
            OrderStatus::Delivered => StatusTag::Delivered,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == OrderStatus::Delivered
    }

    /// Accepts a token in any case with spaces or underscores, or the
    /// service's long description.
    pub fn from_wire(raw: &str) -> Result<Self, OrderError> {
        let trimmed = raw.trim();
        let token = trimmed.to_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.token() == token || status.description() == trimmed)
            .ok_or_else(|| OrderError::validation(format!("unrecognized order status '{raw}'")))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw).map_err(serde::de::Error::custom)
    }
}

/// Presentation bucket for a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    Received,
    Scheduled,
    InTransit,
    Delivered,
    Unknown,
}

/// Turns a raw status token into a readable label. Absent input yields "".
pub fn normalize_status_label(raw: Option<&str>) -> String {
    raw.map(|value| value.replace(['_', '-'], " "))
        .unwrap_or_default()
}

pub fn status_tag(raw: Option<&str>) -> StatusTag {
    raw.and_then(|value| OrderStatus::from_wire(value).ok())
        .map(OrderStatus::tag)
        .unwrap_or(StatusTag::Unknown)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub sku: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl LineItem {
    pub fn new(
        sku: Option<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: f64,
    ) -> Result<Self, OrderError> {
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(OrderError::validation(format!(
                "unit price must be non-negative, got {unit_price}"
            )));
        }
        Ok(Self {
            sku,
            name: name.into(),
            quantity,
            unit_price,
        })
    }

    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub external_id: String,
    pub tracking_code: TrackingCode,
    pub status: OrderStatus,
    pub location: String,
    pub last_updated_at: Option<NaiveDateTime>,
    pub origin_marker: Option<String>,
    pub origin_service: Option<String>,
    pub customer: Option<Customer>,
    pub line_items: Option<Vec<LineItem>>,
}

impl Order {
    /// Summary-form order: no customer, no line items.
    pub fn summary(
        external_id: impl Into<String>,
        tracking_code: TrackingCode,
        status: OrderStatus,
        location: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            tracking_code,
            status,
            location: location.into(),
            last_updated_at: None,
            origin_marker: None,
            origin_service: None,
            customer: None,
            line_items: None,
        }
    }

    pub fn is_detailed(&self) -> bool {
        self.customer.is_some() && self.line_items.is_some()
    }

    pub fn order_total(&self) -> Option<f64> {
        self.line_items
            .as_ref()
            .map(|items| items.iter().map(LineItem::line_total).sum())
    }
}

/// Status/location pair being edited for the focused order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDraft {
    pub status: Option<OrderStatus>,
    pub location: String,
}

impl StatusDraft {
    pub fn new(status: Option<OrderStatus>, location: impl Into<String>) -> Self {
        Self {
            status,
            location: location.into(),
        }
    }

    /// Both fields are required before the draft may leave the client.
    pub fn validate(&self) -> Result<(OrderStatus, &str), OrderError> {
        let location = self.location.trim();
        match self.status {
            Some(status) if !location.is_empty() => Ok((status, location)),
            _ => Err(OrderError::validation("status and location are required")),
        }
    }

    pub fn clear(&mut self) {
        self.status = None;
        self.location.clear();
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
