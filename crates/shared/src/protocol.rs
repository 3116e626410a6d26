//! Wire representations exchanged with the order service.
//!
//! Records are decoded leniently (every field optional) and then converted
//! into domain types, so a malformed payload surfaces as a validation error
//! instead of a serde failure deep inside the HTTP layer.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{Customer, LineItem, Order, OrderStatus, TrackingCode},
    error::OrderError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_orden_externa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codigo_seguimiento: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado_actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubicacion_actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_actualizacion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servicio_origen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Object, or a JSON-encoded string on status-update responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cliente: Option<Value>,
    /// Array, or a JSON-encoded string on status-update responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub productos: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub nombre: String,
    pub direccion: String,
    pub telefono: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub nombre: String,
    #[serde(default = "default_quantity")]
    pub cantidad: u32,
    pub precio_unitario: f64,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub estado: OrderStatus,
    pub ubicacion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUpdateRequest {
    pub nueva_direccion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressChange {
    #[serde(rename = "id_orden_externa")]
    pub external_id: String,
    #[serde(rename = "codigo_seguimiento")]
    pub tracking_code: TrackingCode,
    #[serde(rename = "nueva_direccion")]
    pub new_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyClosingReport {
    #[serde(rename = "fecha_reporte")]
    pub report_date: NaiveDate,
    #[serde(rename = "total_entregas_para_cierre")]
    pub total: usize,
    #[serde(rename = "entregas")]
    pub deliveries: Vec<ClosingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingEntry {
    #[serde(rename = "id_orden_externa")]
    pub external_id: String,
    #[serde(rename = "codigo_seguimiento")]
    pub tracking_code: String,
    #[serde(rename = "servicio_origen")]
    pub origin_service: String,
    #[serde(rename = "cliente")]
    pub customer: String,
    #[serde(rename = "productos_count")]
    pub product_count: usize,
    #[serde(rename = "entregado_a_tiempo")]
    pub on_time: String,
    #[serde(rename = "estado")]
    pub status: String,
}

/// Accepts RFC 3339 timestamps and the offset-less ISO form the service emits.
pub fn parse_service_timestamp(raw: &str) -> Result<NaiveDateTime, OrderError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|err| OrderError::validation(format!("invalid timestamp '{raw}': {err}")))
}

fn decode_embedded<T: DeserializeOwned>(field: &str, value: Value) -> Result<T, OrderError> {
    let decoded = match value {
        Value::String(encoded) => serde_json::from_str(&encoded),
        other => serde_json::from_value(other),
    };
    decoded.map_err(|err| OrderError::validation(format!("malformed {field}: {err}")))
}

impl From<CustomerRecord> for Customer {
    fn from(record: CustomerRecord) -> Self {
        Self {
            name: record.nombre,
            address: record.direccion,
            phone: record.telefono,
            email: record.email,
        }
    }
}

impl TryFrom<ProductRecord> for LineItem {
    type Error = OrderError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        LineItem::new(
            record.sku,
            record.nombre,
            record.cantidad,
            record.precio_unitario,
        )
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let tracking_code = record
            .codigo_seguimiento
            .as_deref()
            .ok_or_else(|| OrderError::validation("order is missing its tracking code"))
            .and_then(TrackingCode::parse)?;
        let status = record
            .estado_actual
            .as_deref()
            .ok_or_else(|| {
                OrderError::validation(format!("order {tracking_code} is missing its status"))
            })
            .and_then(OrderStatus::from_wire)?;
        let last_updated_at = record
            .fecha_actualizacion
            .as_deref()
            .map(parse_service_timestamp)
            .transpose()?;
        let customer = record
            .cliente
            .filter(|value| !value.is_null())
            .map(|value| decode_embedded::<CustomerRecord>("cliente", value))
            .transpose()?
            .map(Customer::from);
        let line_items = record
            .productos
            .filter(|value| !value.is_null())
            .map(|value| decode_embedded::<Vec<ProductRecord>>("productos", value))
            .transpose()?
            .map(|products| {
                products
                    .into_iter()
                    .map(LineItem::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(Order {
            external_id: record.id_orden_externa.unwrap_or_default(),
            tracking_code,
            status,
            location: record.ubicacion_actual.unwrap_or_default(),
            last_updated_at,
            origin_marker: record.webhook_url,
            origin_service: record.servicio_origen,
            customer,
            line_items,
        })
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
