//! Stateless access to the remote order service.
//!
//! Each call is a single HTTP exchange with no retry. Failures are folded into
//! the three [`OrderError`] kinds; transport details are logged, never shown.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Order, StatusDraft, TrackingCode},
    error::{OrderError, ServiceErrorBody},
    protocol::{
        AddressChange, AddressUpdateRequest, DailyClosingReport, OrderRecord,
        StatusUpdateRequest,
    },
};
use tracing::{debug, info, warn};

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn fetch_by_code(&self, code: &TrackingCode) -> Result<Order, OrderError>;
    async fn fetch_detailed_by_code(&self, code: &TrackingCode) -> Result<Order, OrderError>;
    async fn fetch_all(&self) -> Result<Vec<Order>, OrderError>;
    async fn update_status(
        &self,
        code: &TrackingCode,
        draft: &StatusDraft,
    ) -> Result<Order, OrderError>;
    async fn update_address(
        &self,
        code: &TrackingCode,
        address: &str,
    ) -> Result<AddressChange, OrderError>;
    async fn fetch_daily_closing(&self) -> Result<DailyClosingReport, OrderError>;
}

pub struct HttpOrderService {
    http: Client,
    service_url: String,
}

impl HttpOrderService {
    pub fn new(service_url: impl Into<String>, timeout: Duration) -> Result<Self, OrderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| OrderError::transport(format!("failed to build http client: {err}")))?;
        Ok(Self::with_client(http, service_url))
    }

    pub fn with_client(http: Client, service_url: impl Into<String>) -> Self {
        let service_url = service_url.into().trim_end_matches('/').to_string();
        Self { http, service_url }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.service_url)
    }

    async fn get_order(&self, path: String, code: &TrackingCode) -> Result<Order, OrderError> {
        let response = self.send(self.http.get(self.url(&path)), &path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!(tracking_code = %code, "order service reported order not found");
            return Err(OrderError::not_found(code.as_str()));
        }
        let record: OrderRecord = decode(response, &path).await?;
        into_order(record, &path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<Response, OrderError> {
        let response = request.send().await.map_err(|err| {
            warn!(path, error = %err, "order service request failed");
            OrderError::transport(err.to_string())
        })?;
        debug!(path, status = %response.status(), "order service responded");
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, OrderError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<ServiceErrorBody>()
            .await
            .map(|body| body.detail)
            .unwrap_or_default();
        warn!(path, %status, detail = %detail, "order service returned an error status");
        return Err(OrderError::transport(if detail.is_empty() {
            format!("unexpected status {status}")
        } else {
            format!("unexpected status {status}: {detail}")
        }));
    }
    response.json::<T>().await.map_err(|err| {
        warn!(path, error = %err, "order service returned an undecodable body");
        OrderError::transport(format!("malformed response: {err}"))
    })
}

fn into_order(record: OrderRecord, path: &str) -> Result<Order, OrderError> {
    Order::try_from(record).map_err(|err| {
        warn!(path, error = %err, "order service returned an invalid order");
        OrderError::transport(format!("malformed response: {err}"))
    })
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn fetch_by_code(&self, code: &TrackingCode) -> Result<Order, OrderError> {
        self.get_order(format!("/ordenes/{code}"), code).await
    }

    async fn fetch_detailed_by_code(&self, code: &TrackingCode) -> Result<Order, OrderError> {
        let order = self
            .get_order(format!("/interna/ordenes-completa/{code}"), code)
            .await?;
        if !order.is_detailed() {
            warn!(tracking_code = %code, "detailed order response is missing customer or products");
            return Err(OrderError::transport(
                "malformed response: detailed order without customer or products",
            ));
        }
        Ok(order)
    }

    async fn fetch_all(&self) -> Result<Vec<Order>, OrderError> {
        let path = "/interna/ordenes";
        let response = self.send(self.http.get(self.url(path)), path).await?;
        let records: Vec<OrderRecord> = decode(response, path).await?;
        let orders = records
            .into_iter()
            .map(|record| into_order(record, path))
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = orders.len(), "fetched order list");
        Ok(orders)
    }

    async fn update_status(
        &self,
        code: &TrackingCode,
        draft: &StatusDraft,
    ) -> Result<Order, OrderError> {
        let (status, location) = draft.validate()?;
        let path = format!("/interna/ordenes/{code}/estado");
        let body = StatusUpdateRequest {
            estado: status,
            ubicacion: location.to_string(),
        };
        let response = self
            .send(self.http.patch(self.url(&path)).json(&body), &path)
            .await?;
        let record: OrderRecord = decode(response, &path).await?;
        let order = into_order(record, &path)?;
        info!(tracking_code = %code, status = %order.status, "order status updated");
        Ok(order)
    }

    async fn update_address(
        &self,
        code: &TrackingCode,
        address: &str,
    ) -> Result<AddressChange, OrderError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(OrderError::validation("new address is required"));
        }
        let path = format!("/interna/ordenes/{code}/direccion");
        let body = AddressUpdateRequest {
            nueva_direccion: address.to_string(),
        };
        let response = self
            .send(self.http.patch(self.url(&path)).json(&body), &path)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(OrderError::not_found(code.as_str()));
        }
        let change: AddressChange = decode(response, &path).await?;
        info!(tracking_code = %code, "order address updated");
        Ok(change)
    }

    async fn fetch_daily_closing(&self) -> Result<DailyClosingReport, OrderError> {
        let path = "/interna/cierre-diario";
        let response = self.send(self.http.get(self.url(path)), path).await?;
        let report: DailyClosingReport = decode(response, path).await?;
        info!(total = report.total, date = %report.report_date, "fetched daily closing report");
        Ok(report)
    }
}

#[cfg(test)]
#[path = "tests/sync_client_tests.rs"]
mod tests;
