use super::*;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::OrderStatus;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServiceState {
    status_patches: Arc<Mutex<Vec<(String, Value)>>>,
    address_patches: Arc<Mutex<Vec<(String, Value)>>>,
    fail_list: Arc<Mutex<bool>>,
    malformed_list: Arc<Mutex<bool>>,
}

fn record(code: &str, estado: &str, webhook: &str) -> Value {
    json!({
        "id_orden_externa": format!("EXT-{code}"),
        "codigo_seguimiento": code,
        "estado_actual": estado,
        "ubicacion_actual": "Bodega central",
        "fecha_actualizacion": "2025-11-02T14:05:09.123456",
        "servicio_origen": "Cafeteria",
        "webhook_url": webhook
    })
}

async fn fetch_order(Path(code): Path<String>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match code.as_str() {
        "8F3A7" => Ok(Json(record(
            "8F3A7",
            "FECHA_SET",
            "https://hooks.example.com/cafeteria/webhook",
        ))),
        "BROKEN" => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "database unavailable"})),
        )),
        _ => Err((
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Código de seguimiento no encontrado."})),
        )),
    }
}

async fn fetch_detailed(Path(code): Path<String>) -> Result<Json<Value>, StatusCode> {
    if code != "8F3A7" {
        return Err(StatusCode::NOT_FOUND);
    }
    let mut body = record(&code, "FECHA_SET", "https://hooks.example.com/cafeteria/webhook");
    body["cliente"] = json!({
        "nombre": "Ana Perez",
        "direccion": "Av. Central 12",
        "telefono": "555-0101",
        "email": "ana@example.com"
    });
    body["productos"] = json!([
        {"sku": "C-1", "nombre": "Cafe molido", "cantidad": 2, "precio_unitario": 4.5}
    ]);
    Ok(Json(body))
}

async fn list_orders(State(state): State<ServiceState>) -> Result<Json<Value>, StatusCode> {
    if *state.fail_list.lock().await {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    if *state.malformed_list.lock().await {
        return Ok(Json(json!([{"codigo_seguimiento": "AA1", "estado_actual": "PERDIDA"}])));
    }
    Ok(Json(json!([
        record("8F3A7", "FECHA_SET", "https://hooks.example.com/cafeteria/webhook"),
        record("B77C1", "RECIBIDA", "https://shop.example.com/e-commerce-test-mm6o/webhook")
    ])))
}

async fn patch_status(
    State(state): State<ServiceState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state
        .status_patches
        .lock()
        .await
        .push((code.clone(), body.clone()));
    let estado = body["estado"].as_str().unwrap_or_default().to_string();
    let mut updated = record(&code, &estado, "https://hooks.example.com/cafeteria/webhook");
    updated["ubicacion_actual"] = body["ubicacion"].clone();
    updated["cliente"] = json!("{\"nombre\": \"Ana\", \"direccion\": \"Av. 1\", \"telefono\": \"1\"}");
    updated["productos"] = json!("[]");
    Json(updated)
}

async fn patch_address(
    State(state): State<ServiceState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if code != "8F3A7" {
        return Err(StatusCode::NOT_FOUND);
    }
    state
        .address_patches
        .lock()
        .await
        .push((code.clone(), body.clone()));
    Ok(Json(json!({
        "mensaje": "Dirección actualizada correctamente",
        "id_orden_externa": "EXT-8F3A7",
        "codigo_seguimiento": code,
        "nueva_direccion": body["nueva_direccion"]
    })))
}

async fn daily_closing() -> Json<Value> {
    Json(json!({
        "fecha_reporte": "2025-11-02",
        "total_entregas_para_cierre": 1,
        "entregas": [{
            "id_orden_externa": "EXT-1",
            "codigo_seguimiento": "AB12",
            "servicio_origen": "Cafeteria",
            "cliente": "Ana (Av. 1)",
            "productos_count": 2,
            "entregado_a_tiempo": "Sí (Simulado)",
            "estado": "El producto fue entregado al cliente"
        }]
    }))
}

async fn spawn_order_service() -> anyhow::Result<(String, ServiceState)> {
    let state = ServiceState::default();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/ordenes/:code", get(fetch_order))
        .route("/interna/ordenes-completa/:code", get(fetch_detailed))
        .route("/interna/ordenes", get(list_orders))
        .route("/interna/ordenes/:code/estado", patch(patch_status))
        .route("/interna/ordenes/:code/direccion", patch(patch_address))
        .route("/interna/cierre-diario", get(daily_closing))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn client(url: &str) -> HttpOrderService {
    HttpOrderService::new(url, Duration::from_secs(5)).expect("client")
}

fn code(raw: &str) -> TrackingCode {
    TrackingCode::parse(raw).expect("code")
}

#[tokio::test]
async fn fetch_by_code_returns_normalized_order() {
    let (url, _) = spawn_order_service().await.expect("spawn service");

    let order = client(&url)
        .fetch_by_code(&code("8f3a7"))
        .await
        .expect("order");

    assert_eq!(order.tracking_code.as_str(), "8F3A7");
    assert_eq!(order.status, OrderStatus::DateSet);
    assert!(!order.is_detailed());
}

#[tokio::test]
async fn fetch_by_code_maps_404_to_not_found() {
    let (url, _) = spawn_order_service().await.expect("spawn service");

    let err = client(&url)
        .fetch_by_code(&code("ZZZ99"))
        .await
        .expect_err("missing order");

    assert_eq!(err, OrderError::not_found("ZZZ99"));
}

#[tokio::test]
async fn fetch_by_code_maps_server_errors_to_transport() {
    let (url, _) = spawn_order_service().await.expect("spawn service");

    let err = client(&url)
        .fetch_by_code(&code("BROKEN"))
        .await
        .expect_err("server error");

    match err {
        OrderError::Transport(message) => {
            assert!(message.contains("500"));
            assert!(message.contains("database unavailable"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .fetch_all()
        .await
        .expect_err("nothing listening");

    assert!(matches!(err, OrderError::Transport(_)));
}

#[tokio::test]
async fn fetch_detailed_includes_customer_and_line_items() {
    let (url, _) = spawn_order_service().await.expect("spawn service");

    let order = client(&url)
        .fetch_detailed_by_code(&code("8F3A7"))
        .await
        .expect("detailed order");

    assert!(order.is_detailed());
    assert_eq!(
        order.customer.as_ref().expect("customer").email.as_deref(),
        Some("ana@example.com")
    );
    assert_eq!(order.order_total(), Some(9.0));
}

#[tokio::test]
async fn fetch_all_returns_every_order_or_fails_entirely() {
    let (url, state) = spawn_order_service().await.expect("spawn service");
    let service = client(&url);

    let orders = service.fetch_all().await.expect("list");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].tracking_code.as_str(), "B77C1");

    *state.malformed_list.lock().await = true;
    assert!(matches!(
        service.fetch_all().await,
        Err(OrderError::Transport(_))
    ));

    *state.malformed_list.lock().await = false;
    *state.fail_list.lock().await = true;
    assert!(matches!(
        service.fetch_all().await,
        Err(OrderError::Transport(_))
    ));
}

#[tokio::test]
async fn update_status_patches_with_service_tokens() {
    let (url, state) = spawn_order_service().await.expect("spawn service");
    let draft = StatusDraft::new(Some(OrderStatus::InTransit), "Centro de distribución");

    let order = client(&url)
        .update_status(&code("8F3A7"), &draft)
        .await
        .expect("updated order");

    assert_eq!(order.status, OrderStatus::InTransit);
    assert_eq!(order.location, "Centro de distribución");
    assert_eq!(order.customer.expect("customer").name, "Ana");

    let patches = state.status_patches.lock().await;
    assert_eq!(
        patches.as_slice(),
        &[(
            "8F3A7".to_string(),
            json!({"estado": "EN_CAMINO", "ubicacion": "Centro de distribución"})
        )]
    );
}

#[tokio::test]
async fn update_status_with_missing_fields_never_reaches_the_service() {
    let (url, state) = spawn_order_service().await.expect("spawn service");
    let service = client(&url);

    let no_status = StatusDraft::new(None, "Centro");
    let no_location = StatusDraft::new(Some(OrderStatus::Delivered), "  ");

    assert!(matches!(
        service.update_status(&code("8F3A7"), &no_status).await,
        Err(OrderError::Validation(_))
    ));
    assert!(matches!(
        service.update_status(&code("8F3A7"), &no_location).await,
        Err(OrderError::Validation(_))
    ));
    assert!(state.status_patches.lock().await.is_empty());
}

#[tokio::test]
async fn update_address_patches_and_decodes_change() {
    let (url, state) = spawn_order_service().await.expect("spawn service");
    let service = client(&url);

    let change = service
        .update_address(&code("8F3A7"), " Calle Norte 5 ")
        .await
        .expect("address change");
    assert_eq!(change.new_address, "Calle Norte 5");
    assert_eq!(
        state.address_patches.lock().await[0].1,
        json!({"nueva_direccion": "Calle Norte 5"})
    );

    assert!(matches!(
        service.update_address(&code("8F3A7"), "").await,
        Err(OrderError::Validation(_))
    ));
    assert!(matches!(
        service.update_address(&code("NOPE1"), "Calle 1").await,
        Err(OrderError::NotFound(_))
    ));
}

#[tokio::test]
async fn fetch_daily_closing_decodes_report() {
    let (url, _) = spawn_order_service().await.expect("spawn service");

    let report = client(&url)
        .fetch_daily_closing()
        .await
        .expect("report");

    assert_eq!(report.total, 1);
    assert_eq!(report.deliveries[0].tracking_code, "AB12");
}

#[test]
fn trailing_slash_is_trimmed_from_service_url() {
    let service = client("http://localhost:8000/");
    assert_eq!(service.service_url(), "http://localhost:8000");
}
