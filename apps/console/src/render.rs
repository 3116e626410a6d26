use std::fmt::Write as _;

use client_core::{
    tenancy::{TenantId, TenantMembership, TenantSummary, TenantTable},
    MessageKind, SessionSnapshot,
};
use shared::{domain::Order, protocol::DailyClosingReport};

fn tenant_name(tenants: &TenantTable, tenant_id: &TenantId) -> String {
    tenants
        .rule(tenant_id)
        .map(|rule| rule.display_name.clone())
        .unwrap_or_else(|| tenant_id.to_string())
}

fn membership_label(tenants: &TenantTable, order: &Order) -> String {
    match tenants.classify(order) {
        TenantMembership::Unclassified => "-".into(),
        TenantMembership::Single(id) => tenant_name(tenants, &id),
        TenantMembership::Ambiguous(ids) => {
            let names: Vec<_> = ids.iter().map(|id| tenant_name(tenants, id)).collect();
            format!("{} (ambiguous)", names.join("+"))
        }
    }
}

pub fn render_snapshot(snapshot: &SessionSnapshot, tenants: &TenantTable) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "view={} orders={} revision={}{}",
        snapshot.view,
        snapshot.orders.len(),
        snapshot.list_revision,
        if snapshot.list_loading { " (refreshing)" } else { "" }
    );
    for order in &snapshot.orders {
        let _ = writeln!(
            out,
            "  {:<10} {:<14} {:<12} {:<28} {}",
            order.tracking_code,
            order.external_id,
            order.status.label(),
            order.location,
            membership_label(tenants, order)
        );
    }

    if snapshot.loading {
        let _ = writeln!(out, "loading...");
    }

    match &snapshot.focused {
        Some(order) => render_focused(&mut out, order),
        None => {
            let _ = writeln!(out, "no order focused");
        }
    }

    let _ = writeln!(
        out,
        "input: status={} location=\"{}\"",
        snapshot
            .status_input
            .map(|status| status.token().to_string())
            .unwrap_or_else(|| "-".into()),
        snapshot.location_input
    );

    if let Some(message) = &snapshot.message {
        let marker = match message.kind {
            MessageKind::Success => "ok",
            MessageKind::Warning => "warn",
            MessageKind::Error => "error",
        };
        let _ = writeln!(out, "[{marker}] {}", message.text);
    }

    out
}

fn render_focused(out: &mut String, order: &Order) {
    let _ = writeln!(
        out,
        "focused: {} ({}) {} @ {}",
        order.tracking_code,
        order.external_id,
        order.status.label(),
        order.location
    );
    if let Some(at) = order.last_updated_at {
        let _ = writeln!(out, "  updated: {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(service) = &order.origin_service {
        let _ = writeln!(out, "  origin: {service}");
    }
    if let Some(customer) = &order.customer {
        let _ = writeln!(
            out,
            "  customer: {} | {} | {}{}",
            customer.name,
            customer.address,
            customer.phone,
            customer
                .email
                .as_deref()
                .map(|email| format!(" | {email}"))
                .unwrap_or_default()
        );
    }
    if let Some(items) = &order.line_items {
        for item in items {
            let _ = writeln!(
                out,
                "  {} x{} @ {:.2} = {:.2}",
                item.name,
                item.quantity,
                item.unit_price,
                item.line_total()
            );
        }
        if let Some(total) = order.order_total() {
            let _ = writeln!(out, "  total: {total:.2}");
        }
    }
}

pub fn render_tenant_summary(summary: &TenantSummary, tenants: &TenantTable) -> String {
    let mut out = String::new();
    for (tenant, count) in &summary.per_tenant {
        let _ = writeln!(out, "{} [{tenant}]: {count}", tenant_name(tenants, tenant));
    }
    let _ = writeln!(out, "unclassified: {}", summary.unclassified);
    if summary.ambiguous > 0 {
        let _ = writeln!(
            out,
            "ambiguous: {} (matched by more than one tenant rule)",
            summary.ambiguous
        );
    }
    out
}

pub fn render_closing(report: &DailyClosingReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "daily closing {}: {} deliveries",
        report.report_date, report.total
    );
    for entry in &report.deliveries {
        let _ = writeln!(
            out,
            "  {:<10} {:<14} {:<16} {} ({} products)",
            entry.tracking_code,
            entry.external_id,
            entry.origin_service,
            entry.customer,
            entry.product_count
        );
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
