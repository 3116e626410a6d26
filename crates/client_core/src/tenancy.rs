//! Tenant segmentation over the shared order list.
//!
//! A tenant owns every order whose origin marker contains the tenant's
//! marker fragment. Rules are evaluated independently, so one order can match
//! several tenants; [`TenantTable::classify`] reports that as
//! [`TenantMembership::Ambiguous`] instead of picking a winner.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use shared::{domain::Order, error::OrderError};

const ALL_VIEW_LABEL: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(raw: &str) -> Result<Self, OrderError> {
        let id = raw.trim().to_ascii_lowercase();
        if id.is_empty() {
            return Err(OrderError::validation("tenant id must not be empty"));
        }
        if id.eq_ignore_ascii_case(ALL_VIEW_LABEL) {
            return Err(OrderError::validation(
                "tenant id 'all' is reserved for the unfiltered view",
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRule {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub marker_fragment: String,
}

impl TenantRule {
    pub fn matches(&self, order: &Order) -> bool {
        order
            .origin_marker
            .as_deref()
            .is_some_and(|marker| marker.contains(&self.marker_fragment))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantMembership {
    Unclassified,
    Single(TenantId),
    /// More than one rule matched; a table misconfiguration to surface.
    Ambiguous(Vec<TenantId>),
}

impl TenantMembership {
    pub fn contains(&self, tenant_id: &TenantId) -> bool {
        match self {
            TenantMembership::Unclassified => false,
            TenantMembership::Single(id) => id == tenant_id,
            TenantMembership::Ambiguous(ids) => ids.contains(tenant_id),
        }
    }
}

/// Which slice of the order list is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantView {
    #[default]
    All,
    Tenant(TenantId),
}

impl fmt::Display for TenantView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantView::All => f.write_str(ALL_VIEW_LABEL),
            TenantView::Tenant(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSummary {
    pub per_tenant: BTreeMap<TenantId, usize>,
    pub unclassified: usize,
    pub ambiguous: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantTable {
    rules: Vec<TenantRule>,
}

impl TenantTable {
    pub fn new(rules: Vec<TenantRule>) -> Result<Self, OrderError> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.marker_fragment.is_empty() {
                return Err(OrderError::validation(format!(
                    "tenant '{}' has an empty marker fragment",
                    rule.tenant_id
                )));
            }
            if rules[..index]
                .iter()
                .any(|earlier| earlier.tenant_id == rule.tenant_id)
            {
                return Err(OrderError::validation(format!(
                    "tenant '{}' is defined more than once",
                    rule.tenant_id
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[TenantRule] {
        &self.rules
    }

    pub fn rule(&self, tenant_id: &TenantId) -> Option<&TenantRule> {
        self.rules.iter().find(|rule| &rule.tenant_id == tenant_id)
    }

    pub fn classify(&self, order: &Order) -> TenantMembership {
        let mut matched: Vec<TenantId> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(order))
            .map(|rule| rule.tenant_id.clone())
            .collect();
        match matched.len() {
            0 => TenantMembership::Unclassified,
            1 => TenantMembership::Single(matched.remove(0)),
            _ => {
                matched.sort();
                TenantMembership::Ambiguous(matched)
            }
        }
    }

    /// Resolves a view label typed by the operator. `ALL` is case-insensitive.
    pub fn resolve_view(&self, label: &str) -> Result<TenantView, OrderError> {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case(ALL_VIEW_LABEL) {
            return Ok(TenantView::All);
        }
        let tenant_id = TenantId::new(label)?;
        if self.rule(&tenant_id).is_none() {
            return Err(OrderError::validation(format!("unknown tenant view '{label}'")));
        }
        Ok(TenantView::Tenant(tenant_id))
    }

    pub fn visible<'a>(&self, orders: &'a [Order], view: &TenantView) -> Vec<&'a Order> {
        match view {
            TenantView::All => orders.iter().collect(),
            TenantView::Tenant(tenant_id) => match self.rule(tenant_id) {
                Some(rule) => orders.iter().filter(|order| rule.matches(order)).collect(),
                None => Vec::new(),
            },
        }
    }

    pub fn ambiguous<'a>(&self, orders: &'a [Order]) -> Vec<&'a Order> {
        orders
            .iter()
            .filter(|order| matches!(self.classify(order), TenantMembership::Ambiguous(_)))
            .collect()
    }

    pub fn summarize(&self, orders: &[Order]) -> TenantSummary {
        let mut summary = TenantSummary {
            per_tenant: self
                .rules
                .iter()
                .map(|rule| (rule.tenant_id.clone(), 0))
                .collect(),
            ..TenantSummary::default()
        };
        for order in orders {
            match self.classify(order) {
                TenantMembership::Unclassified => summary.unclassified += 1,
                TenantMembership::Single(id) => {
                    *summary.per_tenant.entry(id).or_default() += 1;
                }
                TenantMembership::Ambiguous(ids) => {
                    summary.ambiguous += 1;
                    for id in ids {
                        *summary.per_tenant.entry(id).or_default() += 1;
                    }
                }
            }
        }
        summary
    }
}

impl Default for TenantTable {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

fn default_rules() -> Vec<TenantRule> {
    vec![
        TenantRule {
            tenant_id: TenantId("cafeteria".into()),
            display_name: "Cafeteria".into(),
            marker_fragment: "cafeteria".into(),
        },
        TenantRule {
            tenant_id: TenantId("vandentials".into()),
            display_name: "Vandentials".into(),
            marker_fragment: "e-commerce-test-mm6o".into(),
        },
    ]
}

#[cfg(test)]
#[path = "tests/tenancy_tests.rs"]
mod tests;
