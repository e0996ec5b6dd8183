//! Billing resources as exchanged with the backend (camelCase JSON).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gst::{self, GstBreakdown, InvoiceTotals, LineItem, Paise, SupplyKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Explicit state code, else the GSTIN prefix.
fn effective_state(state_code: &Option<String>, gstin: &Option<String>) -> Option<String> {
    state_code
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| gstin.as_deref().and_then(|g| gst::state_code_from_gstin(g).ok()))
}

impl Business {
    pub fn state(&self) -> Option<String> {
        effective_state(&self.state_code, &self.gstin)
    }
}

impl Client {
    pub fn state(&self) -> Option<String> {
        effective_state(&self.state_code, &self.gstin)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    pub account_holder: String,
    pub account_number: String,
    pub ifsc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn_sac: Option<String>,
    pub quantity: u32,
    /// Paise.
    pub unit_price: Paise,
    #[serde(default)]
    pub discount: Paise,
    /// Basis points.
    pub gst_rate: u32,
    /// Filled in by [`Invoice::apply_totals`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<GstBreakdown>,
}

impl InvoiceLine {
    pub fn line_item(&self) -> LineItem {
        LineItem {
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: self.discount,
            rate_bp: self.gst_rate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub business_id: String,
    pub client_id: String,
    pub issue_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// State code where the supply is made; defaults to the client's state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_supply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_kind: Option<SupplyKind>,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub lines: Vec<InvoiceLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<InvoiceTotals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Invoice {
    /// Compute GST for every line and store the per-line and invoice totals.
    pub fn apply_totals(&mut self, kind: SupplyKind) -> Result<(), gst::GstError> {
        let items: Vec<LineItem> = self.lines.iter().map(InvoiceLine::line_item).collect();
        let totals = gst::compute_invoice(&items, kind)?;
        for (line, tax) in self.lines.iter_mut().zip(&totals.lines) {
            line.tax = Some(*tax);
        }
        self.supply_kind = Some(kind);
        self.totals = Some(totals);
        Ok(())
    }
}
