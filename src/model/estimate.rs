use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{default_tax_rate, Id, RecordPayload};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemKind {
    Service,
    Material,
    Labor,
    Equipment,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[serde(default = "default_true")]
    pub is_taxable: bool,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default = "default_true")]
    pub is_selected: bool,
}

impl LineItem {
    pub fn new(kind: LineItemKind, name: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            quantity,
            unit_price,
            unit_cost: Decimal::ZERO,
            is_taxable: true,
            is_optional: false,
            is_selected: true,
        }
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn taxable(mut self, is_taxable: bool) -> Self {
        self.is_taxable = is_taxable;
        self
    }

    /// quantity × unit price, `None` when it does not fit a decimal
    pub fn amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }

    /// quantity × unit cost, `None` when it does not fit a decimal
    pub fn cost(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_cost)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[default]
    None,
    Percentage,
    FixedAmount,
}

/// One selectable pricing package within an estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_recommended: bool,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: Decimal,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl EstimateOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_recommended: false,
            discount_type: DiscountType::None,
            discount_value: Decimal::ZERO,
            line_items: Vec::new(),
        }
    }

    pub fn with_discount(mut self, discount_type: DiscountType, discount_value: Decimal) -> Self {
        self.discount_type = discount_type;
        self.discount_value = discount_value;
        self
    }

    pub fn with_line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn add_line_item(&mut self, item: LineItem) {
        self.line_items.push(item);
    }

    /// Apply `update` to the line item at `index`; false when out of range
    pub fn update_line_item<F>(&mut self, index: usize, update: F) -> bool
    where
        F: FnOnce(&mut LineItem),
    {
        match self.line_items.get_mut(index) {
            Some(item) => {
                update(item);
                true
            }
            None => false,
        }
    }

    pub fn remove_line_item(&mut self, index: usize) -> Option<LineItem> {
        if index < self.line_items.len() {
            Some(self.line_items.remove(index))
        } else {
            None
        }
    }

    /// Copy of this option under a new name, never recommended
    pub fn duplicate(&self) -> Self {
        Self {
            name: format!("{} (Copy)", self.name.trim()),
            is_recommended: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Declined,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "DRAFT",
            EstimateStatus::Sent => "SENT",
            EstimateStatus::Accepted => "ACCEPTED",
            EstimateStatus::Declined => "DECLINED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(EstimateStatus::Draft),
            "SENT" => Some(EstimateStatus::Sent),
            "ACCEPTED" => Some(EstimateStatus::Accepted),
            "DECLINED" => Some(EstimateStatus::Declined),
            _ => None,
        }
    }
}

/// Editable estimate content shared by drafts, payloads and stored estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateBody {
    pub title: String,
    /// Tax rate in percent
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub status: EstimateStatus,
    #[serde(default)]
    pub options: Vec<EstimateOption>,
}

impl EstimateBody {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tax_rate: default_tax_rate(),
            status: EstimateStatus::Draft,
            options: Vec::new(),
        }
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_option(mut self, option: EstimateOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn add_option(&mut self, option: EstimateOption) {
        self.options.push(option);
    }

    /// Remove an option; the last remaining option is never removed
    pub fn remove_option(&mut self, index: usize) -> Option<EstimateOption> {
        if self.options.len() <= 1 || index >= self.options.len() {
            return None;
        }
        Some(self.options.remove(index))
    }

    pub fn duplicate_option(&mut self, index: usize) -> bool {
        match self.options.get(index).map(EstimateOption::duplicate) {
            Some(copy) => {
                self.options.insert(index + 1, copy);
                true
            }
            None => false,
        }
    }

    /// Mark a single option as recommended, clearing the flag on the others
    pub fn recommend_option(&mut self, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        for (i, option) in self.options.iter_mut().enumerate() {
            option.is_recommended = i == index;
        }
        true
    }
}

pub type EstimatePayload = RecordPayload<EstimateBody>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub id: Id,
    pub tenant_id: Id,
    pub customer_id: Id,
    pub address_id: Option<Id>,
    #[serde(flatten)]
    pub body: EstimateBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
