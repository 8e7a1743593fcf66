use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DiscountType, EstimateOption, LineItem};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Amounts are too large to price")]
    Overflow,
}

pub type PricingResult<T> = Result<T, PricingError>;

fn add(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_add(b).ok_or(PricingError::Overflow)
}

fn sub(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_sub(b).ok_or(PricingError::Overflow)
}

fn mul(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_mul(b).ok_or(PricingError::Overflow)
}

fn div(a: Decimal, b: Decimal) -> PricingResult<Decimal> {
    a.checked_div(b).ok_or(PricingError::Overflow)
}

fn sum(amounts: impl IntoIterator<Item = PricingResult<Decimal>>) -> PricingResult<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| add(acc, amount?))
}

/// Monetary totals derived from line items. Values are exact; call
/// [`Totals::rounded`] for presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub total_cost: Decimal,
    pub gross_profit: Decimal,
}

impl Totals {
    /// Round every amount to cents, midpoint away from zero
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: round_currency(self.subtotal),
            discount_amount: round_currency(self.discount_amount),
            taxable_amount: round_currency(self.taxable_amount),
            tax_amount: round_currency(self.tax_amount),
            total: round_currency(self.total),
            total_cost: round_currency(self.total_cost),
            gross_profit: round_currency(self.gross_profit),
        }
    }

    fn accumulate(self, other: &Totals) -> PricingResult<Self> {
        Ok(Self {
            subtotal: add(self.subtotal, other.subtotal)?,
            discount_amount: add(self.discount_amount, other.discount_amount)?,
            taxable_amount: add(self.taxable_amount, other.taxable_amount)?,
            tax_amount: add(self.tax_amount, other.tax_amount)?,
            total: add(self.total, other.total)?,
            total_cost: add(self.total_cost, other.total_cost)?,
            gross_profit: add(self.gross_profit, other.gross_profit)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTotals {
    pub name: String,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Per-option totals plus their plain sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateTotals {
    pub options: Vec<OptionTotals>,
    #[serde(flatten)]
    pub totals: Totals,
}

impl EstimateTotals {
    pub fn rounded(&self) -> Self {
        Self {
            options: self
                .options
                .iter()
                .map(|option| OptionTotals {
                    name: option.name.clone(),
                    totals: option.totals.rounded(),
                })
                .collect(),
            totals: self.totals.rounded(),
        }
    }
}

pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// quantity × unit price
pub fn line_amount(item: &LineItem) -> PricingResult<Decimal> {
    item.amount().ok_or(PricingError::Overflow)
}

/// quantity × unit cost
pub fn line_cost(item: &LineItem) -> PricingResult<Decimal> {
    item.cost().ok_or(PricingError::Overflow)
}

/// Discount for a subtotal. Fixed amounts pass through unclamped.
pub fn discount_amount(
    subtotal: Decimal,
    discount_type: DiscountType,
    discount_value: Decimal,
) -> PricingResult<Decimal> {
    match discount_type {
        DiscountType::None => Ok(Decimal::ZERO),
        DiscountType::Percentage => mul(subtotal, div(discount_value, HUNDRED)?),
        DiscountType::FixedAmount => Ok(discount_value),
    }
}

/// Tax on the taxable share after the discount is spread proportionally.
/// With a zero subtotal the taxable share is taken as zero.
pub fn tax_amount(
    subtotal: Decimal,
    taxable_amount: Decimal,
    discount_amount: Decimal,
    tax_rate_percent: Decimal,
) -> PricingResult<Decimal> {
    let taxable_discount = if subtotal.is_zero() {
        Decimal::ZERO
    } else {
        mul(div(taxable_amount, subtotal)?, discount_amount)?
    };
    mul(
        sub(taxable_amount, taxable_discount)?,
        div(tax_rate_percent, HUNDRED)?,
    )
}

pub fn line_items_totals(
    line_items: &[LineItem],
    discount_type: DiscountType,
    discount_value: Decimal,
    tax_rate_percent: Decimal,
) -> PricingResult<Totals> {
    let subtotal = sum(line_items.iter().map(line_amount))?;
    let taxable_amount = sum(line_items.iter().filter(|item| item.is_taxable).map(line_amount))?;
    let total_cost = sum(line_items.iter().map(line_cost))?;

    let discount_amount = discount_amount(subtotal, discount_type, discount_value)?;
    let tax_amount = tax_amount(subtotal, taxable_amount, discount_amount, tax_rate_percent)?;
    let discounted = sub(subtotal, discount_amount)?;

    Ok(Totals {
        subtotal,
        discount_amount,
        taxable_amount,
        tax_amount,
        total: add(discounted, tax_amount)?,
        total_cost,
        gross_profit: sub(discounted, total_cost)?,
    })
}

pub fn option_totals(option: &EstimateOption, tax_rate_percent: Decimal) -> PricingResult<OptionTotals> {
    Ok(OptionTotals {
        name: option.name.clone(),
        totals: line_items_totals(
            &option.line_items,
            option.discount_type,
            option.discount_value,
            tax_rate_percent,
        )?,
    })
}

pub fn estimate_totals(options: &[EstimateOption], tax_rate_percent: Decimal) -> PricingResult<EstimateTotals> {
    let options = options
        .iter()
        .map(|option| option_totals(option, tax_rate_percent))
        .collect::<PricingResult<Vec<OptionTotals>>>()?;
    let totals = options
        .iter()
        .try_fold(Totals::default(), |acc, option| acc.accumulate(&option.totals))?;

    Ok(EstimateTotals { options, totals })
}
