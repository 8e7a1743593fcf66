use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{
    non_blank, EstimateBody, EstimateOption, JobBody, NewAddress, NewCustomer, RecordDraft,
    ServiceRequestBody,
};

/// Field key → human-readable message, e.g. `option-0-name` or `duplicateOptions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message; the first message for a field wins
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Same messages with every field key prefixed, e.g. `record-1-title`
    pub fn prefixed(self, prefix: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(field, message)| (format!("{}{}", prefix, field), message))
                .collect(),
        )
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Body of a dependent record that can check itself before submission
pub trait Validate {
    fn validate(&self) -> ValidationErrors;
}

fn name_key(name: &str) -> Option<String> {
    non_blank(name).map(str::to_lowercase)
}

/// Indices of entries whose normalized name occurs more than once
fn duplicate_indices<'a, I>(names: I) -> Vec<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let keyed: Vec<(usize, String)> = names
        .into_iter()
        .enumerate()
        .filter_map(|(i, name)| name_key(name).map(|key| (i, key)))
        .collect();
    let duplicated: Vec<&String> = keyed.iter().map(|(_, key)| key).duplicates().collect();

    keyed
        .iter()
        .filter(|(_, key)| duplicated.contains(&key))
        .map(|(i, _)| *i)
        .collect()
}

/// Largest accepted line item quantity
pub fn max_quantity() -> Decimal {
    Decimal::new(1_000_000, 0)
}

/// Largest accepted unit price, unit cost or fixed discount
pub fn max_amount() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

fn check_bounded(errors: &mut ValidationErrors, field: String, value: Decimal, max: Decimal, label: &str) {
    if value < Decimal::ZERO {
        errors.add(field, format!("{} cannot be negative", label));
    } else if value > max {
        errors.add(field, format!("{} cannot exceed {}", label, max));
    }
}

pub struct EstimateValidator;

impl EstimateValidator {
    pub fn validate_options(options: &[EstimateOption]) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        if options.is_empty() {
            errors.add("options", "At least one option is required");
            return errors;
        }

        for (i, option) in options.iter().enumerate() {
            if non_blank(&option.name).is_none() {
                errors.add(format!("option-{}-name", i), "Option name is required");
            }
            check_bounded(
                &mut errors,
                format!("option-{}-discountValue", i),
                option.discount_value,
                max_amount(),
                "Discount",
            );
            Self::validate_line_items(&mut errors, i, option);
        }

        let duplicates = duplicate_indices(options.iter().map(|o| o.name.as_str()));
        if !duplicates.is_empty() {
            errors.add("duplicateOptions", "Option names must be unique");
            for i in duplicates {
                errors.add(format!("option-{}-name", i), "Option name must be unique");
            }
        }

        errors
    }

    /// `taxRate` is a percentage between 0 and 100
    pub fn validate_tax_rate(tax_rate: Decimal) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_bounded(&mut errors, "taxRate".to_string(), tax_rate, Decimal::ONE_HUNDRED, "Tax rate");
        errors
    }

    fn validate_line_items(errors: &mut ValidationErrors, i: usize, option: &EstimateOption) {
        if option.line_items.is_empty() {
            errors.add(
                format!("option-{}-lineItems", i),
                "Each option needs at least one line item",
            );
            return;
        }

        for (j, item) in option.line_items.iter().enumerate() {
            if non_blank(&item.name).is_none() {
                errors.add(format!("item-{}-{}-name", i, j), "Line item name is required");
            }
            check_bounded(errors, format!("item-{}-{}-quantity", i, j), item.quantity, max_quantity(), "Quantity");
            check_bounded(errors, format!("item-{}-{}-unitPrice", i, j), item.unit_price, max_amount(), "Unit price");
            check_bounded(errors, format!("item-{}-{}-unitCost", i, j), item.unit_cost, max_amount(), "Unit cost");
        }

        for j in duplicate_indices(option.line_items.iter().map(|item| item.name.as_str())) {
            errors.add(
                format!("item-{}-{}-name", i, j),
                "Line item names must be unique within an option",
            );
        }
    }
}

impl Validate for EstimateBody {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if non_blank(&self.title).is_none() {
            errors.add("title", "Title is required");
        }
        errors.merge(EstimateValidator::validate_tax_rate(self.tax_rate));
        errors.merge(EstimateValidator::validate_options(&self.options));
        errors
    }
}

impl Validate for JobBody {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if non_blank(&self.title).is_none() {
            errors.add("title", "Title is required");
        }
        if let (Some(start), Some(end)) = (self.scheduled_start, self.scheduled_end) {
            if end < start {
                errors.add("scheduledEnd", "Scheduled end must be after the start");
            }
        }
        errors
    }
}

impl Validate for ServiceRequestBody {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if non_blank(&self.title).is_none() {
            errors.add("title", "Title is required");
        }
        errors
    }
}

impl<B: Validate> Validate for RecordDraft<B> {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if non_blank(&self.customer_id).is_none() {
            errors.add("customerId", "Customer is required");
        }
        errors.merge(self.body.validate());
        errors
    }
}

impl Validate for NewAddress {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (field, value, label) in [
            ("street", &self.street, "Street"),
            ("city", &self.city, "City"),
            ("state", &self.state, "State"),
            ("zip", &self.zip, "ZIP code"),
        ] {
            if non_blank(value).is_none() {
                errors.add(field, format!("{} is required", label));
            }
        }
        errors
    }
}

impl Validate for NewCustomer {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if non_blank(&self.name).is_none() {
            errors.add("name", "Name is required");
        }
        for (i, address) in self.addresses.iter().enumerate() {
            errors.merge(address.validate().prefixed(&format!("address-{}-", i)));
        }
        errors
    }
}

/// Messages are only shown once the user has tried to submit
#[derive(Debug, Clone, Default)]
pub struct ValidationState {
    attempted: bool,
    errors: ValidationErrors,
}

impl ValidationState {
    /// Validate on a submission attempt; true when submission may proceed
    pub fn attempt<V: Validate>(&mut self, value: &V) -> bool {
        self.attempted = true;
        self.errors = value.validate();
        self.errors.is_empty()
    }

    /// Re-validate after an edit without marking an attempt
    pub fn revalidate<V: Validate>(&mut self, value: &V) {
        self.errors = value.validate();
    }

    pub fn visible(&self) -> Option<&ValidationErrors> {
        if self.attempted && !self.errors.is_empty() {
            Some(&self.errors)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.attempted = false;
        self.errors = ValidationErrors::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, LineItemKind};
    use rust_decimal_macros::dec;

    fn item(name: &str) -> LineItem {
        LineItem::new(LineItemKind::Service, name, dec!(1), dec!(100))
    }

    fn option(name: &str) -> EstimateOption {
        EstimateOption::new(name).with_line_item(item("Visit"))
    }

    #[test]
    fn test_duplicate_option_names_ignore_case_and_whitespace() {
        let errors = EstimateValidator::validate_options(&[option(" Standard "), option("standard")]);
        assert!(errors.contains("duplicateOptions"));
        assert_eq!(errors.get("option-0-name"), Some("Option name must be unique"));
        assert_eq!(errors.get("option-1-name"), Some("Option name must be unique"));
    }

    #[test]
    fn test_distinct_option_names_pass() {
        let errors = EstimateValidator::validate_options(&[option("Standard"), option("Premium")]);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_empty_options_and_line_items() {
        let errors = EstimateValidator::validate_options(&[]);
        assert_eq!(errors.get("options"), Some("At least one option is required"));

        let errors = EstimateValidator::validate_options(&[EstimateOption::new("Bare")]);
        assert!(errors.contains("option-0-lineItems"));
    }

    #[test]
    fn test_blank_names_are_required_not_duplicates() {
        let errors = EstimateValidator::validate_options(&[option("  "), option("")]);
        assert_eq!(errors.get("option-0-name"), Some("Option name is required"));
        assert_eq!(errors.get("option-1-name"), Some("Option name is required"));
        assert!(!errors.contains("duplicateOptions"));
    }

    #[test]
    fn test_line_item_names_unique_within_option_only() {
        let first = EstimateOption::new("Standard")
            .with_line_item(item("Filter"))
            .with_line_item(item(" FILTER"));
        let second = EstimateOption::new("Premium").with_line_item(item("Filter"));
        let errors = EstimateValidator::validate_options(&[first, second]);

        assert!(errors.contains("item-0-0-name"));
        assert!(errors.contains("item-0-1-name"));
        assert!(!errors.contains("item-1-0-name"));
    }

    #[test]
    fn test_negative_amounts_are_flagged() {
        let mut bad = option("Standard");
        bad.discount_value = dec!(-1);
        bad.line_items[0].quantity = dec!(-2);
        let errors = EstimateValidator::validate_options(&[bad]);
        assert!(errors.contains("option-0-discountValue"));
        assert!(errors.contains("item-0-0-quantity"));
        assert!(!errors.contains("item-0-0-unitPrice"));
    }

    #[test]
    fn test_oversized_amounts_are_flagged() {
        let huge = Decimal::new(10_000_000_000_000_000, 0);
        let mut bad = option("Standard");
        bad.line_items[0].quantity = huge;
        bad.line_items[0].unit_price = huge;
        let errors = EstimateValidator::validate_options(&[bad]);
        assert!(errors.contains("item-0-0-quantity"));
        assert!(errors.contains("item-0-0-unitPrice"));
        assert!(!errors.contains("item-0-0-unitCost"));

        let mut at_limit = option("Standard");
        at_limit.line_items[0].quantity = max_quantity();
        at_limit.line_items[0].unit_price = max_amount();
        assert!(EstimateValidator::validate_options(&[at_limit]).is_empty());
    }

    #[test]
    fn test_tax_rate_must_be_a_percentage() {
        assert!(EstimateValidator::validate_tax_rate(dec!(7.5)).is_empty());
        assert!(EstimateValidator::validate_tax_rate(dec!(100)).is_empty());
        assert!(EstimateValidator::validate_tax_rate(dec!(-1)).contains("taxRate"));
        assert!(EstimateValidator::validate_tax_rate(dec!(100.01)).contains("taxRate"));
    }

    #[test]
    fn test_draft_requires_customer_and_title() {
        let draft = RecordDraft::new(" ", None, EstimateBody::new("").with_option(option("Standard")));
        let errors = draft.validate();
        assert!(errors.contains("customerId"));
        assert!(errors.contains("title"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_messages_hidden_until_attempt() {
        let body = EstimateBody::new("Repair");
        let mut state = ValidationState::default();

        state.revalidate(&body);
        assert!(state.visible().is_none());

        assert!(!state.attempt(&body));
        assert!(state.visible().unwrap().contains("options"));

        let fixed = body.with_option(option("Standard"));
        state.revalidate(&fixed);
        assert!(state.visible().is_none());

        state.reset();
        assert!(state.visible().is_none());
    }

    #[test]
    fn test_job_schedule_order() {
        let mut job = JobBody::new("Install");
        job.scheduled_start = Some(chrono::Utc::now());
        job.scheduled_end = job.scheduled_start.map(|s| s - chrono::Duration::hours(1));
        assert!(job.validate().contains("scheduledEnd"));
    }

    #[test]
    fn test_new_customer_checks_name_and_addresses() {
        use crate::model::AddressType;

        let customer = NewCustomer::new("  ")
            .with_address(NewAddress::new("1 Elm St", "Springfield", "IL", "62701", AddressType::Primary))
            .with_address(NewAddress::new("", "Springfield", "IL", " ", AddressType::Billing));

        let errors = customer.validate();
        assert!(errors.contains("name"));
        assert!(!errors.contains("address-0-street"));
        assert!(errors.contains("address-1-street"));
        assert!(errors.contains("address-1-zip"));
        assert_eq!(errors.len(), 3);
    }
}
