use rust_decimal::Decimal;
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Tax rate in percent used when an estimate does not carry its own
pub fn default_tax_rate() -> Decimal {
    Decimal::new(75, 1)
}

/// Trimmed, non-empty text or `None`
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_unique() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  Standard "), Some("Standard"));
        assert_eq!(non_blank("   "), None);
        assert_eq!(non_blank(""), None);
    }
}
