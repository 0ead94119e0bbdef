//! Budget slider domain.

use crate::error::ValidationError;
use crate::form::FormField;

pub const BUDGET_MIN: u32 = 1;
pub const BUDGET_MAX: u32 = 1_000_000;

/// Initial slider position (12 week budget).
pub const DEFAULT_BUDGET: u32 = 50_000;

/// Accept `amount` if it lies within the slider domain.
pub fn validate_budget(amount: u32) -> Result<u32, ValidationError> {
    if (BUDGET_MIN..=BUDGET_MAX).contains(&amount) {
        Ok(amount)
    } else {
        Err(ValidationError::new(
            FormField::Budget,
            format!("Budget must be between {BUDGET_MIN} and {BUDGET_MAX}"),
        ))
    }
}

/// Render a whole-dollar amount as US currency, e.g. `$75,000.00`.
pub fn format_budget(amount: u32) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}.00")
}
