//! Structural checks on submitted line items.

use serde::{Deserialize, Serialize};

use crate::{error::RejectReason, submission::SubmittedLine};

/// Which quantities a validator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// New orders: every quantity must be positive.
    Create,
    /// Amendments: zero is allowed and means "remove this line".
    Amendment,
}

/// A line that passed validation, still in free-text terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub product: String,
    pub quantity: u32,
}

impl RequestedLine {
    pub fn new(product: impl Into<String>, quantity: u32) -> Self {
        Self {
            product: product.into(),
            quantity,
        }
    }
}

/// Result of validating a submission's lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// True when the lines may proceed through the pipeline.
    pub valid: bool,

    /// Human-readable problems, empty when valid.
    pub errors: Vec<String>,

    lines: Vec<RequestedLine>,
    empty: bool,
}

impl ValidationReport {
    /// Converts the report into the validated lines or the rejection.
    pub fn into_lines(self) -> Result<Vec<RequestedLine>, RejectReason> {
        if self.empty {
            Err(RejectReason::EmptyOrder)
        } else if !self.valid {
            Err(RejectReason::InvalidLineItem(self.errors))
        } else {
            Ok(self.lines)
        }
    }
}

/// Checks that a submission carries usable line items.
///
/// The check is pure. Prices are never required.
#[derive(Debug, Clone, Copy)]
pub struct OrderValidator {
    mode: ValidationMode,
}

impl OrderValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    pub fn for_create() -> Self {
        Self::new(ValidationMode::Create)
    }

    pub fn for_amendment() -> Self {
        Self::new(ValidationMode::Amendment)
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validates the submitted lines.
    pub fn validate(&self, lines: Option<&[SubmittedLine]>) -> ValidationReport {
        let lines = match lines {
            Some(lines) if !lines.is_empty() => lines,
            _ => {
                return ValidationReport {
                    valid: false,
                    errors: vec![RejectReason::EmptyOrder.to_string()],
                    lines: Vec::new(),
                    empty: true,
                };
            }
        };

        let mut errors = Vec::new();
        let mut accepted = Vec::with_capacity(lines.len());

        for (index, line) in lines.iter().enumerate() {
            let position = index + 1;

            let product = line.product_name();
            if product.is_none() {
                errors.push(format!("line {position}: missing product name"));
            }

            let quantity = match line.whole_quantity() {
                None => {
                    errors.push(format!(
                        "line {position}: quantity must be a whole number"
                    ));
                    None
                }
                Some(q) if q < self.min_quantity() => {
                    errors.push(format!(
                        "line {position}: quantity {q} must be {}",
                        self.quantity_rule()
                    ));
                    None
                }
                Some(q) => match u32::try_from(q) {
                    Ok(q) => Some(q),
                    Err(_) => {
                        errors.push(format!("line {position}: quantity {q} is too large"));
                        None
                    }
                },
            };

            if let (Some(product), Some(quantity)) = (product, quantity) {
                accepted.push(RequestedLine::new(product, quantity));
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            lines: accepted,
            empty: false,
        }
    }

    fn min_quantity(&self) -> i64 {
        match self.mode {
            ValidationMode::Create => 1,
            ValidationMode::Amendment => 0,
        }
    }

    fn quantity_rule(&self) -> &'static str {
        match self.mode {
            ValidationMode::Create => "positive",
            ValidationMode::Amendment => "zero or more",
        }
    }
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::for_create()
    }
}
