//! Submission payloads as produced by the extraction step.
//!
//! Every field is optional at this boundary. Missing or malformed values
//! are turned into rejections by the validator and the resolver rather
//! than failing deserialization.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::EmailAddress;
use serde::{Deserialize, Serialize, de::Error as _};
use serde_json::Value;

use crate::error::{CustomerField, RejectReason};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// A semi-structured order request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    /// Channel-level sender identity, possibly `Name <addr>`.
    #[serde(default, alias = "email", alias = "customer_email")]
    pub customer_email: Option<String>,

    /// `YYYY-MM-DD`.
    #[serde(default, alias = "date", alias = "submitted_date")]
    pub submitted_date: Option<String>,

    /// `HH:MM:SS`.
    #[serde(default, alias = "time", alias = "submitted_time")]
    pub submitted_time: Option<String>,

    #[serde(default)]
    pub customer: Option<SubmittedCustomer>,

    #[serde(default)]
    pub orders: Option<Vec<SubmittedLine>>,
}

/// Contact details as extracted from the submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedCustomer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl SubmittedCustomer {
    /// Creates a fully populated record.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            phone: Some(phone.into()),
            address: Some(address.into()),
        }
    }

    /// Returns the trimmed value of a field, or None if absent or blank.
    pub fn field(&self, field: CustomerField) -> Option<&str> {
        let value = match field {
            CustomerField::Name => self.name.as_deref(),
            CustomerField::Email => self.email.as_deref(),
            CustomerField::Phone => self.phone.as_deref(),
            CustomerField::Address => self.address.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// One free-text line of a submission.
///
/// `quantity` is kept as raw JSON so that `2`, `2.0` and `"2"` are all
/// accepted. Unknown fields such as `price` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmittedLine {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl SubmittedLine {
    pub fn new(product: impl Into<String>, quantity: i64) -> Self {
        Self {
            product: Some(product.into()),
            quantity: Some(Value::from(quantity)),
        }
    }

    /// Returns the trimmed product name, or None if absent or blank.
    pub fn product_name(&self) -> Option<&str> {
        self.product
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Interprets the quantity as a whole number.
    ///
    /// Returns None when the value is missing, fractional or not numeric.
    pub fn whole_quantity(&self) -> Option<i64> {
        match self.quantity.as_ref()? {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(i)
                } else {
                    let f = n.as_f64()?;
                    whole_from_f64(f)
                }
            }
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_from_f64))
            }
            _ => None,
        }
    }
}

fn whole_from_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl OrderSubmission {
    /// Creates an empty submission from `sender` at the given date and time.
    pub fn new(
        sender: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            customer_email: Some(sender.into()),
            submitted_date: Some(date.into()),
            submitted_time: Some(time.into()),
            customer: None,
            orders: Some(Vec::new()),
        }
    }

    pub fn with_customer(mut self, customer: SubmittedCustomer) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn with_line(mut self, product: impl Into<String>, quantity: i64) -> Self {
        self.orders
            .get_or_insert_with(Vec::new)
            .push(SubmittedLine::new(product, quantity));
        self
    }

    /// Parses a submission document.
    ///
    /// The document must be a JSON object; arrays and scalars are refused
    /// even though they would otherwise deserialize positionally.
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(input)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom(
                "submission must be a JSON object",
            ));
        }
        serde_json::from_value(value)
    }

    /// Returns the normalized sender address.
    pub fn sender(&self) -> Result<EmailAddress, RejectReason> {
        self.customer_email
            .as_deref()
            .and_then(|raw| EmailAddress::parse(raw).ok())
            .ok_or_else(|| RejectReason::MissingCustomerFields(vec![CustomerField::Email]))
    }

    /// Combines the submitted date and time into one timestamp.
    pub fn submitted_at(&self) -> Result<NaiveDateTime, RejectReason> {
        let date = self
            .submitted_date
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| RejectReason::InvalidTimestamp("missing submission date".into()))?;
        let time = self
            .submitted_time
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| RejectReason::InvalidTimestamp("missing submission time".into()))?;

        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| RejectReason::InvalidTimestamp(format!("bad date {date:?}")))?;
        let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|_| RejectReason::InvalidTimestamp(format!("bad time {time:?}")))?;

        Ok(date.and_time(time))
    }

    /// Returns the submitted lines, if any were present.
    pub fn lines(&self) -> Option<&[SubmittedLine]> {
        self.orders.as_deref()
    }
}
