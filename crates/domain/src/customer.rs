//! Customer resolution by sender email.

use std::sync::Arc;

use common::EmailAddress;
use order_store::{Customer, CustomerStore};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CustomerField, DomainError, RejectReason, Result},
    submission::SubmittedCustomer,
};

/// Complete contact details for an order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: EmailAddress,
    pub phone: String,
    pub address: String,
}

impl From<&Customer> for ContactDetails {
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            address: customer.address.clone(),
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCustomer {
    pub details: ContactDetails,

    /// True if no customer existed when the lookup ran.
    pub created: bool,
}

/// Finds or creates the customer behind a submission.
///
/// The sender email is the key. Stored identity fields are never changed
/// here; history is appended by the state machine after an order exists.
pub struct CustomerResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for CustomerResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CustomerStore + ?Sized> CustomerResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolves the customer for `sender`.
    ///
    /// An existing customer has blank supplied fields backfilled from the
    /// store. A new customer must supply name, phone and address.
    #[tracing::instrument(skip(self, supplied), fields(customer = %sender))]
    pub async fn resolve(
        &self,
        sender: &EmailAddress,
        supplied: Option<&SubmittedCustomer>,
    ) -> Result<ResolvedCustomer> {
        let empty = SubmittedCustomer::default();
        let supplied = supplied.unwrap_or(&empty);

        if let Some(existing) = self.store.find_customer(sender).await? {
            return Ok(ResolvedCustomer {
                details: backfill(supplied, &existing),
                created: false,
            });
        }

        let missing: Vec<CustomerField> = [
            CustomerField::Name,
            CustomerField::Phone,
            CustomerField::Address,
        ]
        .into_iter()
        .filter(|field| supplied.field(*field).is_none())
        .collect();

        if !missing.is_empty() {
            tracing::debug!(?missing, "New customer is missing details");
            return Err(DomainError::Rejected(RejectReason::MissingCustomerFields(
                missing,
            )));
        }

        let candidate = Customer::new(
            sender.clone(),
            supplied.field(CustomerField::Name).unwrap_or_default(),
            supplied.field(CustomerField::Phone).unwrap_or_default(),
            supplied.field(CustomerField::Address).unwrap_or_default(),
        );
        // A concurrent first submission may have won the insert; its record
        // is the one returned.
        let stored = self.store.insert_customer_if_absent(candidate).await?;
        tracing::info!("Created customer");

        Ok(ResolvedCustomer {
            details: backfill(supplied, &stored),
            created: true,
        })
    }
}

fn backfill(supplied: &SubmittedCustomer, stored: &Customer) -> ContactDetails {
    let pick = |field: CustomerField, fallback: &str| {
        supplied
            .field(field)
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    };

    ContactDetails {
        name: pick(CustomerField::Name, &stored.name),
        email: stored.email.clone(),
        phone: pick(CustomerField::Phone, &stored.phone),
        address: pick(CustomerField::Address, &stored.address),
    }
}
