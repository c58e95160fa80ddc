//! Event log records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::EventKind;

/// A payload field the renderer needed but the event did not carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    #[error("missing user at position {0}")]
    User(usize),
    #[error("missing company name")]
    CompanyName,
    #[error("missing amount")]
    Amount,
    #[error("missing price")]
    Price,
    #[error("missing message")]
    Message,
    #[error("missing product id")]
    ProductId,
}

/// Type-specific payload of an event
///
/// Every field is optional at the type level; which ones are required depends
/// on the [`EventKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,

    /// Free text: report reason, order side or business season label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

impl EventFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_company(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn user(&self, index: usize) -> Result<&str, MissingField> {
        self.users
            .get(index)
            .map(String::as_str)
            .ok_or(MissingField::User(index))
    }

    /// All users; at least one is required
    pub fn all_users(&self) -> Result<&[String], MissingField> {
        if self.users.is_empty() {
            return Err(MissingField::User(0));
        }
        Ok(&self.users)
    }

    pub fn company(&self) -> Result<&str, MissingField> {
        self.company_name
            .as_deref()
            .ok_or(MissingField::CompanyName)
    }

    pub fn amount(&self) -> Result<i64, MissingField> {
        self.amount.ok_or(MissingField::Amount)
    }

    pub fn price(&self) -> Result<i64, MissingField> {
        self.price.ok_or(MissingField::Price)
    }

    pub fn text(&self) -> Result<&str, MissingField> {
        self.message.as_deref().ok_or(MissingField::Message)
    }

    pub fn product(&self) -> Result<&str, MissingField> {
        self.product_id.as_deref().ok_or(MissingField::ProductId)
    }
}

/// A domain event appended by a producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub fields: EventFields,
    #[serde(default)]
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Create an unresolved event stamped with the current time
    pub fn new(kind: EventKind, fields: EventFields) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            fields,
            resolved: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_record_deserializes_legacy_shape() {
        let value = json!({
            "id": "0190f5a0-0000-7000-8000-000000000001",
            "type": "創立得股",
            "fields": {"users": ["alice"], "companyName": "Acme", "amount": 50},
            "createdAt": "2024-01-01T00:00:00Z"
        });

        let event: EventRecord = serde_json::from_value(value).unwrap();
        assert_eq!(event.kind, EventKind::FoundingEquityGrant);
        assert_eq!(event.fields.company(), Ok("Acme"));
        assert_eq!(event.fields.amount(), Ok(50));
        assert!(!event.resolved);
    }

    #[test]
    fn test_missing_field_accessors() {
        let fields = EventFields::new().with_users(["bob"]);
        assert_eq!(fields.user(0), Ok("bob"));
        assert_eq!(fields.user(1), Err(MissingField::User(1)));
        assert_eq!(fields.company(), Err(MissingField::CompanyName));
        assert_eq!(EventFields::new().all_users(), Err(MissingField::User(0)));
    }
}
