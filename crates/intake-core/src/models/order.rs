//! Order (appointment/history) models.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
///
/// PENDING orders block new admissions for the same subject; ATTENDED orders
/// are historical and only surface as warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Attended,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Attended => "ATTENDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "ATTENDED" => Some(OrderStatus::Attended),
            _ => None,
        }
    }
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        OrderStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown order status: {s}").into()))
    }
}

/// An appointment/history record shared between the local and external stores.
///
/// Identity is the shared key, generated locally and used by both stores to
/// correlate the same logical entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Shared key - generated locally, known to both stores
    pub shared_key: String,
    /// Subject identity number
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub employer_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sex: Option<String>,
    pub age: Option<i64>,
    /// Exam type; doubles as the assignment modality
    pub exam_type: String,
    /// Assigned provider full name
    pub provider: Option<String>,
    /// Scheduled date, YYYY-MM-DD
    pub scheduled_date: String,
    /// Scheduled time, HH:MM
    pub scheduled_time: String,
    pub status: OrderStatus,
    pub observations: Option<String>,
    pub recommendations: Option<String>,
    /// Monotonic per-row commit version, bumped on every local write
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Order {
    /// Create a new pending order with required fields.
    pub fn new(
        subject_id: String,
        first_name: String,
        last_name: String,
        exam_type: String,
        scheduled_date: String,
        scheduled_time: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            shared_key: new_shared_key(),
            subject_id,
            first_name,
            last_name,
            employer_code: None,
            phone: None,
            email: None,
            sex: None,
            age: None,
            exam_type,
            provider: None,
            scheduled_date,
            scheduled_time,
            status: OrderStatus::Pending,
            observations: None,
            recommendations: None,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Generate a new opaque shared key: millisecond timestamp plus a random
/// suffix, so create against the external store is a pure insert.
pub fn new_shared_key() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", millis, &suffix[..6])
}

/// Partial update of an order. `None` (or an empty string) leaves the stored
/// value unchanged; updates merge COALESCE-style and never blank fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub employer_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sex: Option<String>,
    pub age: Option<i64>,
    pub exam_type: Option<String>,
    pub provider: Option<String>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
    pub status: Option<OrderStatus>,
    pub observations: Option<String>,
    pub recommendations: Option<String>,
}

impl OrderPatch {
    /// Treat empty strings as absent so a blank form field cannot null out a
    /// stored value.
    pub fn normalized(mut self) -> Self {
        fn drop_empty(field: &mut Option<String>) {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }

        drop_empty(&mut self.first_name);
        drop_empty(&mut self.last_name);
        drop_empty(&mut self.employer_code);
        drop_empty(&mut self.phone);
        drop_empty(&mut self.email);
        drop_empty(&mut self.sex);
        drop_empty(&mut self.exam_type);
        drop_empty(&mut self.provider);
        drop_empty(&mut self.scheduled_date);
        drop_empty(&mut self.scheduled_time);
        drop_empty(&mut self.observations);
        drop_empty(&mut self.recommendations);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.employer_code.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.sex.is_none()
            && self.age.is_none()
            && self.exam_type.is_none()
            && self.provider.is_none()
            && self.scheduled_date.is_none()
            && self.scheduled_time.is_none()
            && self.status.is_none()
            && self.observations.is_none()
            && self.recommendations.is_none()
    }
}

/// Compact order view returned by duplicate checks and listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub shared_key: String,
    pub subject_id: String,
    pub full_name: String,
    pub exam_type: String,
    pub provider: Option<String>,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub status: OrderStatus,
    pub created_at: String,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            shared_key: order.shared_key.clone(),
            subject_id: order.subject_id.clone(),
            full_name: order.full_name(),
            exam_type: order.exam_type.clone(),
            provider: order.provider.clone(),
            scheduled_date: order.scheduled_date.clone(),
            scheduled_time: order.scheduled_time.clone(),
            status: order.status,
            created_at: order.created_at.clone(),
        }
    }
}

/// Filters for listing/searching orders. All fields combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub subject_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub scheduled_date: Option<String>,
    pub provider: Option<String>,
    /// Substring match against the subject's full name
    pub name_like: Option<String>,
}
