//! Data models for the clinic portal client.
//!
//! This module defines the records exchanged with the clinic backend:
//! - AppointmentStatus / AppointmentType: open sets that never fail to parse
//! - Appointment: an appointment as delivered by `GET /appointments/`
//! - User / Role: the authenticated account
//! - PatientProfile / MedicalHistoryEntry: profile data, legacy and structured
//! - StatusUpdate, RescheduleRequest, BookingRequest: request bodies

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PortalError, PortalResult};

/// Appointment status as reported by the backend.
///
/// The backend may introduce new statuses at any time, so unknown values
/// are kept verbatim in `Other` instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Other(String),
}

impl AppointmentStatus {
    /// Parse a status string. Matching ignores case and surrounding whitespace.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pending" => AppointmentStatus::Pending,
            "scheduled" => AppointmentStatus::Scheduled,
            "confirmed" => AppointmentStatus::Confirmed,
            "completed" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for AppointmentStatus {
    fn from(value: String) -> Self {
        AppointmentStatus::parse(&value)
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clinic service an appointment is booked with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppointmentType {
    Medical,
    Dental,
    Other(String),
}

impl AppointmentType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "medical" => AppointmentType::Medical,
            "dental" => AppointmentType::Dental,
            _ => AppointmentType::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppointmentType::Medical => "medical",
            AppointmentType::Dental => "dental",
            AppointmentType::Other(raw) => raw,
        }
    }
}

impl From<String> for AppointmentType {
    fn from(value: String) -> Self {
        AppointmentType::parse(&value)
    }
}

impl From<AppointmentType> for String {
    fn from(kind: AppointmentType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn present_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(Some(Option::<bool>::deserialize(deserializer)?.unwrap_or(false)))
}

fn unknown_status() -> AppointmentStatus {
    AppointmentStatus::Other(String::new())
}

fn status_or_unknown<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<AppointmentStatus, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(AppointmentStatus::from)
        .unwrap_or_else(unknown_status))
}

fn unknown_type() -> AppointmentType {
    AppointmentType::Other(String::new())
}

fn type_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AppointmentType, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(AppointmentType::from)
        .unwrap_or_else(unknown_type))
}

/// An appointment as consumed by the client.
///
/// The backend owns this record; the client never persists or patches it
/// locally. Provenance fields are display-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub appointment_date: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub appointment_time: String,
    #[serde(default = "unknown_status", deserialize_with = "status_or_unknown")]
    pub status: AppointmentStatus,
    #[serde(rename = "type", default = "unknown_type", deserialize_with = "type_or_unknown")]
    pub kind: AppointmentType,
    #[serde(default)]
    pub notes: Option<String>,
    /// `None` only when the backend omitted the field; an explicit `null`
    /// reads as `Some(false)`.
    #[serde(
        default,
        deserialize_with = "present_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub was_rescheduled_by_admin: Option<bool>,
    #[serde(
        default,
        deserialize_with = "present_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub was_rescheduled_by_patient: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reschedule_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concern: Option<String>,
}

impl Appointment {
    /// Minimal record, mostly useful for fixtures and mocks.
    pub fn new(id: i64, date: &str, time: &str, kind: AppointmentType) -> Self {
        Appointment {
            id,
            appointment_date: date.to_string(),
            appointment_time: time.to_string(),
            status: AppointmentStatus::Pending,
            kind,
            notes: None,
            was_rescheduled_by_admin: None,
            was_rescheduled_by_patient: None,
            rejection_reason: None,
            reschedule_reason: None,
            original_date: None,
            original_time: None,
            rescheduled_at: None,
            rescheduled_by_name: None,
            patient_name: None,
            concern: None,
        }
    }

    /// Wall-clock date and time of the appointment, without timezone.
    ///
    /// An empty time means midnight. Returns `None` when the date (or a
    /// non-empty time) cannot be parsed.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = parse_date(&self.appointment_date).ok()?;
        if self.appointment_time.trim().is_empty() {
            return date.and_hms_opt(0, 0, 0);
        }
        let time = parse_time(&self.appointment_time).ok()?;
        Some(date.and_time(time))
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AppointmentStatus::Cancelled
    }
}

/// Parse a `YYYY-MM-DD` date string.
pub fn parse_date(value: &str) -> PortalResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| PortalError::InvalidInput(format!("Invalid date: '{}'. Expected YYYY-MM-DD", value)))
}

/// Parse an `HH:MM` or `HH:MM:SS` time string.
pub fn parse_time(value: &str) -> PortalResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| PortalError::InvalidInput(format!("Invalid time: '{}'. Expected HH:MM", value)))
}

/// Account role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Patient,
    Staff,
    Admin,
    Other(String),
}

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "patient" | "student" => Role::Patient,
            "staff" => Role::Staff,
            "admin" => Role::Admin,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Patient => "patient".to_string(),
            Role::Staff => "staff".to_string(),
            Role::Admin => "admin".to_string(),
            Role::Other(raw) => raw,
        }
    }
}

/// The authenticated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Patient
}

impl User {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Body returned by `POST /auth/login/`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
    pub user: User,
}

/// One medical history item as the backend may deliver it.
///
/// Older profiles stored a bare condition string; newer ones store an
/// object. Both shapes are accepted here and folded by [`normalize`].
///
/// [`normalize`]: MedicalHistoryEntry::normalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MedicalHistoryEntry {
    Legacy(String),
    Structured {
        condition: String,
        #[serde(default)]
        diagnosed_on: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
}

/// Normalized medical history item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalCondition {
    pub condition: String,
    pub diagnosed_on: Option<String>,
    pub notes: Option<String>,
    pub from_legacy_record: bool,
}

impl MedicalHistoryEntry {
    pub fn normalize(&self) -> MedicalCondition {
        match self {
            MedicalHistoryEntry::Legacy(text) => MedicalCondition {
                condition: text.trim().to_string(),
                diagnosed_on: None,
                notes: None,
                from_legacy_record: true,
            },
            MedicalHistoryEntry::Structured {
                condition,
                diagnosed_on,
                notes,
            } => MedicalCondition {
                condition: condition.trim().to_string(),
                diagnosed_on: diagnosed_on.clone(),
                notes: notes.clone(),
                from_legacy_record: false,
            },
        }
    }
}

/// Patient profile as returned by `GET /patients/profile/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub medical_history: Vec<MedicalHistoryEntry>,
}

impl PatientProfile {
    /// Medical history with legacy strings and empty entries folded away.
    pub fn conditions(&self) -> Vec<MedicalCondition> {
        self.medical_history
            .iter()
            .map(MedicalHistoryEntry::normalize)
            .filter(|c| !c.condition.is_empty())
            .collect()
    }
}

/// Body for `PATCH /appointments/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl StatusUpdate {
    /// Cancellation is a status update to `cancelled`.
    pub fn cancel(reason: Option<String>) -> Self {
        StatusUpdate {
            status: AppointmentStatus::Cancelled,
            rejection_reason: reason.filter(|r| !r.trim().is_empty()),
        }
    }
}

/// Body for `POST /appointments/{id}/reschedule/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub appointment_date: String,
    pub appointment_time: String,
    pub reschedule_reason: String,
}

impl RescheduleRequest {
    /// Create a reschedule request with validation.
    pub fn new(date: &str, time: &str, reason: &str) -> PortalResult<Self> {
        let date = parse_date(date)?;
        let time = parse_time(time)?;
        if reason.trim().is_empty() {
            return Err(PortalError::InvalidInput(
                "Reschedule reason cannot be empty".to_string(),
            ));
        }

        Ok(RescheduleRequest {
            appointment_date: date.format("%Y-%m-%d").to_string(),
            appointment_time: time.format("%H:%M").to_string(),
            reschedule_reason: reason.trim().to_string(),
        })
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = parse_date(&self.appointment_date).ok()?;
        let time = parse_time(&self.appointment_time).ok()?;
        Some(date.and_time(time))
    }
}

/// Body for `POST /appointments/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub appointment_date: String,
    pub appointment_time: String,
    #[serde(rename = "type")]
    pub kind: AppointmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concern: Option<String>,
}

impl BookingRequest {
    /// Create a booking request with validation.
    pub fn new(
        date: &str,
        time: &str,
        kind: AppointmentType,
        concern: Option<String>,
    ) -> PortalResult<Self> {
        let date = parse_date(date)?;
        let time = parse_time(time)?;
        if let AppointmentType::Other(raw) = &kind {
            return Err(PortalError::InvalidInput(format!(
                "Invalid appointment type: '{}'. Must be one of: medical, dental",
                raw
            )));
        }

        Ok(BookingRequest {
            appointment_date: date.format("%Y-%m-%d").to_string(),
            appointment_time: time.format("%H:%M").to_string(),
            kind,
            concern: concern.filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = parse_date(&self.appointment_date).ok()?;
        let time = parse_time(&self.appointment_time).ok()?;
        Some(date.and_time(time))
    }
}
