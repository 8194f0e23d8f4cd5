//! Appointment status display and modification policy.
//!
//! Everything here is a total function over loosely-typed backend data:
//! unknown statuses, missing notes and unparseable dates all resolve to a
//! safe default instead of an error.

use chrono::{Duration, Local, NaiveDateTime};

use crate::models::{Appointment, AppointmentStatus};

/// Minimum lead time, in days, for cancelling or rescheduling.
pub const LEAD_TIME_DAYS: i64 = 3;

const ADMIN_RESCHEDULE_KEYWORDS: &[&str] = &["reschedule", "rescheduled", "moved", "changed"];
const PATIENT_REQUEST_PHRASE: &str = "patient requested";

/// Earliest instant an appointment may be at for it to still be modifiable.
pub fn earliest_modifiable(now: NaiveDateTime) -> NaiveDateTime {
    now + Duration::days(LEAD_TIME_DAYS)
}

/// True iff `appointment_at` is at least three days after `now`.
///
/// Instants are compared directly; there is no truncation to calendar days
/// and no timezone normalization.
pub fn can_modify(appointment_at: NaiveDateTime, now: NaiveDateTime) -> bool {
    appointment_at >= earliest_modifiable(now)
}

/// [`can_modify`] against the local wall clock.
pub fn can_modify_from_now(appointment_at: NaiveDateTime) -> bool {
    can_modify(appointment_at, Local::now().naive_local())
}

/// Lead-time rule applied to a fetched appointment.
///
/// An appointment whose date cannot be parsed is treated as not modifiable.
pub fn can_modify_appointment(appointment: &Appointment, now: NaiveDateTime) -> bool {
    match appointment.scheduled_at() {
        Some(at) => can_modify(at, now),
        None => {
            tracing::warn!(
                appointment_id = appointment.id,
                date = %appointment.appointment_date,
                time = %appointment.appointment_time,
                "Unparseable appointment date, hiding modification actions"
            );
            false
        }
    }
}

/// Colour bucket for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeStyle {
    Blue,
    Green,
    Red,
    Yellow,
}

impl BadgeStyle {
    pub fn class(&self) -> &'static str {
        match self {
            BadgeStyle::Blue => "bg-blue-100 text-blue-800",
            BadgeStyle::Green => "bg-green-100 text-green-800",
            BadgeStyle::Red => "bg-red-100 text-red-800",
            BadgeStyle::Yellow => "bg-yellow-100 text-yellow-800",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BadgeStyle::Blue => "blue",
            BadgeStyle::Green => "green",
            BadgeStyle::Red => "red",
            BadgeStyle::Yellow => "yellow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: String,
    pub style: BadgeStyle,
}

/// Map a status to its badge. Unknown statuses land in the yellow bucket.
pub fn status_badge(status: &AppointmentStatus) -> StatusBadge {
    let style = match status {
        AppointmentStatus::Confirmed => BadgeStyle::Blue,
        AppointmentStatus::Completed => BadgeStyle::Green,
        AppointmentStatus::Cancelled => BadgeStyle::Red,
        AppointmentStatus::Pending | AppointmentStatus::Scheduled => BadgeStyle::Yellow,
        AppointmentStatus::Other(_) => BadgeStyle::Yellow,
    };

    StatusBadge {
        label: badge_label(status.as_str()),
        style,
    }
}

/// [`status_badge`] for a raw status string.
pub fn status_badge_str(status: &str) -> StatusBadge {
    status_badge(&AppointmentStatus::parse(status))
}

fn badge_label(raw: &str) -> String {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => "Unknown".to_string(),
    }
}

// Legacy fallback for records created before the explicit flags existed.
fn notes_suggest_admin(notes: Option<&str>) -> bool {
    let Some(notes) = notes else {
        return false;
    };
    let notes = notes.to_lowercase();
    ADMIN_RESCHEDULE_KEYWORDS.iter().any(|k| notes.contains(k))
        && !notes.contains(PATIENT_REQUEST_PHRASE)
}

fn notes_suggest_patient(notes: Option<&str>) -> bool {
    notes
        .map(|n| n.to_lowercase().contains(PATIENT_REQUEST_PHRASE))
        .unwrap_or(false)
}

/// Whether staff moved the appointment.
///
/// The explicit backend flag wins when present. Otherwise the notes are
/// scanned for reschedule keywords without a patient-request marker.
pub fn was_rescheduled_by_admin(appointment: &Appointment) -> bool {
    let heuristic = notes_suggest_admin(appointment.notes.as_deref());
    match appointment.was_rescheduled_by_admin {
        Some(flag) => {
            if flag != heuristic && appointment.notes.is_some() {
                tracing::warn!(
                    appointment_id = appointment.id,
                    explicit = flag,
                    heuristic,
                    "Admin reschedule flag disagrees with notes"
                );
            }
            flag
        }
        None => heuristic,
    }
}

/// Whether the patient asked for the reschedule.
///
/// Same precedence as [`was_rescheduled_by_admin`]: explicit flag first,
/// then a case-insensitive "patient requested" match on the notes.
pub fn was_rescheduled_by_patient(appointment: &Appointment) -> bool {
    let heuristic = notes_suggest_patient(appointment.notes.as_deref());
    match appointment.was_rescheduled_by_patient {
        Some(flag) => {
            if flag != heuristic && appointment.notes.is_some() {
                tracing::warn!(
                    appointment_id = appointment.id,
                    explicit = flag,
                    heuristic,
                    "Patient reschedule flag disagrees with notes"
                );
            }
            flag
        }
        None => heuristic,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleActor {
    Staff,
    Patient,
}

impl RescheduleActor {
    pub fn label(&self) -> &'static str {
        match self {
            RescheduleActor::Staff => "Rescheduled by clinic staff",
            RescheduleActor::Patient => "Rescheduled at patient request",
        }
    }
}

/// Who moved the appointment, if anyone.
///
/// When both attributions hold, staff is reported.
pub fn reschedule_attribution(appointment: &Appointment) -> Option<RescheduleActor> {
    let by_admin = was_rescheduled_by_admin(appointment);
    let by_patient = was_rescheduled_by_patient(appointment);

    match (by_admin, by_patient) {
        (true, true) => {
            tracing::warn!(
                appointment_id = appointment.id,
                "Appointment attributed to both staff and patient, reporting staff"
            );
            Some(RescheduleActor::Staff)
        }
        (true, false) => Some(RescheduleActor::Staff),
        (false, true) => Some(RescheduleActor::Patient),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentType;
    use chrono::NaiveDate;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn appointment_with_notes(notes: Option<&str>) -> Appointment {
        let mut apt = Appointment::new(42, "2026-05-20", "09:00", AppointmentType::Medical);
        apt.notes = notes.map(str::to_string);
        apt
    }

    #[test]
    fn lead_time_boundary_is_inclusive() {
        assert!(can_modify(now() + Duration::days(3), now()));
    }

    #[test]
    fn just_under_three_days_is_rejected() {
        let at = now() + Duration::days(2) + Duration::hours(23) + Duration::minutes(59);
        assert!(!can_modify(at, now()));
    }

    #[test]
    fn lead_time_is_not_calendar_truncated() {
        // Same calendar day three days out, but earlier in the day.
        let at = NaiveDate::from_ymd_opt(2026, 5, 7)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(!can_modify(at, now()));
    }

    #[test]
    fn past_appointments_are_not_modifiable() {
        assert!(!can_modify(now() - Duration::days(1), now()));
    }

    #[test]
    fn unparseable_appointment_is_not_modifiable() {
        let apt = Appointment::new(1, "soon", "10:00", AppointmentType::Dental);
        assert!(!can_modify_appointment(&apt, now()));
    }

    #[test]
    fn appointment_far_out_is_modifiable() {
        let apt = Appointment::new(1, "2026-05-20", "09:00", AppointmentType::Dental);
        assert!(can_modify_appointment(&apt, now()));
    }

    #[test]
    fn badges_cover_known_and_unknown_statuses() {
        assert_eq!(status_badge_str("confirmed").style, BadgeStyle::Blue);
        assert_eq!(status_badge_str("completed").style, BadgeStyle::Green);
        assert_eq!(status_badge_str("cancelled").style, BadgeStyle::Red);
        assert_eq!(status_badge_str("pending").style, BadgeStyle::Yellow);
        assert_eq!(status_badge_str("scheduled").style, BadgeStyle::Yellow);

        let unknown = status_badge_str("awaiting_triage");
        assert_eq!(unknown.style, BadgeStyle::Yellow);
        assert_eq!(unknown.label, "Awaiting_triage");

        let empty = status_badge_str("");
        assert_eq!(empty.style, BadgeStyle::Yellow);
        assert_eq!(empty.label, "Unknown");
    }

    #[test]
    fn badge_label_is_capitalized() {
        assert_eq!(status_badge(&AppointmentStatus::Confirmed).label, "Confirmed");
        assert_eq!(status_badge_str("CANCELLED").label, "Cancelled");
    }

    #[test]
    fn explicit_admin_flag_wins_over_notes() {
        let mut apt = appointment_with_notes(Some("Patient requested a later slot"));
        apt.was_rescheduled_by_admin = Some(true);
        assert!(was_rescheduled_by_admin(&apt));

        let mut apt = appointment_with_notes(Some("Rescheduled due to doctor unavailability"));
        apt.was_rescheduled_by_admin = Some(false);
        assert!(!was_rescheduled_by_admin(&apt));
    }

    #[test]
    fn admin_heuristic_matches_keywords() {
        let apt = appointment_with_notes(Some("Rescheduled due to doctor unavailability"));
        assert!(was_rescheduled_by_admin(&apt));
        assert!(!was_rescheduled_by_patient(&apt));

        let apt = appointment_with_notes(Some("Slot MOVED to the afternoon"));
        assert!(was_rescheduled_by_admin(&apt));
    }

    #[test]
    fn patient_request_is_not_attributed_to_admin() {
        let apt = appointment_with_notes(Some("Patient requested reschedule from 2026-05-10 to 2026-05-20"));
        assert!(!was_rescheduled_by_admin(&apt));
        assert!(was_rescheduled_by_patient(&apt));
        assert_eq!(reschedule_attribution(&apt), Some(RescheduleActor::Patient));
    }

    #[test]
    fn missing_notes_yield_no_attribution() {
        let apt = appointment_with_notes(None);
        assert!(!was_rescheduled_by_admin(&apt));
        assert!(!was_rescheduled_by_patient(&apt));
        assert_eq!(reschedule_attribution(&apt), None);
    }

    #[test]
    fn explicit_patient_flag_wins_over_notes() {
        let mut apt = appointment_with_notes(None);
        apt.was_rescheduled_by_patient = Some(true);
        assert!(was_rescheduled_by_patient(&apt));
    }

    #[test]
    fn both_flags_report_staff() {
        let mut apt = appointment_with_notes(None);
        apt.was_rescheduled_by_admin = Some(true);
        apt.was_rescheduled_by_patient = Some(true);
        assert_eq!(reschedule_attribution(&apt), Some(RescheduleActor::Staff));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn warnings_during(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn null_admin_flag_overrides_keyword_notes() {
        let json = r#"{"id": 42, "appointment_date": "2026-05-20", "appointment_time": "09:00",
                       "status": "scheduled", "type": "medical",
                       "was_rescheduled_by_admin": null,
                       "notes": "Rescheduled due to doctor unavailability"}"#;
        let apt: Appointment = serde_json::from_str(json).unwrap();
        assert!(!was_rescheduled_by_admin(&apt));

        let mut absent = apt.clone();
        absent.was_rescheduled_by_admin = None;
        assert!(was_rescheduled_by_admin(&absent));
    }

    #[test]
    fn flag_disagreeing_with_notes_is_logged() {
        let mut apt = appointment_with_notes(Some("Rescheduled due to doctor unavailability"));
        apt.was_rescheduled_by_admin = Some(false);

        let output = warnings_during(|| assert!(!was_rescheduled_by_admin(&apt)));
        assert!(output.contains("Admin reschedule flag disagrees with notes"), "{output}");
        assert!(output.contains("appointment_id=42"), "{output}");

        apt.was_rescheduled_by_patient = Some(true);
        let output = warnings_during(|| assert!(was_rescheduled_by_patient(&apt)));
        assert!(output.contains("Patient reschedule flag disagrees with notes"), "{output}");
    }

    #[test]
    fn flag_without_notes_is_not_logged() {
        let mut apt = appointment_with_notes(None);
        apt.was_rescheduled_by_admin = Some(true);
        apt.was_rescheduled_by_patient = Some(false);

        let output = warnings_during(|| {
            assert!(was_rescheduled_by_admin(&apt));
            assert!(!was_rescheduled_by_patient(&apt));
        });
        assert!(!output.contains("disagrees with notes"), "{output}");
    }

    #[test]
    fn agreeing_flag_is_not_logged() {
        let mut apt = appointment_with_notes(Some("Rescheduled due to doctor unavailability"));
        apt.was_rescheduled_by_admin = Some(true);

        let output = warnings_during(|| assert!(was_rescheduled_by_admin(&apt)));
        assert!(output.is_empty(), "{output}");
    }
}
