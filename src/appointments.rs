//! Appointment lifecycle: booking, cancellation, rescheduling and staff
//! status changes.
//!
//! Each operation checks the client-side rules, issues exactly one backend
//! call, then re-fetches the full list and returns the refreshed record.
//! Nothing is cached between calls.

use chrono::{Local, NaiveDateTime};

use crate::backend::ClinicBackend;
use crate::documents::{Document, DocumentKind};
use crate::error::{PortalError, PortalResult};
use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, BookingRequest, RescheduleRequest,
    StatusUpdate,
};
use crate::policy;
use crate::session::SessionContext;

pub struct AppointmentService<B: ClinicBackend> {
    backend: B,
    fixed_now: Option<NaiveDateTime>,
}

impl<B: ClinicBackend> AppointmentService<B> {
    pub fn new(backend: B) -> Self {
        AppointmentService {
            backend,
            fixed_now: None,
        }
    }

    /// Pin the clock used by the lead-time rule.
    pub fn with_fixed_now(mut self, now: NaiveDateTime) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn now(&self) -> NaiveDateTime {
        self.fixed_now.unwrap_or_else(|| Local::now().naive_local())
    }

    pub fn list(&self, ctx: &mut SessionContext) -> PortalResult<Vec<Appointment>> {
        self.backend.list_appointments(ctx)
    }

    /// Fetch the list and pick one appointment out of it.
    pub fn find(&self, ctx: &mut SessionContext, appointment_id: i64) -> PortalResult<Appointment> {
        self.list(ctx)?
            .into_iter()
            .find(|a| a.id == appointment_id)
            .ok_or(PortalError::NotFound(appointment_id))
    }

    /// Whether cancel and reschedule actions should be offered.
    pub fn can_modify(&self, appointment: &Appointment) -> bool {
        is_open(&appointment.status) && policy::can_modify_appointment(appointment, self.now())
    }

    fn ensure_modifiable(&self, appointment: &Appointment) -> PortalResult<()> {
        if !is_open(&appointment.status) {
            return Err(PortalError::InvalidInput(format!(
                "Appointment {} is {} and can no longer be changed",
                appointment.id, appointment.status
            )));
        }
        if !policy::can_modify_appointment(appointment, self.now()) {
            return Err(PortalError::LeadTime {
                earliest: policy::earliest_modifiable(self.now()),
            });
        }
        Ok(())
    }

    /// Book a new appointment. The slot must be in the future.
    pub fn book(
        &self,
        ctx: &mut SessionContext,
        date: &str,
        time: &str,
        kind: AppointmentType,
        concern: Option<String>,
    ) -> PortalResult<Vec<Appointment>> {
        let request = BookingRequest::new(date, time, kind, concern)?;
        let at = request
            .scheduled_at()
            .ok_or_else(|| PortalError::InvalidInput("Invalid appointment date".to_string()))?;
        if at <= self.now() {
            return Err(PortalError::InvalidInput(
                "Appointment must be booked for a future date and time".to_string(),
            ));
        }

        self.backend.book_appointment(ctx, &request)?;
        tracing::info!(
            date = %request.appointment_date,
            time = %request.appointment_time,
            kind = %request.kind,
            "Appointment booked"
        );
        self.list(ctx)
    }

    /// Cancel an appointment on the patient's behalf, subject to the
    /// lead-time rule.
    pub fn cancel(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        reason: Option<String>,
    ) -> PortalResult<Appointment> {
        let appointment = self.find(ctx, appointment_id)?;
        self.ensure_modifiable(&appointment)?;

        self.backend
            .update_status(ctx, appointment_id, &StatusUpdate::cancel(reason))?;
        tracing::info!(appointment_id, "Appointment cancelled");
        self.find(ctx, appointment_id)
    }

    /// Move an appointment to a new date and time.
    ///
    /// Both the current slot and the new slot must satisfy the lead-time rule.
    pub fn reschedule(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        date: &str,
        time: &str,
        reason: &str,
    ) -> PortalResult<Appointment> {
        let request = RescheduleRequest::new(date, time, reason)?;
        let appointment = self.find(ctx, appointment_id)?;
        self.ensure_modifiable(&appointment)?;

        let new_at = request
            .scheduled_at()
            .ok_or_else(|| PortalError::InvalidInput("Invalid reschedule date".to_string()))?;
        if !policy::can_modify(new_at, self.now()) {
            return Err(PortalError::LeadTime {
                earliest: policy::earliest_modifiable(self.now()),
            });
        }

        self.backend.reschedule(ctx, appointment_id, &request)?;
        tracing::info!(
            appointment_id,
            from = %appointment.appointment_date,
            to = %request.appointment_date,
            "Appointment rescheduled"
        );
        self.find(ctx, appointment_id)
    }

    /// Staff status transition. Cancelling from the staff side requires a
    /// reason, which the backend forwards to the patient.
    pub fn set_status(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        status: AppointmentStatus,
        reason: Option<String>,
    ) -> PortalResult<Appointment> {
        let is_staff = ctx.user().map(|u| u.role.is_staff()).unwrap_or(false);
        if !ctx.is_authenticated() {
            return Err(PortalError::NotAuthenticated);
        }
        if !is_staff {
            return Err(PortalError::InvalidInput(
                "Only clinic staff can change appointment status".to_string(),
            ));
        }
        if let AppointmentStatus::Other(raw) = &status {
            return Err(PortalError::InvalidInput(format!(
                "Invalid status: '{}'. Must be one of: pending, scheduled, confirmed, completed, cancelled",
                raw
            )));
        }

        let reason = reason.filter(|r| !r.trim().is_empty());
        if status == AppointmentStatus::Cancelled && reason.is_none() {
            return Err(PortalError::InvalidInput(
                "A reason is required when rejecting an appointment".to_string(),
            ));
        }

        let update = StatusUpdate {
            status: status.clone(),
            rejection_reason: reason,
        };
        self.backend.update_status(ctx, appointment_id, &update)?;
        tracing::info!(appointment_id, status = %status, "Appointment status updated");
        self.find(ctx, appointment_id)
    }

    pub fn document(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        kind: DocumentKind,
    ) -> PortalResult<Document> {
        self.backend.fetch_document(ctx, appointment_id, kind)
    }
}

fn is_open(status: &AppointmentStatus) -> bool {
    !matches!(
        status,
        AppointmentStatus::Cancelled | AppointmentStatus::Completed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::models::{Role, User};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn user(role: Role) -> User {
        User {
            id: 1,
            email: "user@uni.edu".to_string(),
            first_name: "Riley".to_string(),
            last_name: "Park".to_string(),
            role,
        }
    }

    fn confirmed(id: i64, date: &str, time: &str) -> Appointment {
        let mut apt = Appointment::new(id, date, time, AppointmentType::Medical);
        apt.status = AppointmentStatus::Confirmed;
        apt
    }

    fn service(role: Role, appointments: Vec<Appointment>) -> (AppointmentService<MockBackend>, SessionContext) {
        let backend = MockBackend::new()
            .with_account("user@uni.edu", "secret", user(role))
            .with_appointments(appointments);
        let mut ctx = SessionContext::new();
        backend.login(&mut ctx, "user@uni.edu", "secret").unwrap();
        (AppointmentService::new(backend).with_fixed_now(now()), ctx)
    }

    #[test]
    fn cancel_round_trip_echoes_reason() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(1, "2026-09-10", "09:00")]);

        let refreshed = service
            .cancel(&mut ctx, 1, Some("Feeling better".to_string()))
            .unwrap();

        assert_eq!(refreshed.status, AppointmentStatus::Cancelled);
        assert_eq!(refreshed.rejection_reason.as_deref(), Some("Feeling better"));
        assert_eq!(
            service.backend().calls(),
            vec![
                "POST /auth/login/",
                "GET /appointments/",
                "PATCH /appointments/1/",
                "GET /appointments/",
            ]
        );
    }

    #[test]
    fn cancel_inside_lead_time_is_refused_without_calling_backend() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(1, "2026-09-04", "11:59")]);

        let err = service.cancel(&mut ctx, 1, None).unwrap_err();
        assert!(matches!(err, PortalError::LeadTime { .. }));
        assert!(!service
            .backend()
            .calls()
            .iter()
            .any(|c| c.starts_with("PATCH")));
    }

    #[test]
    fn cancel_exactly_three_days_out_is_allowed() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(1, "2026-09-04", "12:00")]);
        let refreshed = service.cancel(&mut ctx, 1, None).unwrap();
        assert!(refreshed.is_cancelled());
        assert_eq!(refreshed.rejection_reason, None);
    }

    #[test]
    fn cancel_unknown_appointment_is_not_found() {
        let (service, mut ctx) = service(Role::Patient, vec![]);
        let err = service.cancel(&mut ctx, 99, None).unwrap_err();
        assert!(matches!(err, PortalError::NotFound(99)));
    }

    #[test]
    fn cancelled_appointments_cannot_be_cancelled_again() {
        let mut apt = confirmed(1, "2026-10-01", "09:00");
        apt.status = AppointmentStatus::Cancelled;
        let (service, mut ctx) = service(Role::Patient, vec![apt.clone()]);

        assert!(!service.can_modify(&apt));
        let err = service.cancel(&mut ctx, 1, None).unwrap_err();
        assert!(matches!(err, PortalError::InvalidInput(_)));
    }

    #[test]
    fn patient_reschedule_records_provenance() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(3, "2026-09-10", "09:00")]);

        let refreshed = service
            .reschedule(&mut ctx, 3, "2026-09-15", "14:30", "Exam clash")
            .unwrap();

        assert_eq!(refreshed.appointment_date, "2026-09-15");
        assert_eq!(refreshed.appointment_time, "14:30");
        assert_eq!(refreshed.original_date.as_deref(), Some("2026-09-10"));
        assert_eq!(refreshed.reschedule_reason.as_deref(), Some("Exam clash"));
        assert!(policy::was_rescheduled_by_patient(&refreshed));
        assert!(!policy::was_rescheduled_by_admin(&refreshed));
    }

    #[test]
    fn reschedule_target_must_respect_lead_time() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(3, "2026-09-10", "09:00")]);

        let err = service
            .reschedule(&mut ctx, 3, "2026-09-03", "09:00", "Sooner please")
            .unwrap_err();
        assert!(matches!(err, PortalError::LeadTime { .. }));
    }

    #[test]
    fn reschedule_requires_reason() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(3, "2026-09-10", "09:00")]);
        let err = service
            .reschedule(&mut ctx, 3, "2026-09-15", "09:00", "")
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidInput(_)));
    }

    #[test]
    fn booking_in_the_past_is_refused() {
        let (service, mut ctx) = service(Role::Patient, vec![]);
        let err = service
            .book(&mut ctx, "2026-08-31", "10:00", AppointmentType::Dental, None)
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidInput(_)));
    }

    #[test]
    fn booking_refetches_list() {
        let (service, mut ctx) = service(Role::Patient, vec![]);
        let list = service
            .book(
                &mut ctx,
                "2026-09-02",
                "10:00",
                AppointmentType::Dental,
                Some("Toothache".to_string()),
            )
            .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, AppointmentStatus::Pending);
        assert_eq!(list[0].concern.as_deref(), Some("Toothache"));
    }

    #[test]
    fn staff_rejection_requires_reason() {
        let (service, mut ctx) = service(Role::Staff, vec![confirmed(5, "2026-09-02", "08:00")]);

        let err = service
            .set_status(&mut ctx, 5, AppointmentStatus::Cancelled, None)
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidInput(_)));

        let refreshed = service
            .set_status(
                &mut ctx,
                5,
                AppointmentStatus::Cancelled,
                Some("Clinic closed".to_string()),
            )
            .unwrap();
        assert!(refreshed.is_cancelled());
        assert_eq!(refreshed.rejection_reason.as_deref(), Some("Clinic closed"));
    }

    #[test]
    fn patients_cannot_change_status() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(5, "2026-09-20", "08:00")]);
        let err = service
            .set_status(&mut ctx, 5, AppointmentStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidInput(_)));
    }

    #[test]
    fn staff_reschedule_is_attributed_to_admin() {
        let (service, mut ctx) = service(Role::Admin, vec![confirmed(8, "2026-09-12", "10:00")]);
        let refreshed = service
            .reschedule(&mut ctx, 8, "2026-09-14", "10:00", "Doctor unavailable")
            .unwrap();
        assert_eq!(
            policy::reschedule_attribution(&refreshed),
            Some(policy::RescheduleActor::Staff)
        );
        assert_eq!(refreshed.rescheduled_by_name.as_deref(), Some("Riley Park"));
    }

    #[test]
    fn expired_session_is_cleared_on_failure() {
        let (service, mut ctx) = service(Role::Patient, vec![confirmed(1, "2026-09-10", "09:00")]);
        service.backend().revoke_token();

        let err = service.cancel(&mut ctx, 1, None).unwrap_err();
        assert!(matches!(err, PortalError::Unauthorized));
        assert!(!ctx.is_authenticated());

        let err = service.list(&mut ctx).unwrap_err();
        assert!(matches!(err, PortalError::NotAuthenticated));
    }

    #[test]
    fn documents_pass_through() {
        let backend = MockBackend::new()
            .with_account("user@uni.edu", "secret", user(Role::Patient))
            .with_document(2, DocumentKind::ViewMedicalCertificate, b"%PDF-1.4");
        let mut ctx = SessionContext::new();
        backend.login(&mut ctx, "user@uni.edu", "secret").unwrap();
        let service = AppointmentService::new(backend);

        let doc = service
            .document(&mut ctx, 2, DocumentKind::ViewMedicalCertificate)
            .unwrap();
        assert!(doc.looks_like_pdf());

        let err = service
            .document(&mut ctx, 2, DocumentKind::DownloadFormData)
            .unwrap_err();
        assert_eq!(err.user_message(), "Document not available");
    }
}
