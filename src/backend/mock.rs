use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Local;

use super::ClinicBackend;
use crate::documents::{Document, DocumentKind};
use crate::error::{PortalError, PortalResult};
use crate::models::{
    Appointment, AppointmentStatus, BookingRequest, LoginResponse, PatientProfile,
    RescheduleRequest, StatusUpdate, User,
};
use crate::session::{Session, SessionContext};

const MOCK_TOKEN: &str = "mock-access-token";

/// In-memory backend for testing. Behaves like the clinic API: mutations
/// change the stored records and the next list call reflects them.
pub struct MockBackend {
    state: Mutex<MockState>,
}

struct MockState {
    appointments: Vec<Appointment>,
    accounts: Vec<(String, String, User)>,
    profile: Option<PatientProfile>,
    documents: HashMap<(i64, DocumentKind), Vec<u8>>,
    next_id: i64,
    token_revoked: bool,
    calls: Vec<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                appointments: Vec::new(),
                accounts: Vec::new(),
                profile: None,
                documents: HashMap::new(),
                next_id: 1,
                token_revoked: false,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_account(self, email: &str, password: &str, user: User) -> Self {
        self.lock()
            .accounts
            .push((email.to_string(), password.to_string(), user));
        self
    }

    pub fn with_appointments(self, appointments: Vec<Appointment>) -> Self {
        {
            let mut state = self.lock();
            let max_id = appointments.iter().map(|a| a.id).max().unwrap_or(0);
            state.next_id = state.next_id.max(max_id + 1);
            state.appointments = appointments;
        }
        self
    }

    pub fn with_profile(self, profile: PatientProfile) -> Self {
        self.lock().profile = Some(profile);
        self
    }

    pub fn with_document(self, appointment_id: i64, kind: DocumentKind, bytes: &[u8]) -> Self {
        self.lock()
            .documents
            .insert((appointment_id, kind), bytes.to_vec());
        self
    }

    /// Make every subsequent authenticated call answer 401.
    pub fn revoke_token(&self) {
        self.lock().token_revoked = true;
    }

    /// Calls received so far, as `METHOD path` strings.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn authorize(&self, ctx: &mut SessionContext, call: String) -> PortalResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(call);

        let token_ok = ctx.access_token()? == MOCK_TOKEN && !state.token_revoked;
        if !token_ok {
            return Err(ctx.absorb(PortalError::Unauthorized));
        }
        Ok(state)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn appointment_mut(&mut self, appointment_id: i64) -> PortalResult<&mut Appointment> {
        self.appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| PortalError::from_response(404, r#"{"detail": "Not found."}"#))
    }
}

impl ClinicBackend for MockBackend {
    fn login(&self, ctx: &mut SessionContext, email: &str, password: &str) -> PortalResult<()> {
        let mut state = self.lock();
        state.calls.push("POST /auth/login/".to_string());

        let user = state
            .accounts
            .iter()
            .find(|(e, p, _)| e == email && p == password)
            .map(|(_, _, user)| user.clone())
            .ok_or_else(|| PortalError::from_response(401, r#"{"error": "Invalid email or password"}"#))?;
        state.token_revoked = false;

        ctx.establish(Session::from_login(LoginResponse {
            access: MOCK_TOKEN.to_string(),
            refresh: Some("mock-refresh-token".to_string()),
            user,
        })?);
        Ok(())
    }

    fn logout(&self, ctx: &mut SessionContext) -> PortalResult<()> {
        self.lock().calls.push("POST /auth/logout/".to_string());
        ctx.clear();
        Ok(())
    }

    fn list_appointments(&self, ctx: &mut SessionContext) -> PortalResult<Vec<Appointment>> {
        let state = self.authorize(ctx, "GET /appointments/".to_string())?;
        Ok(state.appointments.clone())
    }

    fn book_appointment(&self, ctx: &mut SessionContext, request: &BookingRequest) -> PortalResult<()> {
        let mut state = self.authorize(ctx, "POST /appointments/".to_string())?;

        let taken = state.appointments.iter().any(|a| {
            !a.is_cancelled()
                && a.appointment_date == request.appointment_date
                && a.appointment_time == request.appointment_time
                && a.kind == request.kind
        });
        if taken {
            return Err(PortalError::from_response(
                400,
                r#"{"error": "This time slot is already booked"}"#,
            ));
        }

        let id = state.next_id;
        state.next_id += 1;
        let mut appointment = Appointment::new(
            id,
            &request.appointment_date,
            &request.appointment_time,
            request.kind.clone(),
        );
        appointment.concern = request.concern.clone();
        appointment.patient_name = ctx.user().map(User::full_name);
        state.appointments.push(appointment);
        Ok(())
    }

    fn update_status(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        update: &StatusUpdate,
    ) -> PortalResult<()> {
        let mut state = self.authorize(ctx, format!("PATCH /appointments/{}/", appointment_id))?;
        let appointment = state.appointment_mut(appointment_id)?;
        appointment.status = update.status.clone();
        if update.rejection_reason.is_some() {
            appointment.rejection_reason = update.rejection_reason.clone();
        }
        Ok(())
    }

    fn reschedule(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        request: &RescheduleRequest,
    ) -> PortalResult<()> {
        let by_staff = ctx.user().map(|u| u.role.is_staff()).unwrap_or(false);
        let actor = ctx.user().map(User::full_name);
        let mut state = self.authorize(ctx, format!("POST /appointments/{}/reschedule/", appointment_id))?;
        let appointment = state.appointment_mut(appointment_id)?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(PortalError::from_response(
                400,
                r#"{"error": "Cancelled appointments cannot be rescheduled"}"#,
            ));
        }

        appointment.original_date = Some(appointment.appointment_date.clone());
        appointment.original_time = Some(appointment.appointment_time.clone());
        appointment.appointment_date = request.appointment_date.clone();
        appointment.appointment_time = request.appointment_time.clone();
        appointment.reschedule_reason = Some(request.reschedule_reason.clone());
        appointment.rescheduled_at = Some(Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string());
        appointment.rescheduled_by_name = actor;
        appointment.was_rescheduled_by_admin = Some(by_staff);
        appointment.was_rescheduled_by_patient = Some(!by_staff);
        Ok(())
    }

    fn fetch_document(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        kind: DocumentKind,
    ) -> PortalResult<Document> {
        let state = self.authorize(
            ctx,
            format!("GET /appointments/{}/{}/", appointment_id, kind.endpoint()),
        )?;
        let bytes = state
            .documents
            .get(&(appointment_id, kind))
            .cloned()
            .ok_or_else(|| PortalError::from_response(404, r#"{"error": "Document not available"}"#))?;

        Ok(Document {
            kind,
            appointment_id,
            bytes,
            content_type: Some("application/pdf".to_string()),
        })
    }

    fn get_profile(&self, ctx: &mut SessionContext) -> PortalResult<PatientProfile> {
        let state = self.authorize(ctx, "GET /patients/profile/".to_string())?;
        state
            .profile
            .clone()
            .ok_or_else(|| PortalError::from_response(404, r#"{"error": "Profile not found"}"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentType, Role};

    fn student() -> User {
        User {
            id: 4,
            email: "sam@uni.edu".to_string(),
            first_name: "Sam".to_string(),
            last_name: "Ortiz".to_string(),
            role: Role::Patient,
        }
    }

    #[test]
    fn login_rejects_bad_password() {
        let backend = MockBackend::new().with_account("sam@uni.edu", "pw", student());
        let mut ctx = SessionContext::new();

        let err = backend.login(&mut ctx, "sam@uni.edu", "nope").unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password");
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn revoked_token_clears_session() {
        let backend = MockBackend::new().with_account("sam@uni.edu", "pw", student());
        let mut ctx = SessionContext::new();
        backend.login(&mut ctx, "sam@uni.edu", "pw").unwrap();

        backend.revoke_token();
        let err = backend.list_appointments(&mut ctx).unwrap_err();
        assert!(matches!(err, PortalError::Unauthorized));
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn booking_assigns_fresh_ids_and_rejects_duplicates() {
        let existing = Appointment::new(10, "2026-06-01", "09:00", AppointmentType::Medical);
        let backend = MockBackend::new()
            .with_account("sam@uni.edu", "pw", student())
            .with_appointments(vec![existing]);
        let mut ctx = SessionContext::new();
        backend.login(&mut ctx, "sam@uni.edu", "pw").unwrap();

        let request = BookingRequest::new("2026-06-02", "10:00", AppointmentType::Dental, None).unwrap();
        backend.book_appointment(&mut ctx, &request).unwrap();
        let err = backend.book_appointment(&mut ctx, &request).unwrap_err();
        assert_eq!(err.user_message(), "This time slot is already booked");

        let list = backend.list_appointments(&mut ctx).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].id, 11);
        assert_eq!(list[1].patient_name.as_deref(), Some("Sam Ortiz"));
    }

    #[test]
    fn calls_are_recorded() {
        let backend = MockBackend::new().with_account("sam@uni.edu", "pw", student());
        let mut ctx = SessionContext::new();
        backend.login(&mut ctx, "sam@uni.edu", "pw").unwrap();
        backend.list_appointments(&mut ctx).unwrap();
        backend.logout(&mut ctx).unwrap();

        assert_eq!(
            backend.calls(),
            vec!["POST /auth/login/", "GET /appointments/", "POST /auth/logout/"]
        );
    }
}
