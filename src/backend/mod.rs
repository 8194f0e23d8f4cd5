pub mod http;
pub mod mock;

pub use http::HttpBackend;
pub use mock::MockBackend;

use crate::documents::{Document, DocumentKind};
use crate::error::PortalResult;
use crate::models::{Appointment, BookingRequest, PatientProfile, RescheduleRequest, StatusUpdate};
use crate::session::SessionContext;

/// The clinic REST surface the portal depends on.
///
/// Every call receives the session explicitly. Mutations return nothing:
/// callers re-fetch the list to observe the backend's view of the change.
pub trait ClinicBackend {
    /// Authenticate and populate `ctx`.
    fn login(&self, ctx: &mut SessionContext, email: &str, password: &str) -> PortalResult<()>;

    /// End the session. `ctx` is cleared even if the backend call fails.
    fn logout(&self, ctx: &mut SessionContext) -> PortalResult<()>;

    fn list_appointments(&self, ctx: &mut SessionContext) -> PortalResult<Vec<Appointment>>;

    fn book_appointment(&self, ctx: &mut SessionContext, request: &BookingRequest) -> PortalResult<()>;

    fn update_status(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        update: &StatusUpdate,
    ) -> PortalResult<()>;

    fn reschedule(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        request: &RescheduleRequest,
    ) -> PortalResult<()>;

    fn fetch_document(
        &self,
        ctx: &mut SessionContext,
        appointment_id: i64,
        kind: DocumentKind,
    ) -> PortalResult<Document>;

    fn get_profile(&self, ctx: &mut SessionContext) -> PortalResult<PatientProfile>;
}
