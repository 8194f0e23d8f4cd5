//! Client for the university health services clinic portal.
//!
//! The backend owns every record. This crate provides the typed wire
//! models, an explicit session, the backend abstraction, and the one piece
//! of client-side logic worth isolating: the appointment status and
//! modification policy in [`policy`].

pub mod appointments;
pub mod backend;
pub mod config;
pub mod documents;
pub mod error;
pub mod models;
pub mod policy;
pub mod report;
pub mod session;

pub use appointments::AppointmentService;
pub use backend::{ClinicBackend, HttpBackend, MockBackend};
pub use config::PortalConfig;
pub use error::{PortalError, PortalResult};
pub use session::{Session, SessionContext};
