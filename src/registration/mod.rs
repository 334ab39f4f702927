/// Registrations and the staff approval workflow
///
/// Registrations are the root entity: OTP requests, QR codes and
/// attendance records all hang off one.

pub mod approval;
pub mod store;

pub use approval::ApprovalWorkflow;
pub use store::{NewRegistration, RegistrationDetails, RegistrationStore};
