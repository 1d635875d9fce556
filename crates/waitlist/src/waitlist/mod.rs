//! Waitlist sign-up intake: body parsing, field validation, email normalization, and the
//! HTTP route that ties them to the storage gateway.

pub mod domain;
pub mod email;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{WaitlistEntry, WaitlistSubmission, MAX_EMAIL_CHARS, MAX_FIRST_NAME_CHARS};
pub use email::{validate_email, EmailError, ValidEmail};
pub use router::waitlist_router;
pub use service::{internal_error_response, WaitlistError, WaitlistService};
pub use validation::{parse_body, validate_submission, ValidationError};
