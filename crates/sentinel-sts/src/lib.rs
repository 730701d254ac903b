//! sentinel-sts
//!
//! The credential engine: two-hop STS assumption. Base credentials (the
//! server's own identity) are exchanged via AssumeRole for target-role
//! credentials stamped with a Sentinel SourceIdentity. If the stamp cannot
//! be composed, no STS call is made.

pub mod engine;
pub mod error;

pub use engine::{CredentialIssuer, IssueRequest, IssuedCredentials, StsIssuer};
pub use error::StsError;
