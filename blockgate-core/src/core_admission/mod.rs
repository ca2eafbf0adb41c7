//! Admission control
//!
//! Decides, once and at genesis, whether an agent may join the network, and
//! keeps the web-of-trust that vouchers are checked against.

pub mod errors;
pub mod membership;
pub mod validator;

pub use errors::{AdmissionError, VouchError};
pub use membership::{MembershipDirectory, MembershipStatus, TrustView, Vouch};
pub use validator::{
    Admission, AdmissionLookups, AdmissionPolicy, AdmissionValidator, InvitationStatus, RecordedInvitation,
    VoucherDirectory,
};
