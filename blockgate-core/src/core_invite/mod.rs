/*
    core_invite - Invite codes

    Handles:
    - The two invite wire formats and their canonical signed bytes
    - Cheap format pre-checks for the join screen
    - Issuing, listing and revoking invitations
*/

pub mod codec;
pub mod errors;
pub mod issuer;
pub mod payload;

pub use codec::{expires_at, fingerprint, is_expired, parse, parse_bytes, serialize, validate_format};
pub use errors::{FormatError, InviteError, ParseError};
pub use issuer::{GeneratedInvite, Invitation, InvitationRef, InviteIssuer};
pub use payload::{InvitePayload, InviteV1, InviteV2, WireVersion};
