//! Metric names and descriptions
//!
//! Call sites record through the `metrics` facade; nothing is exported
//! unless the embedding process installs a recorder.

use metrics::{describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Admission decisions, labelled by `result`
pub const ADMISSIONS_TOTAL: &str = "blockgate_admissions_total";

/// Time spent in one admission check, in milliseconds
pub const ADMISSION_DURATION_MS: &str = "blockgate_admission_duration_ms";

pub const INVITES_ISSUED_TOTAL: &str = "blockgate_invites_issued_total";

pub const INVITES_REVOKED_TOTAL: &str = "blockgate_invites_revoked_total";

pub const REVOCATIONS_TOTAL: &str = "blockgate_revocations_total";

/// Writes refused because the author is revoked, labelled by `kind`
pub const WRITES_REJECTED_TOTAL: &str = "blockgate_writes_rejected_total";

/// Register descriptions for every metric above
pub fn init_metrics() {
    describe_counter!(ADMISSIONS_TOTAL, "Admission decisions by result");
    describe_histogram!(ADMISSION_DURATION_MS, "Admission check duration in milliseconds");
    describe_counter!(INVITES_ISSUED_TOTAL, "Invite codes issued");
    describe_counter!(INVITES_REVOKED_TOTAL, "Invitations revoked by the issuer");
    describe_counter!(REVOCATIONS_TOTAL, "Agents revoked locally");
    describe_counter!(WRITES_REJECTED_TOTAL, "Writes rejected for revoked authors");
}

/// Records elapsed milliseconds into a histogram when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}
