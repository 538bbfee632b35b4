//! Scratch fixture naming
//!
//! Names combine a millisecond timestamp, the process id, a per-process
//! counter and a random suffix, so that threads in one process and separate
//! processes sharing a scratch directory never pick the same name.

use std::sync::atomic::{AtomicU64, Ordering};

use pipetest_common::FixtureFormat;

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a fresh scratch file name for `format`
pub fn scratch_file_name(format: FixtureFormat) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let counter = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "temp_{}_{}_{:06}_{}.{}",
        timestamp,
        std::process::id(),
        counter,
        &suffix[..8],
        format.extension()
    )
}
