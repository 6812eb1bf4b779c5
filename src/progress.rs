//! Indexing progress reporting.
//!
//! Progress lines go to **stderr** so stdout stays parseable for scripts.
//! The pipeline only sees the [`ProgressFn`] callback type; the CLI picks
//! a reporter here.

use std::io::Write;
use std::sync::Arc;

use crate::pipeline::ProgressFn;

/// Human-friendly progress on stderr: "Indexing files...  12 / 40".
pub fn stderr_progress() -> ProgressFn {
    Arc::new(|phase: &str, processed: usize, total: usize| {
        let line = format!("{phase}  {processed} / {total}\n");
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    })
}

/// No-op reporter for quiet runs.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_, _, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporters_are_callable() {
        stderr_progress()("Indexing files...", 1, 2);
        no_progress()("Indexing files...", 1, 2);
    }
}
