//! Shared helpers for the cross-crate tests: fixture data directories,
//! scratch space for saved files and a test-writer tracing subscriber.

use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// A catalog directory under `data/`.
pub fn data_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

/// A fresh, empty directory for files a test writes.
pub fn scratch_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "foreman_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        panic!("cannot create {}: {e}", dir.display());
    }
    dir
}

pub fn cleanup(dir: &Path) {
    let _ = std::fs::remove_dir_all(dir);
}

/// Route `tracing` output through the test harness. `RUST_LOG` overrides
/// the default `warn` level. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
