use std::{fs, io, path::Path};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder. Later calls are no-ops.
pub fn init() {
    if PROM_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROM_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "failed to install Prometheus metrics recorder"),
    }
}

/// Write the current metrics in Prometheus text format to `path`.
///
/// The file is written next to its final location and renamed into place so a
/// node exporter textfile collector never reads a partial file.
pub fn write_textfile(path: &Path) -> io::Result<()> {
    let Some(handle) = PROM_HANDLE.get() else {
        return Ok(());
    };
    write_atomically(path, &handle.render())
}

fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
