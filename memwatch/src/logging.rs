use crate::config::{LogFormat, Logging};
use anyhow::{anyhow, Context, Result};
use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Logs never go to stdout, which is reserved
/// for the report. Keep the returned guard alive until exit when logging to a file.
pub fn init_tracing(cfg: &Logging) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(&cfg.filter)
            .with_context(|| format!("parsing log filter {:?}", cfg.filter))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let (installed, guard) = if let Some(path) = &cfg.file_path {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
        }
        let name = path
            .file_name()
            .with_context(|| format!("log path {} has no file name", path.display()))?;
        let appender =
            tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), name);
        let (nb, guard) = tracing_appender::non_blocking(appender);
        let builder = builder.with_writer(nb).with_ansi(false);
        let installed = match cfg.format {
            LogFormat::Json => builder.json().flatten_event(true).try_init(),
            LogFormat::Text => builder.try_init(),
        };
        (installed, Some(guard))
    } else {
        let builder = builder.with_writer(std::io::stderr);
        let installed = match cfg.format {
            LogFormat::Json => builder.json().flatten_event(true).try_init(),
            LogFormat::Text => builder.try_init(),
        };
        (installed, None)
    };
    installed.map_err(|e| anyhow!("installing tracing subscriber: {e}"))?;
    Ok(guard)
}
