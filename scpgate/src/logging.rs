use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::UtcOffset;
use tracing::Subscriber;
use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const FULL_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[day].[month].[year] [hour]:[minute]:[second]");
const SHORT_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");

/// `log_file` receives the same events as the console, without colors.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new("scpgate=info"),
    };
    let env_filter = Arc::new(env_filter);

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let enable_colors = console::user_attended();

    let file_layer = match log_file {
        Some(path) => Some(file_layer(open_log_file(path)?, offset, env_filter.clone())),
        None => None,
    };

    let full_fmt_layer = {
        let env_filter = env_filter.clone();
        tracing_subscriber::fmt::layer()
            .with_ansi(enable_colors)
            .with_timer(OffsetTime::new(offset, FULL_TIMESTAMP))
            .with_filter(dynamic_filter_fn(move |m, c| {
                env_filter.enabled(m, c.clone())
            }))
    };
    let compact_fmt_layer = {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(enable_colors)
            .with_target(false)
            .with_timer(OffsetTime::new(offset, SHORT_TIMESTAMP))
            .with_filter(dynamic_filter_fn(move |m, c| {
                env_filter.enabled(m, c.clone())
            }))
    };

    let r = tracing_subscriber::registry();
    let r = r.with(if !enable_colors {
        Some(full_fmt_layer)
    } else {
        None
    });
    let r = r.with(if enable_colors {
        Some(compact_fmt_layer)
    } else {
        None
    });
    let r = r.with(file_layer);

    r.init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file {path:?}"))
}

fn file_layer<S>(file: File, offset: UtcOffset, env_filter: Arc<EnvFilter>) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(OffsetTime::new(offset, FULL_TIMESTAMP))
        .with_writer(Mutex::new(file))
        .with_filter(dynamic_filter_fn(move |m, c| {
            env_filter.enabled(m, c.clone())
        }))
}

#[cfg(test)]
mod tests {
    use tracing::{debug, info};

    use super::*;

    #[test]
    fn test_file_layer_appends_filtered_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scpgate.log");
        std::fs::write(&path, "previous run\n").unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(
            open_log_file(&path).unwrap(),
            UtcOffset::UTC,
            Arc::new(EnvFilter::new("scpgate=info")),
        ));
        tracing::subscriber::with_default(subscriber, || {
            info!(session = "abc", "Upload complete");
            debug!("Not at this level");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].contains("Upload complete"));
        assert!(lines[1].contains("session=\"abc\""));
        assert!(!lines[1].contains('\u{1b}'));
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_log_file(&dir.path().join("missing/scpgate.log")).is_err());
    }
}
