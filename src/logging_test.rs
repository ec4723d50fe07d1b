use super::*;
use tempfile::TempDir;

#[test]
fn test_level_filters() {
    assert_eq!(LogLevel::Debug.as_filter(), "debug");
    assert_eq!(LogLevel::Warning.as_filter(), "warn");
    assert_eq!(LogLevel::Error.as_filter(), "error");
}

// The subscriber is process-global, so install and reinstall are checked together
#[test]
fn test_init_writes_rolling_file() {
    let dir = TempDir::new().unwrap();
    let log_dir = dir.path().join("logs");
    let options = LogOptions {
        level: LogLevel::Error,
        log_dir: Some(log_dir.clone()),
    };

    let guard = init(&options).unwrap();
    assert!(guard.is_some());
    assert!(log_dir.is_dir());

    tracing::debug!("file layer records debug output");
    drop(guard);

    let names: Vec<String> = std::fs::read_dir(&log_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert!(
        names.iter().any(|n| n.starts_with(LOG_FILE_PREFIX)),
        "log files: {names:?}"
    );

    let again = init(&LogOptions {
        level: LogLevel::Info,
        log_dir: None,
    });
    assert!(again.is_err());
}
