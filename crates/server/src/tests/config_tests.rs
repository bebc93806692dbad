use super::{normalize_database_url, prepare_database_url, settings_from_sources, Settings};

use std::collections::HashMap;

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn blank_database_url_falls_back_to_default() {
    assert_eq!(
        normalize_database_url("   "),
        Settings::default().database_url
    );
}

#[test]
fn keeps_in_memory_url_untouched() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn normalizes_windows_plain_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn converts_sqlite_double_slash_windows_path() {
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn creates_parent_dir_for_nested_sqlite_path() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}

#[test]
fn env_overrides_file_values() {
    let mut file_cfg = HashMap::new();
    file_cfg.insert("bind_addr".to_string(), "0.0.0.0:9000".to_string());
    file_cfg.insert("session_ttl_seconds".to_string(), "120".to_string());

    let env: HashMap<&str, &str> = [
        ("SERVER_BIND", "127.0.0.1:7000"),
        ("APP__BIND_ADDR", "127.0.0.1:7001"),
        ("APP__SESSION_SECRET", "from-env"),
        ("APP__MAX_SIGNATURE_BYTES", "2048"),
    ]
    .into_iter()
    .collect();

    let settings = settings_from_sources(&file_cfg, |key| env.get(key).map(|v| v.to_string()));
    assert_eq!(settings.server_bind, "127.0.0.1:7001");
    assert_eq!(settings.session_secret, "from-env");
    assert_eq!(settings.session_ttl_seconds, 120);
    assert_eq!(settings.max_signature_bytes, 2048);
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn unparsable_numbers_keep_previous_value() {
    let settings = settings_from_sources(&HashMap::new(), |key| {
        (key == "APP__SESSION_TTL_SECONDS").then(|| "soon".to_string())
    });
    assert_eq!(
        settings.session_ttl_seconds,
        Settings::default().session_ttl_seconds
    );
}
