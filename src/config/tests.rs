use std::fs;

use tempfile::TempDir;

use super::*;

#[test]
fn defaults_match_browser_cache_policy() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.cache.ttl, Duration::from_secs(3600));
    assert_eq!(settings.cache.prefix, "mermaid-cache-");
    assert_eq!(
        settings.storage.session_file,
        PathBuf::from(".mermaid-session.json")
    );
    assert!(settings.storage.max_bytes.is_none());
    assert_eq!(settings.render.mermaid_cli_path, PathBuf::from("mmdc"));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_ms = Some(60_000);
    raw.logging.level = Some("info".to_string());

    let overrides = Overrides {
        cache_ttl_ms: Some(5_000),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.ttl, Duration::from_millis(5_000));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = Overrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_ms = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.ttl_ms",
            ..
        }
    ));
}

#[test]
fn blank_prefix_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.prefix = Some("  ".to_string());

    let err = Settings::from_raw(raw).expect_err("blank prefix");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.prefix",
            ..
        }
    ));
}

#[test]
fn zero_quota_is_rejected() {
    let mut raw = RawSettings::default();
    raw.storage.max_bytes = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero quota");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "storage.max_bytes",
            ..
        }
    ));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cache_settings_convert_to_cache_config() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    let config = crate::cache::CacheConfig::from(&settings.cache);
    assert_eq!(config, crate::cache::CacheConfig::default());
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "mermaid-cache",
        "render",
        "--render-mermaid-cli-path",
        "/opt/mmdc",
        "--session-file",
        "/tmp/session.json",
        "diagram.mmd",
    ]);

    match args.command {
        Command::Render(render) => {
            assert_eq!(render.file, PathBuf::from("diagram.mmd"));
            assert_eq!(
                render.overrides.render.mermaid_cli_path.as_deref(),
                Some(std::path::Path::new("/opt/mmdc"))
            );
            assert_eq!(
                render.overrides.session_file.as_deref(),
                Some(std::path::Path::new("/tmp/session.json"))
            );
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn parse_clear_arguments() {
    let args = CliArgs::parse_from(["mermaid-cache", "clear", "--cache-prefix", "preview-"]);

    match args.command {
        Command::Clear(clear) => {
            assert_eq!(clear.overrides.cache_prefix.as_deref(), Some("preview-"));
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn stdin_is_accepted_as_a_file() {
    let args = CliArgs::parse_from(["mermaid-cache", "key", "-"]);
    assert!(matches!(args.command, Command::Key(ref key) if key.file == PathBuf::from("-")));
}

#[test]
fn config_file_layers_under_cli_overrides() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("settings.toml");
    fs::write(
        &path,
        r#"
[cache]
ttl_ms = 1000
prefix = "draft-"

[storage]
max_bytes = 4096
"#,
    )
    .expect("write config file");

    let args = CliArgs::parse_from([
        "mermaid-cache",
        "--config-file",
        path.to_str().expect("utf-8 temp path"),
        "prune",
        "--cache-ttl-ms",
        "2000",
    ]);
    let settings = load(&args).expect("load settings");

    assert_eq!(settings.cache.ttl, Duration::from_millis(2000));
    assert_eq!(settings.cache.prefix, "draft-");
    assert_eq!(
        settings.storage.max_bytes.map(NonZeroUsize::get),
        Some(4096)
    );
}
