use std::fs;

use mermaid_cache::cache::{CacheConfig, DiagramCache, SessionStorage};
use mermaid_cache::infra::storage::FileStorage;
use tempfile::TempDir;

const FLOWCHART: &str = "flowchart TD\n  A --> B";

#[test]
fn cached_diagrams_survive_reopening_the_session() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("session.json");

    let cache = DiagramCache::new(
        FileStorage::open(&path, None).expect("open session"),
        CacheConfig::default(),
    );
    cache.set(FLOWCHART, "<svg>1</svg>");
    drop(cache);

    let reopened = DiagramCache::new(
        FileStorage::open(&path, None).expect("reopen session"),
        CacheConfig::default(),
    );
    assert_eq!(reopened.get(FLOWCHART).as_deref(), Some("<svg>1</svg>"));
}

#[test]
fn session_file_uses_browser_layout() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("session.json");

    let cache = DiagramCache::new(
        FileStorage::open(&path, None).expect("open session"),
        CacheConfig::default(),
    );
    cache.set(FLOWCHART, "<svg>1</svg>");

    let raw = fs::read_to_string(&path).expect("read session file");
    let session: serde_json::Value = serde_json::from_str(&raw).expect("session is json");
    let entry: serde_json::Value = serde_json::from_str(
        session["mermaid-cache-c4ga2f"]
            .as_str()
            .expect("entry stored as a string value"),
    )
    .expect("entry is json");
    assert_eq!(entry["svg"], "<svg>1</svg>");
    assert!(entry["timestamp"].is_i64());
}

#[test]
fn clear_all_preserves_foreign_keys_on_disk() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("session.json");
    fs::write(
        &path,
        r#"{"mermaid-cache-123":"{}","theme":"dark","mermaid-cache-456":"invalid json"}"#,
    )
    .expect("seed session file");

    let cache = DiagramCache::new(
        FileStorage::open(&path, None).expect("open session"),
        CacheConfig::default(),
    );
    cache.clear_all();

    let reopened = FileStorage::open(&path, None).expect("reopen session");
    assert_eq!(reopened.keys(), vec!["theme".to_string()]);
}

#[test]
fn full_session_drops_writes_quietly() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("session.json");

    let cache = DiagramCache::new(
        FileStorage::open(&path, Some(32)).expect("open session"),
        CacheConfig::default(),
    );
    cache.set(FLOWCHART, "<svg>far too large for a thirty-two byte session</svg>");

    assert!(cache.get(FLOWCHART).is_none());
    assert!(!path.exists());
}

#[test]
fn foreign_non_string_values_survive_cache_writes() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("session.json");
    fs::write(&path, r#"{"theme":"dark","count":3}"#).expect("seed session file");

    let cache = DiagramCache::new(
        FileStorage::open(&path, None).expect("open session"),
        CacheConfig::default(),
    );
    cache.set(FLOWCHART, "<svg>1</svg>");
    cache.clear_all();

    let session: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read session file"))
            .expect("session is json");
    assert_eq!(session, serde_json::json!({"theme": "dark", "count": 3}));
}

#[test]
fn clear_in_one_process_is_not_undone_by_another() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("session.json");
    let open_cache = || {
        DiagramCache::new(
            FileStorage::open(&path, None).expect("open session"),
            CacheConfig::default(),
        )
    };

    let writer = open_cache();
    writer.set("graph A", "<svg>a</svg>");
    let late_writer = open_cache();
    let clearer = open_cache();

    clearer.clear_all();
    late_writer.set("graph B", "<svg>b</svg>");

    let reopened = FileStorage::open(&path, None).expect("reopen session");
    assert_eq!(reopened.keys(), vec![late_writer.key_for("graph B")]);
    assert!(writer.get("graph A").is_none());
    assert_eq!(writer.get("graph B").as_deref(), Some("<svg>b</svg>"));
}
