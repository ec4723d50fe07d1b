// Unit tests for the element cache

use super::*;
use tempfile::TempDir;

const URL: &str = "http://example.com/login";

fn temp_cache() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("element_cache.json");
    (dir, path)
}

#[test]
fn test_normalize_description() {
    assert_eq!(normalize_description("  Login   Button "), "login button");
    assert_eq!(
        cache_key(URL, "Login button"),
        cache_key(URL, " login  BUTTON")
    );
    assert_ne!(
        cache_key(URL, "Login button"),
        cache_key("http://example.com/other", "Login button")
    );
    assert_eq!(cache_key(URL, "x").len(), 64);
}

#[test]
fn test_set_get_and_persist() {
    let (_dir, path) = temp_cache();
    let selector = Selector::xpath("//button[text()='Login']");

    {
        let mut cache = ElementCache::load(&path);
        assert!(cache.is_empty());
        cache.set(URL, "login button", &selector, ResolutionSource::Heuristic);
        assert_eq!(cache.len(), 1);
    }

    assert!(path.exists());
    let cache = ElementCache::load(&path);
    let entry = cache.get(URL, "Login Button").expect("entry survives reload");
    assert_eq!(entry.to_selector(), selector);
    assert_eq!(entry.url, URL);
    assert_eq!(entry.element_description, "login button");
    assert_eq!(entry.source, ResolutionSource::Heuristic);
    assert!(cache.get("http://example.com/", "login button").is_none());
}

#[test]
fn test_overwrite_keeps_single_entry() {
    let (_dir, path) = temp_cache();
    let mut cache = ElementCache::load(&path);
    cache.set(URL, "email", &Selector::css("#email"), ResolutionSource::Ai);
    cache.set(URL, "Email", &Selector::css("input[name=email]"), ResolutionSource::Ai);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(URL, "email").unwrap().selector, "input[name=email]");
}

#[test]
fn test_remove_and_clear() {
    let (_dir, path) = temp_cache();
    let mut cache = ElementCache::load(&path);
    cache.set(URL, "a", &Selector::css("#a"), ResolutionSource::Heuristic);
    cache.set(URL, "b", &Selector::css("#b"), ResolutionSource::Heuristic);

    assert!(cache.remove(URL, "a").is_some());
    assert!(cache.remove(URL, "a").is_none());
    assert_eq!(ElementCache::load(&path).len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert!(ElementCache::load(&path).is_empty());
}

#[test]
fn test_corrupt_file_starts_empty() {
    let (_dir, path) = temp_cache();
    std::fs::write(&path, "{ not json").unwrap();

    let mut cache = ElementCache::load(&path);
    assert!(cache.is_empty());

    // Next save replaces the corrupt content
    cache.set(URL, "a", &Selector::css("#a"), ResolutionSource::Cache);
    assert_eq!(ElementCache::load(&path).len(), 1);
}

#[test]
fn test_empty_file_starts_empty() {
    let (_dir, path) = temp_cache();
    std::fs::write(&path, "").unwrap();
    assert!(ElementCache::load(&path).is_empty());
}

#[test]
fn test_stats() {
    let (_dir, path) = temp_cache();
    let mut cache = ElementCache::load(&path);
    assert_eq!(cache.stats().cache_size_bytes, 0);

    cache.set(URL, "a", &Selector::css("#a"), ResolutionSource::Heuristic);
    let stats = cache.stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.cache_file, path);
    assert!(stats.cache_size_bytes > 0);
}

#[test]
fn test_save_creates_parent_directory() {
    let (dir, _) = temp_cache();
    let path = dir.path().join("nested").join("cache.json");
    let mut cache = ElementCache::load(&path);
    cache.set(URL, "a", &Selector::css("#a"), ResolutionSource::Heuristic);
    assert!(path.exists());
}

#[test]
fn test_cache_file_format() {
    let (_dir, path) = temp_cache();
    let mut cache = ElementCache::load(&path);
    cache.set(URL, "Login button", &Selector::xpath("//button"), ResolutionSource::Ai);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &raw[cache_key(URL, "Login button")];
    assert_eq!(entry["selector"], "//button");
    assert_eq!(entry["selector_type"], "xpath");
    assert_eq!(entry["source"], "ai");
    assert_eq!(entry["element_description"], "Login button");
}

#[test]
fn test_loads_file_without_source_or_timestamp() {
    let (_dir, path) = temp_cache();
    std::fs::write(
        &path,
        r##"{
  "5f2b9c0e1a": {
    "selector": "//button[text()='Login']",
    "selector_type": "xpath",
    "url": "http://example.com/login",
    "element_description": "Login button",
    "metadata": {}
  },
  "9d41e7aa03": {
    "selector": "#email",
    "selector_type": "css",
    "url": "http://example.com/login",
    "element_description": "Email field",
    "metadata": {"confidence": 0.9}
  }
}"##,
    )
    .unwrap();

    let cache = ElementCache::load(&path);
    assert_eq!(cache.len(), 2);

    let login = cache.get(URL, "login  button").unwrap();
    assert_eq!(login.to_selector(), Selector::xpath("//button[text()='Login']"));
    assert_eq!(login.source, ResolutionSource::Heuristic);
    assert_eq!(login.created_at, DateTime::<Utc>::default());

    let email = cache.get(URL, "Email field").unwrap();
    assert_eq!(email.to_selector(), Selector::css("#email"));
}
