use super::*;
use tempfile::tempdir;

#[test]
fn paths_layout_under_base() {
    let paths = DaemonPaths::under(PathBuf::from("/tmp/minder-test"));
    assert_eq!(paths.state_dir, PathBuf::from("/tmp/minder-test/data/state"));
    assert_eq!(paths.goals_path, PathBuf::from("/tmp/minder-test/data/goals.json"));
    assert_eq!(paths.diffs_dir, PathBuf::from("/tmp/minder-test/data/cycle-diffs"));
    assert_eq!(paths.lock_path, PathBuf::from("/tmp/minder-test/minderd.lock"));
}

#[test]
fn missing_config_file_defaults() {
    let dir = tempdir().unwrap();
    let paths = DaemonPaths::under(dir.path().to_path_buf());
    let config = FileConfig::load(&paths).unwrap();
    assert!(config.telegram.token.is_none());
    assert_eq!(config.gate.score, 5);
    assert_eq!(config.anthropic.base_url, "https://api.anthropic.com");
}

#[test]
fn config_file_parses_sections() {
    let dir = tempdir().unwrap();
    let paths = DaemonPaths::under(dir.path().to_path_buf());
    std::fs::create_dir_all(dir.path()).unwrap();
    std::fs::write(
        &paths.config_path,
        r#"
[telegram]
token = "bot-token"
chat_id = "42"

[messaging]
base_url = "http://localhost:7000"

[anthropic]
input_per_mtok = 2.5

[gate]
score = 8

[[hattrick.watchlist]]
player = "Kovacs"
deadline_at = 1000
max_bid = 500000
"#,
    )
    .unwrap();
    let config = FileConfig::load(&paths).unwrap();
    assert_eq!(config.telegram.token.as_deref(), Some("bot-token"));
    assert_eq!(config.messaging.base_url.as_deref(), Some("http://localhost:7000"));
    assert!((config.anthropic.input_per_mtok - 2.5).abs() < 1e-9);
    assert_eq!(config.anthropic.output_per_mtok, 15.0, "defaults fill in");
    assert_eq!(config.gate.score, 8);
    assert_eq!(config.hattrick.watchlist.len(), 1);
    assert_eq!(config.hattrick.watchlist[0].max_bid, 500_000);
}

#[test]
fn bad_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let paths = DaemonPaths::under(dir.path().to_path_buf());
    std::fs::write(&paths.config_path, "not [valid toml").unwrap();
    assert!(matches!(
        FileConfig::load(&paths),
        Err(LifecycleError::Config(_))
    ));
}

#[test]
fn second_instance_is_refused() {
    let dir = tempdir().unwrap();
    let paths = DaemonPaths::under(dir.path().to_path_buf());
    let first = startup(&paths, Config::default()).unwrap();
    let second = startup(&paths, Config::default());
    assert!(matches!(second, Err(LifecycleError::LockFailed)));
    drop(first);
}

#[test]
fn lock_file_records_pid() {
    let dir = tempdir().unwrap();
    let paths = DaemonPaths::under(dir.path().to_path_buf());
    let _daemon = startup(&paths, Config::default()).unwrap();
    let pid: u32 = std::fs::read_to_string(&paths.lock_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid, std::process::id());
}
