
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use vigil_fim::config::Config;
use vigil_fim::fim::{self, CheckStatus};
use vigil_fim::store::BaselineStore;

const SHA_HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn test_config(root: &std::path::Path) -> (Config, BaselineStore) {
    let cfg = Config {
        store_path: root.join("base.csv").to_string_lossy().to_string(),
        hash_alg: "sha256".to_string(),
        persist_timestamps: false,
    };
    let store = BaselineStore::new(&cfg.store_path);
    (cfg, store)
}

// canonicalized so registered paths compare equal to what we created
fn canon_root(dir: &tempfile::TempDir) -> PathBuf {
    dunce::canonicalize(dir.path()).unwrap()
}

#[test]
fn end_to_end_register_modify_revert() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (cfg, store) = test_config(&root);

    let file = root.join("a.txt");
    fs::write(&file, "hello").unwrap();

    // register: store gains one row with the sha256 of "hello"
    let record = fim::register(&cfg, &store, &file).unwrap();
    assert_eq!(record.digest, SHA_HELLO);
    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].path, file.to_string_lossy());
    assert_eq!(rows[0].digest, SHA_HELLO);
    let t0 = rows[0].last_verified.clone();

    // drift: modified content is reported with the registration timestamp
    fs::write(&file, "hello!").unwrap();
    let reports = fim::check_all(&cfg, &store, None).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].status,
        CheckStatus::NotSecure {
            last_valid: t0.clone()
        }
    );

    // revert: the original bytes verify clean again
    fs::write(&file, "hello").unwrap();
    let reports = fim::check_all(&cfg, &store, None).unwrap();
    assert_eq!(reports[0].status, CheckStatus::Secure);

    // nothing was written back: store still carries t0
    assert_eq!(store.load().unwrap()[0].last_verified, t0);
}

#[test]
fn unreadable_file_does_not_abort_pass() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (cfg, store) = test_config(&root);

    let gone = root.join("gone.txt");
    let kept = root.join("kept.txt");
    fs::write(&gone, "ephemeral").unwrap();
    fs::write(&kept, "hello").unwrap();
    fim::register(&cfg, &store, &gone).unwrap();
    fim::register(&cfg, &store, &kept).unwrap();

    fs::remove_file(&gone).unwrap();

    let reports = fim::check_all(&cfg, &store, None).unwrap();
    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].status, CheckStatus::Unreadable { .. }));
    assert_eq!(reports[1].status, CheckStatus::Secure);
}

#[test]
fn empty_baseline_checks_nothing() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (cfg, store) = test_config(&root);
    fs::write(store.path(), "").unwrap();

    let reports = fim::check_all(&cfg, &store, None).unwrap();
    assert!(reports.is_empty());
}

#[test]
fn missing_store_is_fatal_for_a_pass() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (cfg, store) = test_config(&root);

    assert!(fim::check_all(&cfg, &store, None).is_err());
}

#[test]
fn duplicate_registration_checks_latest_digest_once() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (cfg, store) = test_config(&root);

    let file = root.join("a.txt");
    fs::write(&file, "hello").unwrap();
    fim::register(&cfg, &store, &file).unwrap();

    fs::write(&file, "hello!").unwrap();
    fim::register(&cfg, &store, &file).unwrap();

    // two rows persisted, one check against the later digest
    assert_eq!(store.load().unwrap().len(), 2);
    let reports = fim::check_all(&cfg, &store, None).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, CheckStatus::Secure);
}

#[test]
fn persist_timestamps_rewrites_only_on_success() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (mut cfg, store) = test_config(&root);
    cfg.persist_timestamps = true;

    let clean = root.join("clean.txt");
    let drifted = root.join("drifted.txt");
    fs::write(&clean, "hello").unwrap();
    fs::write(&drifted, "hello").unwrap();
    fim::register(&cfg, &store, &clean).unwrap();
    fim::register(&cfg, &store, &drifted).unwrap();
    let t0: Vec<String> = store
        .load()
        .unwrap()
        .into_iter()
        .map(|r| r.last_verified)
        .collect();

    fs::write(&drifted, "hello!").unwrap();
    fim::check_all(&cfg, &store, None).unwrap();

    let rows = store.load().unwrap();
    assert_eq!(rows.len(), 2);
    // mismatching record keeps its stored timestamp byte-for-byte
    assert_eq!(rows[1].last_verified, t0[1]);
    // digests are never touched by a pass
    assert_eq!(rows[0].digest, SHA_HELLO);
    assert_eq!(rows[1].digest, SHA_HELLO);
}

#[test]
fn check_pass_emits_jsonl_audit() {
    let dir = tempdir().unwrap();
    let root = canon_root(&dir);
    let (cfg, store) = test_config(&root);

    let ok = root.join("ok.txt");
    let bad = root.join("bad.txt");
    let gone = root.join("gone.txt");
    fs::write(&ok, "hello").unwrap();
    fs::write(&bad, "hello").unwrap();
    fs::write(&gone, "hello").unwrap();
    for p in [&ok, &bad, &gone] {
        fim::register(&cfg, &store, p).unwrap();
    }
    fs::write(&bad, "hello!").unwrap();
    fs::remove_file(&gone).unwrap();

    let jsonl = root.join("audit.jsonl");
    fim::check_all(&cfg, &store, Some(jsonl.as_path())).unwrap();

    let content = fs::read_to_string(&jsonl).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.contains("\"kind\":\"secure\""));
    assert!(content.contains("\"kind\":\"not_secure\""));
    assert!(content.contains("\"kind\":\"unreadable\""));
}
