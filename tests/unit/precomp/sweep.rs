use super::*;

fn entry(root: &Path, comp: &str, key: &str) -> PathBuf {
    let dir = root.join(PASS1_DIR).join(comp).join(key);
    std::fs::create_dir_all(dir.join("frames")).unwrap();
    std::fs::write(dir.join("metadata.json"), "{}").unwrap();
    dir
}

#[test]
fn missing_pass1_root_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    let out = clean_precomp_cache(&CleanOptions::new(tmp.path())).unwrap();
    assert_eq!(out, CleanResult::default());
}

#[test]
fn fresh_entries_survive() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = entry(tmp.path(), "Main", "pc_a");
    let out = clean_precomp_cache(&CleanOptions::new(tmp.path())).unwrap();
    assert_eq!(out.scanned_cache_directories, 1);
    assert!(out.deleted_paths.is_empty());
    assert!(dir.exists());
}

#[test]
fn entries_older_than_retention_are_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    let a = entry(tmp.path(), "Main", "pc_a");
    let b = entry(tmp.path(), "Intro", "pc_b");

    let opts = CleanOptions {
        retention_days: Some(3),
        now: Some(SystemTime::now() + Duration::from_secs(4 * 24 * 60 * 60)),
        ..CleanOptions::new(tmp.path())
    };
    let out = clean_precomp_cache(&opts).unwrap();
    assert_eq!(out.scanned_cache_directories, 2);
    assert_eq!(out.deleted_paths, vec![b.clone(), a.clone()]);
    assert!(!a.exists() && !b.exists());
}

#[test]
fn final_tree_is_not_swept() {
    let tmp = tempfile::tempdir().unwrap();
    let final_entry = tmp.path().join("final").join("Main").join("pc_a");
    std::fs::create_dir_all(&final_entry).unwrap();
    entry(tmp.path(), "Main", "pc_a");

    let opts = CleanOptions {
        retention_days: Some(0),
        now: Some(SystemTime::now() + Duration::from_secs(60)),
        ..CleanOptions::new(tmp.path())
    };
    let out = clean_precomp_cache(&opts).unwrap();
    assert_eq!(out.deleted_paths.len(), 1);
    assert!(final_entry.exists());
}

#[test]
fn stray_files_at_entry_depth_are_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let comp_dir = tmp.path().join(PASS1_DIR).join("Main");
    std::fs::create_dir_all(&comp_dir).unwrap();
    std::fs::write(comp_dir.join("README"), "x").unwrap();
    let out = clean_precomp_cache(&CleanOptions::new(tmp.path())).unwrap();
    assert_eq!(out.scanned_cache_directories, 0);
}
