use super::*;

#[test]
fn ensure_parent_dir_creates_missing_ancestors() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("a").join("b").join("out.png");
    ensure_parent_dir(&file).unwrap();
    assert!(tmp.path().join("a").join("b").is_dir());
    assert!(!file.exists());
}

#[test]
fn ensure_parent_dir_accepts_bare_file_names() {
    ensure_parent_dir(Path::new("out.png")).unwrap();
}
