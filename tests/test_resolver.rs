use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use lantern::content::{DocumentRoot, ResolveError};
use lantern::http::response::{Outcome, StatusCode};

fn write_file(dir: &Path, name: &str, contents: &[u8], mode: u32) {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
}

fn status_of(result: Result<lantern::content::MappedFile, ResolveError>) -> StatusCode {
    match result {
        Ok(file) => Outcome::File(file).status(),
        Err(e) => Outcome::from(e).status(),
    }
}

#[test]
fn test_maps_readable_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "index.html", b"<h1>hello</h1>", 0o644);

    let root = DocumentRoot::new(dir.path());
    let file = root.open("/index.html").unwrap();

    assert_eq!(file.len(), 14);
    assert_eq!(file.as_bytes(), b"<h1>hello</h1>");
    assert_eq!(file.path(), dir.path().join("index.html"));
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = DocumentRoot::new(dir.path());

    let result = root.open("/nope.html");
    assert!(matches!(result, Err(ResolveError::NotFound(_))));
    assert_eq!(status_of(root.open("/nope.html")), StatusCode::NotFound);
}

#[test]
fn test_private_file_is_forbidden() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "secret.html", b"secret", 0o640);

    let root = DocumentRoot::new(dir.path());
    assert!(matches!(
        root.open("/secret.html"),
        Err(ResolveError::Forbidden(_))
    ));
    assert_eq!(status_of(root.open("/secret.html")), StatusCode::Forbidden);
}

#[test]
fn test_directory_is_bad_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sub = dir.path().join("docs");
    fs::create_dir(&sub).unwrap();
    fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();

    let root = DocumentRoot::new(dir.path());
    assert!(matches!(root.open("/docs"), Err(ResolveError::Directory(_))));
    assert_eq!(status_of(root.open("/docs")), StatusCode::BadRequest);
}

#[test]
fn test_traversal_is_forbidden() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inner = dir.path().join("www");
    fs::create_dir(&inner).unwrap();
    write_file(dir.path(), "outside.html", b"outside", 0o644);

    let root = DocumentRoot::new(&inner);
    assert!(matches!(
        root.open("/../outside.html"),
        Err(ResolveError::Traversal(_))
    ));
    assert_eq!(status_of(root.open("/../outside.html")), StatusCode::Forbidden);
}

#[test]
fn test_empty_file_maps_to_empty_body() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "empty.html", b"", 0o644);

    let file = DocumentRoot::new(dir.path()).open("/empty.html").unwrap();
    assert!(file.is_empty());
    assert_eq!(file.as_bytes(), b"");
}

#[test]
fn test_nested_paths_resolve_below_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("a")).unwrap();
    write_file(&dir.path().join("a"), "b.html", b"nested", 0o644);

    let file = DocumentRoot::new(dir.path()).open("/a/b.html").unwrap();
    assert_eq!(file.as_bytes(), b"nested");
}
