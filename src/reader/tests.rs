use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn reads_and_trims_text_file() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("doc.txt");
    fs::write(&path, "\n\n  The first sentence. The second one.  \n\n").expect("should write");

    let text = TextReader::default()
        .read_text(path.to_str().expect("utf-8 path"))
        .expect("should read file");
    assert_eq!(text, "The first sentence. The second one.");
}

#[test]
fn whitespace_only_file_reads_as_empty() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("blank.txt");
    fs::write(&path, " \n\t\n   ").expect("should write");

    let text = TextReader::default()
        .read_text(path.to_str().expect("utf-8 path"))
        .expect("should read file");
    assert!(text.is_empty());
}

#[test]
fn binary_file_reads_as_empty() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("image.bin");
    fs::write(&path, [0x89_u8, b'P', b'N', b'G', 0, 0, 0, 13]).expect("should write");

    let text = TextReader::default()
        .read_text(path.to_str().expect("utf-8 path"))
        .expect("should read file");
    assert!(text.is_empty());
}

#[test]
fn invalid_utf8_is_replaced() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("latin1.txt");
    fs::write(&path, b"caf\xe9 au lait").expect("should write");

    let text = TextReader::default()
        .read_text(path.to_str().expect("utf-8 path"))
        .expect("should read file");
    assert_eq!(text, "caf\u{fffd} au lait");
}

#[test]
fn html_file_is_reduced_to_text() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("page.HTML");
    fs::write(
        &path,
        "<html><head><title>Ignored</title></head><body><h1>Prize</h1><p>Ana won.</p></body></html>",
    )
    .expect("should write");

    let text = TextReader::default()
        .read_text(path.to_str().expect("utf-8 path"))
        .expect("should read file");
    assert_eq!(text, "Prize\nAna won.");
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("nope.txt");

    let error = TextReader::default()
        .read_text(path.to_str().expect("utf-8 path"))
        .expect_err("missing file should fail");
    assert!(error.to_string().contains("Failed to read file"));
}

#[test]
fn html_to_text_drops_invisible_content() {
    let html = r#"<!DOCTYPE html>
<html>
  <head><style>body { color: red; }</style></head>
  <body>
    <script>var x = 1;</script>
    <noscript>Enable JavaScript</noscript>
    <div>First   block</div>
    <p>Second <b>bold</b> block<br>next line</p>
    <ul><li>one</li><li>two</li></ul>
  </body>
</html>"#;

    assert_eq!(
        html_to_text(html),
        "First block\nSecond bold block\nnext line\none\ntwo"
    );
}

#[test]
fn url_detection() {
    assert!(is_url("http://example.com/doc.txt"));
    assert!(is_url("HTTPS://example.com"));
    assert!(!is_url("docs/http.txt"));
    assert!(!is_url("ftp://example.com/file"));
    assert!(!is_url("http"));
}

#[test]
fn html_sniffing() {
    assert!(looks_like_html("  <!DOCTYPE html><html></html>"));
    assert!(looks_like_html("<HTML><body>x</body></HTML>"));
    assert!(!looks_like_html("plain text with <b>tags</b>"));
}
