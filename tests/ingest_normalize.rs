// tests/ingest_normalize.rs
use it_newsfeed::ingest::{normalize_item, normalize_text, MAX_TEXT_CHARS};
use it_newsfeed::NewsItem;

#[test]
fn empty_is_ok() {
    assert_eq!(normalize_text(""), "");
}

#[test]
fn strips_html_and_unescapes() {
    let s = "<p>Hello&nbsp;<b>world</b> &ldquo;ok&rdquo;</p>";
    let n = normalize_text(s);
    assert_eq!(n, r#"Hello world "ok""#);
}

#[test]
fn folds_whitespace_and_nbsp() {
    let s = "A\u{00A0}\n\tB   C";
    assert_eq!(normalize_text(s), "A B C");
}

#[test]
fn length_cap_applies() {
    let s = "x".repeat(2_000);
    assert_eq!(normalize_text(&s).chars().count(), MAX_TEXT_CHARS);
}

#[test]
fn normalize_item_cleans_title_and_body_only() {
    let ts = chrono::Utc::now();
    let it = NewsItem::new("id-1", " arstechnica ", "<b>Patch</b>&nbsp;Tuesday", "<p>Fixes</p>", ts);
    let n = normalize_item(it);
    assert_eq!(n.id, "id-1");
    assert_eq!(n.source, "arstechnica");
    assert_eq!(n.title, "Patch Tuesday");
    assert_eq!(n.body, "Fixes");
}
