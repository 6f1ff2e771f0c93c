// tests/integration/path_test.rs

//! Tests for the path expression parser.

use subdocd::core::SubdocError;
use subdocd::core::subdoc::{MAX_SUBDOC_PATH_COMPONENTS, Path, PathComponent};

fn key(k: &str) -> PathComponent {
    PathComponent::Key(k.to_string())
}

#[test]
fn test_parse_empty_is_root() {
    let path = Path::parse("").unwrap();
    assert!(path.is_root());
    assert_eq!(path.len(), 0);
}

#[test]
fn test_parse_nested_keys_and_indexes() {
    let path = Path::parse("a.b[0][-1].c").unwrap();
    assert_eq!(
        path.components(),
        &[
            key("a"),
            key("b"),
            PathComponent::Index(0),
            PathComponent::Last,
            key("c")
        ]
    );
}

#[test]
fn test_parse_leading_index() {
    let path = Path::parse("[2].x").unwrap();
    assert_eq!(path.components(), &[PathComponent::Index(2), key("x")]);
}

#[test]
fn test_parse_quoted_keys() {
    let path = Path::parse("`a.b`.`c[0]`").unwrap();
    assert_eq!(path.components(), &[key("a.b"), key("c[0]")]);

    let path = Path::parse("`tick``tock`").unwrap();
    assert_eq!(path.components(), &[key("tick`tock")]);
}

#[test]
fn test_parse_rejects_negative_index_other_than_last() {
    let err = Path::parse("a[-2]").unwrap_err();
    assert!(matches!(err, SubdocError::PathInvalid(_)));
}

#[test]
fn test_parse_rejects_malformed_paths() {
    for bad in [".a", "a..b", "a.", "a[", "a[x]", "a[]", "a]b", "`open", "a`b"] {
        let err = Path::parse(bad).unwrap_err();
        assert!(
            matches!(err, SubdocError::PathInvalid(_)),
            "{bad:?} gave {err:?}"
        );
    }
}

#[test]
fn test_parse_rejects_junk_after_index() {
    let err = Path::parse("a[0]b").unwrap_err();
    assert!(matches!(err, SubdocError::PathInvalid(_)));
}

#[test]
fn test_component_limit_is_a_request_error() {
    let at_limit = vec!["k"; MAX_SUBDOC_PATH_COMPONENTS].join(".");
    assert_eq!(
        Path::parse(&at_limit).unwrap().len(),
        MAX_SUBDOC_PATH_COMPONENTS
    );

    let over_limit = vec!["k"; MAX_SUBDOC_PATH_COMPONENTS + 1].join(".");
    let err = Path::parse(&over_limit).unwrap_err();
    assert!(matches!(err, SubdocError::InvalidArguments(_)));
}

#[test]
fn test_display_quotes_when_needed() {
    let path = Path::new(vec![
        key("plain"),
        key("with.dot"),
        PathComponent::Index(3),
        PathComponent::Last,
        key("back`tick"),
    ]);
    let text = path.to_string();
    assert_eq!(text, "plain.`with.dot`[3][-1].`back``tick`");
    assert_eq!(text.parse::<Path>().unwrap(), path);
}
