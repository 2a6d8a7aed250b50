//! Accept-mode scenarios against in-memory and on-disk stores

use std::fs;
use std::path::{Path, PathBuf};

use golden::matcher::find_rewrite_targets;
use golden::rewrite::quote;
use golden::syntax::SourceDocument;
use golden::{
    AcceptError, CallSite, Disambiguation, Dispatcher, FlushPolicy, FsStore, GoldenConfig,
    MemoryStore, Mode, Outcome, RewriteError,
};

const PATH: &str = "/work/golden/tests/demo.rs";

const DEMO: &str = r#"use golden::expect;

fn upper(s: &str) -> String {
    s.to_uppercase()
}

#[test]
fn first() {
    expect("first", upper, "FIRST");
}

#[test]
fn second() {
    expect("SECOND", upper, "wrong");
}
"#;

fn config(disambiguation: Disambiguation, flush: FlushPolicy) -> GoldenConfig {
    let mut config = GoldenConfig::default();
    config.matcher.disambiguation = disambiguation;
    config.rewrite.flush = flush;
    config
}

fn accepting(source: &str) -> Dispatcher<MemoryStore> {
    Dispatcher::with_store(
        Mode::Accept,
        &GoldenConfig::default(),
        MemoryStore::new().with_file(PATH, source),
    )
}

/// Text of the literal the matcher would rewrite for `site`
fn expected_literal(source: &str, line: usize) -> String {
    let document = SourceDocument::parse(PATH, source.to_string()).unwrap();
    let site = CallSite::new(PATH, line, 1);
    let targets = find_rewrite_targets(&document, &site, "expect", Disambiguation::Column).unwrap();
    document.source()[targets[0].range.span.clone()].to_string()
}

#[test]
fn accepting_rewrites_only_the_failing_literal() {
    let d = accepting(DEMO);
    let outcome = d.accept_at(CallSite::new(PATH, 14, 5), "expect", "SECOND").unwrap();

    assert_eq!(
        outcome,
        Outcome::Accepted {
            site: CallSite::new(PATH, 14, 5),
            rewrites: 1
        }
    );
    assert_eq!(
        d.store().get(PATH).unwrap(),
        DEMO.replace(r#"upper, "wrong")"#, r#"upper, "SECOND")"#)
    );
}

#[test]
fn accepted_literal_round_trips() {
    let d = accepting(DEMO);
    let actual = "multi\nline \"quoted\" value";
    d.accept_at(CallSite::new(PATH, 14, 5), "expect", actual).unwrap();

    let rewritten = d.store().get(PATH).unwrap();
    assert_eq!(expected_literal(&rewritten, 14), quote(actual));
}

#[test]
fn accepting_twice_writes_once() {
    let d = accepting(DEMO);
    let site = CallSite::new(PATH, 14, 5);

    d.accept_at(site.clone(), "expect", "SECOND").unwrap();
    d.accept_at(site, "expect", "SECOND").unwrap();

    assert_eq!(d.store().write_count(), 1);
}

#[test]
fn non_literal_expected_value_is_not_touched() {
    let source = "fn t() {\n    let e = \"x\";\n    expect(\"x\", upper, e);\n}\n";
    let d = accepting(source);

    let err = d
        .accept_at(CallSite::new(PATH, 3, 5), "expect", "X")
        .unwrap_err();

    assert_eq!(
        err,
        AcceptError::Rewrite(RewriteError::NotRewritable {
            callee: "expect".to_string(),
            line: 3,
            kind: Some(golden::syntax::SyntaxKind::Identifier),
        })
    );
    assert_eq!(d.store().write_count(), 0);
    assert_eq!(d.store().get(PATH).unwrap(), source);
}

#[test]
fn unbalanced_source_is_a_parse_error() {
    let d = accepting("fn t() {\n    expect(1, f, \"x\");\n");
    let err = d
        .accept_at(CallSite::new(PATH, 2, 5), "expect", "y")
        .unwrap_err();

    assert!(matches!(
        err,
        AcceptError::Rewrite(RewriteError::Parse { .. })
    ));
    assert_eq!(d.store().write_count(), 0);
}

#[test]
fn wrong_line_finds_no_call() {
    let d = accepting(DEMO);
    let err = d
        .accept_at(CallSite::new(PATH, 13, 1), "expect", "SECOND")
        .unwrap_err();

    assert!(matches!(
        err,
        AcceptError::Rewrite(RewriteError::NoCallFound { line: 13, .. })
    ));
}

#[test]
fn line_mode_rewrites_every_call_on_the_line() {
    let source = "expect(1, f, \"a\"); expect(2, f, \"b\");\n";
    let d = Dispatcher::with_store(
        Mode::Accept,
        &config(Disambiguation::Line, FlushPolicy::Immediate),
        MemoryStore::new().with_file(PATH, source),
    );

    let outcome = d.accept_at(CallSite::new(PATH, 1, 20), "expect", "z").unwrap();

    assert!(matches!(outcome, Outcome::Accepted { rewrites: 2, .. }));
    assert_eq!(
        d.store().get(PATH).unwrap(),
        "expect(1, f, \"z\"); expect(2, f, \"z\");\n"
    );
}

#[test]
fn column_mode_rewrites_the_asserting_call() {
    let source = "expect(1, f, \"a\"); expect(2, f, \"b\");\n";
    let d = accepting(source);

    d.accept_at(CallSite::new(PATH, 1, 20), "expect", "z").unwrap();

    assert_eq!(
        d.store().get(PATH).unwrap(),
        "expect(1, f, \"a\"); expect(2, f, \"z\");\n"
    );
}

#[test]
fn dropping_a_deferred_dispatcher_saves_pending_rewrites() {
    let store = MemoryStore::new().with_file(PATH, DEMO);
    {
        let d = Dispatcher::with_store(
            Mode::Accept,
            &config(Disambiguation::Column, FlushPolicy::Deferred),
            &store,
        );
        let outcome = d.accept_at(CallSite::new(PATH, 14, 5), "expect", "SECOND").unwrap();
        assert_eq!(
            outcome,
            Outcome::Deferred {
                site: CallSite::new(PATH, 14, 5)
            }
        );
        assert_eq!(store.write_count(), 0);
    }

    assert_eq!(store.write_count(), 1);
    assert_eq!(
        store.get(PATH).unwrap(),
        DEMO.replace(r#"upper, "wrong")"#, r#"upper, "SECOND")"#)
    );
}

#[test]
fn deferred_rewrites_across_files() {
    let other = "/work/golden/tests/other.rs";
    let store = MemoryStore::new()
        .with_file(PATH, DEMO)
        .with_file(other, "expect(0, f, \"\");\n");
    let d = Dispatcher::with_store(
        Mode::Accept,
        &config(Disambiguation::Column, FlushPolicy::Deferred),
        &store,
    );

    d.accept_at(CallSite::new(PATH, 14, 5), "expect", "SECOND").unwrap();
    d.accept_at(CallSite::new(other, 1, 1), "expect", "0").unwrap();
    assert_eq!(d.flush(), Ok(2));

    assert_eq!(store.write_count(), 2);
    assert_eq!(store.get(other).unwrap(), "expect(0, f, \"0\");\n");
}

#[test]
fn file_system_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("demo.rs");
    fs::write(&path, DEMO).unwrap();

    let d = Dispatcher::with_store(Mode::Accept, &GoldenConfig::default(), FsStore);
    d.accept_at(CallSite::new(&path, 14, 5), "expect", "SECOND").unwrap();

    let rewritten = fs::read_to_string(&path).unwrap();
    assert_eq!(
        rewritten,
        DEMO.replace(r#"upper, "wrong")"#, r#"upper, "SECOND")"#)
    );
    assert_eq!(expected_literal(&rewritten, 14), "\"SECOND\"");
}

#[test]
fn missing_relative_file_is_a_locate_error() {
    let d = accepting(DEMO);
    let err = d
        .accept_at(
            CallSite::new(Path::new("tests/does_not_exist.rs"), 1, 1),
            "expect",
            "x",
        )
        .unwrap_err();

    assert!(matches!(
        err,
        AcceptError::Locate(golden::LocateError::SourceNotFound { .. })
    ));
}

#[test]
fn turbofish_call_is_rewritten() {
    let source = "fn t() {\n    golden::expect::<&str, _>(\"x\", upper, \"old\");\n}\n";
    let d = accepting(source);

    d.accept_at(CallSite::new(PATH, 2, 5), "expect", "X").unwrap();

    assert_eq!(
        d.store().get(PATH).unwrap(),
        source.replace("\"old\"", "\"X\"")
    );
}
