use std::error;
use std::fs;

use bibdoc::{Document, Entry, Error, ErrorClass, ParseErrorKind, Policy};

type TestResult = Result<(), Box<dyn error::Error>>;

const ONE_GOOD_ONE_BAD: &str = "@T{K, f={v}}\n@T{L, f {v}}\n";

fn load(policy: Policy, src: &str) -> Result<(Document, bool), Error> {
    let mut doc = Document::new(policy);
    let clean = doc.load_str(src)?;
    Ok((doc, clean))
}

fn summary(doc: &Document) -> Vec<(String, String, Vec<(String, String)>)> {
    doc.iter()
        .map(|entry| {
            let fields = entry
                .fields()
                .iter()
                .map(|(n, d)| (n.to_string(), d.to_string()))
                .collect();
            (entry.type_name().to_string(), entry.key().to_string(), fields)
        })
        .collect()
}

#[test]
fn no_entries() -> TestResult {
    for src in ["", "   \n\n", "just some text, with = signs # and (parens)\n"] {
        let (doc, clean) = load(Policy::StopOnFirstError, src)?;
        assert!(clean);
        assert!(doc.is_empty());
        assert!(doc.symbols().is_empty());
    }
    Ok(())
}

#[test]
fn single_entry() -> TestResult {
    let (doc, clean) = load(Policy::StopOnFirstError, "@T{K, f={v}}")?;
    assert!(clean);
    assert_eq!(
        summary(&doc),
        [("T".to_string(), "K".to_string(), vec![("f".to_string(), "v".to_string())])]
    );
    Ok(())
}

#[test]
fn structural_round_trip() -> TestResult {
    let src = r#"
Leading comment.
@string{ed = "2nd"}
@Book{DBLP:books/aw/Knuth73a,
    Author    = {Donald E. Knuth},
    title     = {The Art of Computer Programming, Volume {I:} Fundamental Algorithms,
                 } # ed,
    edition   = ed # " edition",
    year      = 1973,
    url       = {https://www.worldcat.org/oclc/310903895},
}
@misc(plain)
@article{q, note = "quoted {with} \"escapes\" and, commas"}
"#;
    let (first, clean) = load(Policy::IgnoreParseErrors, src)?;
    // `{...} # ed` is not a valid concatenation
    assert!(!clean);
    assert_eq!(first.len(), 2);

    let src = src.replace("} # ed", "}");
    let (first, clean) = load(Policy::StopOnFirstError, &src)?;
    assert!(clean);
    assert_eq!(first.len(), 3);
    assert_eq!(first.entries()[0].field("edition"), Some("2nd edition"));

    let mut saved = Vec::new();
    first.save(&mut saved)?;
    let mut second = Document::default();
    assert!(second.load(saved.as_slice())?);
    assert_eq!(summary(&first), summary(&second));
    Ok(())
}

fn reloaded(doc: &Document) -> Result<Document, Error> {
    let mut saved = Vec::new();
    doc.save(&mut saved)?;
    let mut again = Document::default();
    again.load(saved.as_slice())?;
    Ok(again)
}

#[test]
fn quoted_values_round_trip() -> TestResult {
    let src = r#"@T{K, f = " a ", g = "x" # " y ", h = "a \{b\} c", i = "say \"hi\""}"#;
    let (doc, clean) = load(Policy::StopOnFirstError, src)?;
    assert!(clean);
    let entry = &doc.entries()[0];
    assert_eq!(entry.field("f"), Some("a"));
    assert_eq!(entry.field("g"), Some("x y"));
    assert_eq!(entry.field("h"), Some(r"a \{b\} c"));
    assert_eq!(entry.field("i"), Some(r#"say \"hi\""#));

    let again = reloaded(&doc)?;
    assert!(again.diagnostics().is_empty());
    assert_eq!(summary(&doc), summary(&again));
    Ok(())
}

#[test]
fn backslash_before_brace_is_not_an_escape() -> TestResult {
    for policy in [Policy::StopOnFirstError, Policy::IgnoreParseErrors] {
        let (doc, clean) = load(policy, "@T{A, f = \"x \\} y\"}\n@T{B, f = {ok}}\n")?;
        assert!(!clean);
        assert_eq!(doc.diagnostics()[0].kind, ParseErrorKind::StrayClosingBrace);
        assert_eq!((doc.diagnostics()[0].line, doc.diagnostics()[0].column), (1, 15));

        let (doc, clean) = load(policy, "@T{A, f = \"a \\{ b\"}\n")?;
        assert!(!clean);
        assert!(doc.is_empty());
        assert!(matches!(doc.diagnostics()[0].kind, ParseErrorKind::UnterminatedValue { .. }));
    }

    let (doc, _) = load(Policy::IgnoreParseErrors, "@T{A, f = \"x \\} y\"}\n@T{B, f = {ok}}\n")?;
    assert_eq!(doc.len(), 1);
    assert_eq!(summary(&reloaded(&doc)?), summary(&doc));
    Ok(())
}

#[test]
fn symbol_substitution() -> TestResult {
    let (doc, _) = load(
        Policy::StopOnFirstError,
        r#"@STRING{w="World"} @T{K, greet = "Hello " # w}"#,
    )?;
    assert_eq!(doc.entries()[0].field("greet"), Some("Hello World"));
    Ok(())
}

#[test]
fn symbol_names_are_case_sensitive_field_names_are_not() -> TestResult {
    let (doc, _) = load(
        Policy::IgnoreParseErrors,
        r#"@STRING{W="World"} @T{K, Greet = "Hello " # W} @T{L, greet = "Hello " # w}"#,
    )?;
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.entries()[0].field("greet"), Some("Hello World"));
    assert_eq!(doc.entries()[0].fields().iter().next(), Some(("greet", "Hello World")));
    assert_eq!(doc.diagnostics().len(), 1);
    assert_eq!(doc.symbols().get("w"), None);
    Ok(())
}

#[test]
fn bare_values_and_symbols() -> TestResult {
    let (doc, _) = load(
        Policy::StopOnFirstError,
        "@string{mar = \"March\"}\n@T{K, year = 2001, month = mar, day = tue}",
    )?;
    let entry = &doc.entries()[0];
    assert_eq!(entry.field("year"), Some("2001"));
    assert_eq!(entry.field("month"), Some("March"));
    assert_eq!(entry.field("day"), Some("tue"));
    Ok(())
}

#[test]
fn nested_braces() -> TestResult {
    let (doc, _) = load(Policy::StopOnFirstError, "@T{K, f={a{b}c}}")?;
    assert_eq!(doc.entries()[0].field("f"), Some("a{b}c"));
    Ok(())
}

#[test]
fn stop_on_first_error() -> TestResult {
    let (doc, clean) = load(Policy::StopOnFirstError, ONE_GOOD_ONE_BAD)?;
    assert!(!clean);
    assert_eq!(doc.diagnostics().len(), 1);
    assert!(doc.is_empty());
    Ok(())
}

#[test]
fn ignore_parse_errors() -> TestResult {
    let (doc, clean) = load(Policy::IgnoreParseErrors, ONE_GOOD_ONE_BAD)?;
    assert!(!clean);
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.diagnostics().len(), 1);
    let err = &doc.diagnostics()[0];
    assert_eq!(err.class(), ErrorClass::Grammar);
    assert_eq!((err.line, err.column), (2, 9));
    Ok(())
}

#[test]
fn unbalanced_braces() -> TestResult {
    for policy in [Policy::StopOnFirstError, Policy::IgnoreParseErrors] {
        let (doc, clean) = load(policy, "@T{K, f={a}")?;
        assert!(!clean);
        assert_eq!(doc.diagnostics().len(), 1);
        assert_eq!(doc.diagnostics()[0].class(), ErrorClass::Lexical);
        assert_eq!(doc.diagnostics()[0].kind, ParseErrorKind::UnbalancedDelimiters);

        let (doc, _) = load(policy, "@T{K, f={a")?;
        assert_eq!(doc.diagnostics()[0].class(), ErrorClass::Lexical);
        assert!(matches!(doc.diagnostics()[0].kind, ParseErrorKind::UnterminatedValue { .. }));
    }
    Ok(())
}

#[test]
fn recovers_after_stray_brace() -> TestResult {
    let (doc, _) = load(
        Policy::IgnoreParseErrors,
        "@T{A, f = \"x } y\"}\n@T{B, f = {ok}}\n",
    )?;
    assert_eq!(doc.diagnostics()[0].kind, ParseErrorKind::StrayClosingBrace);
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.entries()[0].key(), "B");
    Ok(())
}

#[test]
fn last_write_wins() -> TestResult {
    let (doc, _) = load(Policy::StopOnFirstError, "@T{K, f={1}, f={2}}")?;
    assert_eq!(doc.entries()[0].field("f"), Some("2"));
    Ok(())
}

#[test]
fn out_of_range_mutation() -> TestResult {
    let (mut doc, _) = load(Policy::StopOnFirstError, "@T{K}")?;
    let before = summary(&doc);
    assert!(matches!(
        doc.insert(5, Entry::new("T", "X")?),
        Err(Error::IndexOutOfRange { index: 5, len: 1 })
    ));
    assert!(matches!(doc.remove_at(1), Err(Error::IndexOutOfRange { .. })));
    assert_eq!(summary(&doc), before);
    Ok(())
}

#[test]
fn files() -> TestResult {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.bib");
    let output = dir.path().join("out.bib");
    fs::write(&input, "@book{tolkien1937, author = {J. R. R. Tolkien}}")?;

    let mut doc = Document::default();
    assert!(doc.load_file(&input)?);
    doc.get_mut(0).unwrap().set_field("Title", "The Hobbit");
    let mut added = Entry::new("misc", "x")?;
    added.set_field("note", "");
    doc.add(added);
    doc.save_file(&output)?;

    assert_eq!(
        fs::read_to_string(&output)?,
        concat!(
            "@book{tolkien1937,\n  author = {J. R. R. Tolkien},\n  title = {The Hobbit}\n}\n\n",
            "@misc{x,\n  note = {}\n}\n\n",
        )
    );

    assert!(matches!(doc.load_file(dir.path().join("missing.bib")), Err(Error::Io(_))));
    assert_eq!(doc.len(), 2);
    Ok(())
}

#[cfg(feature = "serde")]
#[test]
fn serialize() -> TestResult {
    let (doc, _) = load(Policy::IgnoreParseErrors, "@T{K, b={2}, a={1}}\n@T{bad key}")?;
    let json = serde_json::to_value(&doc.entries()[0])?;
    assert_eq!(
        json,
        serde_json::json!({"type_name": "T", "key": "K", "fields": {"b": "2", "a": "1"}})
    );
    let err = serde_json::to_value(&doc.diagnostics()[0])?;
    assert_eq!(err["line"], 2);
    Ok(())
}
