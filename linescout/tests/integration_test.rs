use anyhow::Result;
use linescout::{
    search, ContentIndex, EncodingMode, IndexOptions, SearchError, SearchOptions, SearchOutput,
};
use std::fs::{self, File};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(file, "Line {} in file {}: TODO implement this", j, i)?;
            writeln!(file, "Another line {} in file {}: nothing special", j, i)?;
            writeln!(file, "FIXME: This is a bug in file {} line {}", i, j)?;
        }
    }
    Ok(())
}

fn foo_bar_fixture(dir: &Path) -> Result<()> {
    fs::write(dir.join("a.txt"), "foo\nbar\nfoo")?;
    fs::write(dir.join("b.txt"), "baz")?;
    Ok(())
}

/// Comparable view of an output, independent of cross-file ordering
fn summarize(output: &SearchOutput) -> Vec<(String, usize, String, Vec<String>)> {
    let mut rows: Vec<_> = output
        .matches
        .iter()
        .map(|m| {
            (
                m.path.to_string_lossy().into_owned(),
                m.line_number,
                m.line_content.clone(),
                m.context.iter().map(|c| c.text.clone()).collect(),
            )
        })
        .collect();
    rows.sort();
    rows
}

#[test]
fn test_literal_search_with_context() -> Result<()> {
    let dir = tempdir()?;
    foo_bar_fixture(dir.path())?;

    let options = SearchOptions::new("foo", [dir.path()]).context(1).limit(10);
    let result = search(&options)?;

    let rows = summarize(&result);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].0.ends_with("a.txt"));
    assert_eq!((rows[0].1, rows[0].3.clone()), (1, vec!["bar".to_string()]));
    assert_eq!((rows[1].1, rows[1].3.clone()), (3, vec!["bar".to_string()]));
    assert!(result.errors.is_empty());
    assert!(!result.cap_reached);
    assert_eq!(result.files_searched, 2);
    Ok(())
}

#[test]
fn test_case_insensitive_matches_same_lines() -> Result<()> {
    let dir = tempdir()?;
    foo_bar_fixture(dir.path())?;

    let sensitive = search(&SearchOptions::new("foo", [dir.path()]).context(1))?;
    let insensitive = search(&SearchOptions::new("FOO", [dir.path()]).context(1).ignore_case())?;
    assert_eq!(summarize(&sensitive), summarize(&insensitive));

    let miss = search(&SearchOptions::new("FOO", [dir.path()]))?;
    assert!(miss.matches.is_empty());
    Ok(())
}

#[test]
fn test_invalid_regex_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    foo_bar_fixture(dir.path())?;

    let err = search(&SearchOptions::new("(", [dir.path()]).regex()).unwrap_err();
    assert!(matches!(err, SearchError::InvalidPattern(_)));

    // The same text is fine as a literal
    let literal = search(&SearchOptions::new("(", [dir.path()]))?;
    assert!(literal.matches.is_empty());
    Ok(())
}

#[test]
fn test_result_cap_bounds_overshoot() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("one.txt"), "hit")?;
    fs::write(dir.path().join("two.txt"), "hit")?;

    let options = SearchOptions::new("hit", [dir.path()])
        .limit(1)
        .workers(NonZeroUsize::new(8).unwrap());
    for _ in 0..20 {
        let result = search(&options)?;
        assert!(result.cap_reached);
        assert!((1..=8).contains(&result.total_matches()));
    }
    Ok(())
}

#[test]
fn test_large_cap_with_many_files() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 40, 50)?;

    let capped = search(&SearchOptions::new("TODO", [dir.path()]).limit(100))?;
    assert!(capped.cap_reached);
    assert!(capped.total_matches() >= 100);
    assert!(capped.total_matches() < 100 + 8 * 50);

    let all = search(&SearchOptions::new("TODO", [dir.path()]).limit(10_000))?;
    assert!(!all.cap_reached);
    assert_eq!(all.total_matches(), 40 * 50);
    assert_eq!(all.files_with_matches(), 40);
    Ok(())
}

#[test]
fn test_regex_pattern() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 10, 100)?;

    let options = SearchOptions::new(r"FIXME:.*bug.*line \d+", [dir.path()])
        .regex()
        .limit(usize::MAX);
    let result = search(&options)?;
    assert_eq!(result.total_matches(), 10 * 100);
    for m in &result.matches {
        assert!(m.matched_text().unwrap().starts_with("FIXME: This is a bug"));
    }
    Ok(())
}

#[test]
fn test_matches_ascend_within_each_file() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 8, 200)?;

    let result = search(&SearchOptions::new("TODO", [dir.path()]).limit(usize::MAX))?;
    for file in result.file_results() {
        let lines: Vec<usize> = file.matches.iter().map(|m| m.line_number).collect();
        assert!(lines.windows(2).all(|w| w[0] < w[1]), "{:?}", file.path);
    }
    Ok(())
}

#[test]
fn test_context_stays_inside_file() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("edge.txt"), "match first\nb\nc\nd\nmatch last")?;

    let result = search(&SearchOptions::new("match", [dir.path()]).context(3))?;
    let rows = summarize(&result);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].3, vec!["b", "c", "d"]);
    assert_eq!(rows[1].3, vec!["b", "c", "d"]);
    for m in &result.matches {
        assert!(m.context.len() <= 2 * 3);
        assert!(m.context.iter().all(|c| c.line_number != m.line_number));
        assert!(m.context.iter().all(|c| c.line_number >= 1 && c.line_number <= 5));
    }
    Ok(())
}

#[test]
fn test_max_depth_and_include_patterns() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("a/b"))?;
    fs::write(dir.path().join("top.rs"), "needle")?;
    fs::write(dir.path().join("top.txt"), "needle")?;
    fs::write(dir.path().join("a/mid.rs"), "needle")?;
    fs::write(dir.path().join("a/b/deep.rs"), "needle")?;

    let shallow = search(&SearchOptions::new("needle", [dir.path()]).depth(0))?;
    assert_eq!(shallow.files_with_matches(), 2);

    let rust_only = search(&SearchOptions::new("needle", [dir.path()]).depth(1).include("*.rs"))?;
    let mut names: Vec<_> = rust_only
        .matches
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["mid.rs", "top.rs"]);
    Ok(())
}

#[test]
fn test_repeated_search_is_stable() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 20, 30)?;

    let options = SearchOptions::new("FIXME", [dir.path()]).context(1).limit(usize::MAX);
    let first = summarize(&search(&options)?);
    for _ in 0..3 {
        assert_eq!(summarize(&search(&options)?), first);
    }
    Ok(())
}

#[test]
fn test_index_and_disk_agree() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 15, 40)?;
    fs::create_dir_all(dir.path().join("nested"))?;
    fs::write(dir.path().join("nested/extra.txt"), "todo lowercase\nTODO upper")?;

    let index = Arc::new(ContentIndex::new());
    index.rebuild(&IndexOptions {
        roots: vec![dir.path().to_path_buf()],
        ..Default::default()
    })?;

    for options in [
        SearchOptions::new("TODO", [dir.path()]).context(1),
        SearchOptions::new("todo", [dir.path()]).ignore_case().context(2),
        SearchOptions::new(r"bug in file \d+", [dir.path()]).regex(),
        SearchOptions::new("TODO", [dir.path()]).depth(0),
    ] {
        let options = options.limit(usize::MAX);
        let disk = search(&options)?;
        let memory = search(&options.clone().with_index(Arc::clone(&index)))?;
        assert!(!disk.used_index);
        assert!(memory.used_index);
        assert_eq!(summarize(&disk), summarize(&memory));
        assert_eq!(disk.files_searched, memory.files_searched);
    }
    Ok(())
}

#[test]
fn test_index_search_waits_for_background_rebuild() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 30, 20)?;

    let index = Arc::new(ContentIndex::new());
    let handle = index.spawn_rebuild(IndexOptions {
        roots: vec![dir.path().to_path_buf()],
        ..Default::default()
    })?;

    let options = SearchOptions::new("TODO", [dir.path()])
        .limit(usize::MAX)
        .with_index(Arc::clone(&index));
    let result = search(&options)?;
    assert_eq!(result.total_matches(), 30 * 20);

    let stats = handle.join().expect("indexer thread panicked")?;
    assert_eq!(stats.files_indexed, 30);
    Ok(())
}

#[test]
fn test_unreadable_file_is_partial_success() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("good.txt"), "foo")?;
    fs::write(dir.path().join("bad.txt"), b"foo \xff\xfe")?;

    let result = search(&SearchOptions::new("foo", [dir.path()]))?;
    assert_eq!(result.total_matches(), 1);
    assert!(result.is_partial());
    assert_eq!(result.skipped_files(), 1);
    assert!(matches!(result.errors[0], SearchError::EncodingError { .. }));

    let lossy = search(&SearchOptions::new("foo", [dir.path()]).encoding(EncodingMode::Lossy))?;
    assert_eq!(lossy.total_matches(), 2);
    assert!(!lossy.is_partial());
    Ok(())
}

#[test]
fn test_inaccessible_root_is_fatal() -> Result<()> {
    let dir = tempdir()?;
    foo_bar_fixture(dir.path())?;

    let options = SearchOptions::new("foo", [dir.path().to_path_buf(), dir.path().join("missing")]);
    let err = search(&options).unwrap_err();
    assert!(matches!(err, SearchError::RootInaccessible { .. }));
    Ok(())
}

#[test]
fn test_single_file_root() -> Result<()> {
    let dir = tempdir()?;
    foo_bar_fixture(dir.path())?;

    let result = search(&SearchOptions::new("foo", [dir.path().join("a.txt")]))?;
    assert_eq!(result.total_matches(), 2);
    assert_eq!(result.files_searched, 1);
    Ok(())
}

#[test]
fn test_multiple_roots() -> Result<()> {
    let first = tempdir()?;
    let second = tempdir()?;
    fs::write(first.path().join("x.txt"), "shared")?;
    fs::write(second.path().join("y.txt"), "shared\nshared")?;

    let result = search(&SearchOptions::new("shared", [first.path(), second.path()]))?;
    assert_eq!(result.total_matches(), 3);
    assert_eq!(result.files_with_matches(), 2);
    Ok(())
}
