//! Single-file conversion behaviour

use super::{CountingReader, Fixture, star_spec, write_broken};
use crate::artifact::{read_artifact, read_schema};
use crate::dataset::ArrayData;
use crate::error::CacheError;
use crate::models::CacheOutcome;
use crate::readers::TableReader;
use std::fs;

#[test]
fn test_converts_once_then_hits() {
    let fx = Fixture::new();
    let source = fx.stack("stack_1002.fits", 10);
    let reader = CountingReader::new(star_spec());

    let first = fx.cache.ensure_cached_outcome(&reader, &source).unwrap();
    assert!(first.was_converted());
    assert_eq!(reader.calls(), 1);
    let modified = fs::metadata(first.path()).unwrap().modified().unwrap();

    let second = fx.cache.ensure_cached_outcome(&reader, &source).unwrap();
    assert_eq!(second, CacheOutcome::Hit(first.path().to_path_buf()));
    assert_eq!(reader.calls(), 1);
    assert_eq!(fs::metadata(second.path()).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_artifact_location_and_content() {
    let fx = Fixture::new();
    let source = fx.stack("stack_1002.fits", 10);
    let reader = star_spec();

    let path = fx.cache.ensure_cached(&reader, &source).unwrap();
    assert_eq!(
        path,
        fx.store
            .path()
            .join("L2")
            .join("20230101")
            .join("stack_1002_star_spec.nc")
    );

    let schema = read_schema(&path).unwrap();
    assert_eq!(schema.filename(), Some("stack_1002"));
    assert_eq!(schema.table(), Some("star_spec"));
    assert_eq!(schema.source(), Some(source.display().to_string().as_str()));

    let flux = schema.variable("FLUX").unwrap();
    assert_eq!(flux.dims, vec!["filename", "APS_ID"]);
    assert_eq!(flux.unit.as_deref(), Some("erg/s/cm2/A"));
    assert_eq!(
        schema.coord("APS_ID").unwrap().data,
        ArrayData::I32(vec![10, 11, 12])
    );
}

#[test]
fn test_existing_artifact_is_trusted_without_validation() {
    let fx = Fixture::new();
    let source = fx.stack("stack_1002.fits", 10);
    let reader = CountingReader::new(star_spec());

    let path = fx.cache.canonical_path(&reader, &source);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"placeholder").unwrap();

    let outcome = fx.cache.ensure_cached_outcome(&reader, &source).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit(path.clone()));
    assert_eq!(reader.calls(), 0);
    assert_eq!(fs::read(&path).unwrap(), b"placeholder");
}

#[test]
fn test_regenerates_identical_artifact_after_deletion() {
    let fx = Fixture::new();
    let source = fx.stack("stack_1002.fits", 10);
    let reader = star_spec();

    let path = fx.cache.ensure_cached(&reader, &source).unwrap();
    let before = read_artifact(&path).unwrap();

    fs::remove_file(&path).unwrap();
    assert!(!fx.cache.is_cached(&reader, &source));

    let again = fx.cache.ensure_cached(&reader, &source).unwrap();
    assert_eq!(again, path);
    assert_eq!(read_artifact(&again).unwrap(), before);
}

#[test]
fn test_source_read_failure_names_file_and_writes_nothing() {
    let fx = Fixture::new();
    let source = write_broken(fx.survey.path(), "20230101", "stack_9999.fits");
    let reader = star_spec();

    match fx.cache.ensure_cached(&reader, &source).unwrap_err() {
        CacheError::SourceRead { path, table, .. } => {
            assert_eq!(path, source);
            assert_eq!(table, "STAR_SPEC");
        }
        other => panic!("Expected SourceRead, got {other:?}"),
    }
    assert!(!fx.cache.canonical_path(&reader, &source).exists());
}

#[test]
fn test_missing_source_is_source_read_error() {
    let fx = Fixture::new();
    let source = fx.survey.path().join("L2").join("20230101").join("absent.fits");
    let err = fx.cache.ensure_cached(&star_spec(), &source).unwrap_err();
    assert!(matches!(err, CacheError::SourceRead { .. }));
}

#[test]
fn test_unwritable_cache_root_is_cache_write_error() {
    let fx = Fixture::new();
    let source = fx.stack("stack_1002.fits", 10);
    let reader = star_spec();

    // a regular file where the night directory should go
    let blocker = fx.store.path().join("L2");
    fs::write(&blocker, b"not a directory").unwrap();

    match fx.cache.ensure_cached(&reader, &source).unwrap_err() {
        CacheError::CacheWrite { path, .. } => {
            assert_eq!(path, fx.cache.canonical_path(&reader, &source));
        }
        other => panic!("Expected CacheWrite, got {other:?}"),
    }
}

#[test]
fn test_table_name_drives_path() {
    let fx = Fixture::new();
    let source = fx.stack("stack_1002.fits", 10);
    let reader = star_spec();
    let path = fx.cache.canonical_path(&reader, &source);
    assert!(path.to_string_lossy().ends_with(&format!("_{}.nc", reader.table_name())));
}
