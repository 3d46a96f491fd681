//! End-to-end: discover sources, convert them into the cache, open the
//! artifacts as one dataset and tabulate per-fibre variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use weave_netcdf::cache::scan_cache;
use weave_netcdf::fits::testing::{FitsBuilder, TestColumn};
use weave_netcdf::progress::NoProgress;
use weave_netcdf::readers;
use weave_netcdf::{ArrayData, CacheConfig, ConversionCache, TableReader, lr_l2_stack_files};

const WAVELENGTHS: [f64; 4] = [366.0, 366.1, 366.2, 366.3];

fn write_class_spec(root: &Path, date: &str, name: &str, res: &str, first_id: i32) -> PathBuf {
    let dir = root.join("L2").join(date);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);

    let rows = 3;
    let lambda: Vec<f64> = WAVELENGTHS.iter().copied().cycle().take(4 * rows).collect();
    let flux: Vec<f32> = (0..4 * rows).map(|i| (first_id as f32) + i as f32 * 0.25).collect();

    FitsBuilder::new()
        .primary_keyword("RES-OBS", res)
        .table(
            "CLASS_SPEC",
            vec![
                TestColumn::new("APS_ID", ArrayData::I32((first_id..first_id + 3).collect())),
                TestColumn::new("LAMBDA_RR_B", ArrayData::F64(lambda)).cell(vec![4]).unit("Angstrom"),
                TestColumn::new("FLUX_RR_B", ArrayData::F32(flux)).cell(vec![4]).unit("erg/s/cm2/A"),
                TestColumn::new("SNR", ArrayData::F32(vec![1.0, 2.0, 3.0])),
            ],
        )
        .write(&path)
        .unwrap();
    path
}

#[tokio::test]
async fn test_discover_convert_combine_frame() {
    let survey = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    write_class_spec(survey.path(), "20230101", "stack_1002.fits", "LR", 1);
    write_class_spec(survey.path(), "20230102", "stack_1003.fits", "LR", 10);
    write_class_spec(survey.path(), "20230102", "stack_2001.fits", "HR", 20);

    let sources = lr_l2_stack_files(survey.path(), "*", "*").unwrap();
    assert_eq!(sources.len(), 2);

    let cache = ConversionCache::new(
        CacheConfig::new(store.path())
            .with_progress(false)
            .with_max_concurrent_files(2),
    );
    let reader: Arc<dyn TableReader> = Arc::new(readers::class_spec());

    let combined = cache
        .load(reader.clone(), &sources, &NoProgress)
        .await
        .unwrap();

    assert_eq!(combined.filenames(), vec!["stack_1002", "stack_1003"]);
    assert_eq!(combined.row_counts(), vec![3, 3]);
    assert_eq!(
        combined.coord("LAMBDA_B").unwrap().data,
        ArrayData::F64(WAVELENGTHS.to_vec())
    );

    let flux = combined.load_variable("FLUX_RR_B").await.unwrap();
    assert_eq!(flux.dims, vec!["APS_ID", "LAMBDA_B"]);
    assert_eq!(flux.block("stack_1003").unwrap().shape, vec![3, 4]);

    let df = combined
        .frame(&["SNR".to_string()])
        .await
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(df.height(), 6);
    assert_eq!(df.column("SNR").unwrap().null_count(), 0);

    // a second pass converts nothing
    let report = cache
        .ensure_cached_collect(reader.clone(), &sources, &NoProgress)
        .await;
    assert_eq!(report.hits(), 2);
    assert_eq!(report.converted(), 0);

    let summary = scan_cache(store.path(), &[reader.table_name()]).unwrap();
    assert_eq!(summary.tables["class_spec"].artifacts, 2);
    assert!(summary.partial_files.is_empty());
    assert!(
        store
            .path()
            .join("L2/20230102/stack_1003_class_spec.nc")
            .exists()
    );
}
