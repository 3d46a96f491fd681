//! Reader tests against synthetic WEAVE files

use super::*;
use crate::dataset::ArrayData;
use crate::fits::testing::{FitsBuilder, TestColumn};
use std::path::PathBuf;
use tempfile::TempDir;

fn aps_id() -> TestColumn {
    TestColumn::new("APS_ID", ArrayData::I32(vec![1001, 1002, 1003]))
}

fn write(dir: &TempDir, name: &str, extname: &str, columns: Vec<TestColumn>) -> PathBuf {
    let path = dir.path().join(name);
    FitsBuilder::new()
        .primary_keyword("RES-OBS", "LR")
        .table(extname, columns)
        .write(&path)
        .unwrap();
    path
}

fn repeated(row: &[f64], rows: usize) -> Vec<f64> {
    row.iter().copied().cycle().take(row.len() * rows).collect()
}

#[test]
fn test_class_table_promotes_redshift_grid() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack_1002.fits",
        "CLASS_TABLE",
        vec![
            aps_id(),
            TestColumn::new("CZZ_GALAXY", ArrayData::F64(repeated(&[0.0, 0.5, 1.0, 1.5], 3)))
                .cell(vec![4]),
            TestColumn::new("CZZ_CHI2_GALAXY", ArrayData::F32(vec![2.0; 12])).cell(vec![4]),
            TestColumn::new("COEFF", ArrayData::F32(vec![0.1; 9])).cell(vec![3]),
            TestColumn::new("SNR", ArrayData::F32(vec![5.0, 6.0, 7.0])).unit("adu"),
        ],
    );

    let ds = class_table().read(&path).unwrap();

    assert_eq!(
        ds.coord("APS_ID").unwrap().data,
        ArrayData::I32(vec![1001, 1002, 1003])
    );
    assert_eq!(
        ds.coord("CZZ_GALAXY").unwrap().data,
        ArrayData::F64(vec![0.0, 0.5, 1.0, 1.5])
    );
    assert!(ds.data_var("CZZ_GALAXY").is_none());

    let chi2 = ds.data_var("CZZ_CHI2_GALAXY").unwrap();
    assert_eq!(chi2.dims, vec!["APS_ID", "CZZ_GALAXY"]);
    assert_eq!(chi2.shape, vec![3, 4]);

    let coeff = ds.data_var("COEFF").unwrap();
    assert_eq!(coeff.dims, vec!["APS_ID", "I_COEFF"]);
    assert_eq!(coeff.unit.as_deref(), Some("None"));

    let snr = ds.data_var("SNR").unwrap();
    assert_eq!(snr.dims, vec!["APS_ID"]);
    assert_eq!(snr.unit.as_deref(), Some("adu"));
    assert_eq!(snr.data, ArrayData::F32(vec![5.0, 6.0, 7.0]));
}

#[test]
fn test_class_table_rejects_inconsistent_grid() {
    let dir = TempDir::new().unwrap();
    let mut grid = repeated(&[0.0, 0.5], 3);
    grid[5] = 0.502;
    let path = write(
        &dir,
        "stack_1003.fits",
        "CLASS_TABLE",
        vec![
            aps_id(),
            TestColumn::new("CZZ_STAR", ArrayData::F64(grid)).cell(vec![2]),
        ],
    );

    match class_table().read(&path).unwrap_err() {
        CacheError::SchemaInvariant { path: p, column, .. } => {
            assert_eq!(p, path);
            assert_eq!(column, "CZZ_STAR");
        }
        other => panic!("Expected SchemaInvariant, got {other:?}"),
    }
}

#[test]
fn test_class_table_tolerates_sub_precision_noise() {
    let dir = TempDir::new().unwrap();
    let mut grid = repeated(&[0.0, 0.5], 3);
    grid[3] = 0.5001;
    let path = write(
        &dir,
        "stack_1004.fits",
        "CLASS_TABLE",
        vec![
            aps_id(),
            TestColumn::new("CZZ_STAR", ArrayData::F64(grid)).cell(vec![2]),
        ],
    );

    let ds = class_table().read(&path).unwrap();
    assert_eq!(
        ds.coord("CZZ_STAR").unwrap().data,
        ArrayData::F64(vec![0.0, 0.5])
    );
}

#[test]
fn test_star_table_covariance_axes() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack_2001.fits",
        "STAR_TABLE",
        vec![
            aps_id(),
            TestColumn::new("TEFF", ArrayData::F32(vec![5000.0, 5100.0, 5200.0])).unit("K"),
            TestColumn::new("COVAR", ArrayData::F32(vec![0.0; 75])).cell(vec![5, 5]),
            TestColumn::new("ELEM", ArrayData::F32(vec![0.0; 6])).cell(vec![2]),
            TestColumn::new("ELEM_ERR", ArrayData::F32(vec![0.0; 6])).cell(vec![2]),
        ],
    );

    let ds = star_table().read(&path).unwrap();

    let labels: Vec<String> = STELLAR_PARAMETERS.iter().map(|s| s.to_string()).collect();
    assert_eq!(ds.coord("I_COVAR").unwrap().data, ArrayData::Str(labels.clone()));
    assert_eq!(ds.coord("J_COVAR").unwrap().data, ArrayData::Str(labels));

    let covar = ds.data_var("COVAR").unwrap();
    assert_eq!(covar.dims, vec!["APS_ID", "I_COVAR", "J_COVAR"]);
    assert_eq!(covar.shape, vec![3, 5, 5]);
    assert_eq!(ds.data_var("ELEM").unwrap().dims, vec!["APS_ID", "I_ELEM"]);
    assert_eq!(ds.data_var("ELEM_ERR").unwrap().dims, vec!["APS_ID", "I_ELEM"]);
    assert_eq!(ds.data_var("TEFF").unwrap().unit.as_deref(), Some("K"));
}

#[test]
fn test_star_table_wrong_covariance_shape() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack_2002.fits",
        "STAR_TABLE",
        vec![
            aps_id(),
            TestColumn::new("COVAR", ArrayData::F32(vec![0.0; 48])).cell(vec![4, 4]),
        ],
    );

    let err = star_table().read(&path).unwrap_err();
    assert!(matches!(err, CacheError::SchemaInvariant { ref column, .. } if column == "COVAR"));
}

#[test]
fn test_not_line_col() {
    assert!(!not_line_col("FLUX_HA"));
    assert!(!not_line_col("ERR_FLUX_HA"));
    assert!(!not_line_col("Z_GAND"));
    assert!(!not_line_col("EBMV_PPXF"));
    assert!(not_line_col("ZSPEC"));
    assert!(not_line_col("MASS"));
    assert!(not_line_col("FLUXRATIO"));
}

#[test]
fn test_galaxy_table_index_columns() {
    let dir = TempDir::new().unwrap();
    let mut columns = vec![
        aps_id(),
        TestColumn::new("EBMV_GAND", ArrayData::F32(vec![0.0; 6])).cell(vec![2]),
    ];
    for i in 1..=100 {
        columns.push(TestColumn::new(&format!("P{i:03}"), ArrayData::F32(vec![0.0; 3])));
    }
    columns.push(TestColumn::new("FLUX_HA", ArrayData::F32(vec![1.0; 3])));
    columns.push(TestColumn::new("ERR_FLUX_HA", ArrayData::F32(vec![0.1; 3])));
    columns.push(TestColumn::new("MASS", ArrayData::F32(vec![10.0; 3])));
    let path = write(&dir, "stack_3001.fits", "GALAXY_TABLE", columns);

    let ds = galaxy_table().read(&path).unwrap();

    assert_eq!(ds.data_var("EBMV_GAND").unwrap().dims, vec!["APS_ID", "I_EBMV"]);
    // position 100 is the last one left untouched
    assert!(ds.data_var("P100").is_some());
    assert!(ds.data_var("FLUX_HA").is_some());
    assert!(ds.data_var("ERR_FLUX_HA").is_some());
    assert!(ds.data_var("MASS").is_none());
    assert_eq!(
        ds.data_var("IDX_MASS").unwrap().data,
        ArrayData::F32(vec![10.0; 3])
    );
}

#[test]
fn test_class_spec_wavelength_coordinates() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack_4001.fits",
        "CLASS_SPEC",
        vec![
            aps_id(),
            TestColumn::new("LAMBDA_B", ArrayData::F32(
                [4000.0f32, 4000.5, 4001.0].repeat(3),
            ))
            .cell(vec![3])
            .unit("Angstrom"),
            TestColumn::new("FLUX_B", ArrayData::F32(vec![1.0; 9])).cell(vec![3]),
            TestColumn::new("LAMBDA_R", ArrayData::F32([6000.0f32, 6001.0].repeat(3)))
                .cell(vec![2]),
            TestColumn::new("FLUX_R", ArrayData::F32(vec![2.0; 6])).cell(vec![2]),
            TestColumn::new("SNR", ArrayData::F32(vec![3.0; 3])),
        ],
    );

    let ds = class_spec().read(&path).unwrap();

    let lambda_b = ds.coord("LAMBDA_B").unwrap();
    assert_eq!(lambda_b.data, ArrayData::F32(vec![4000.0, 4000.5, 4001.0]));
    assert_eq!(lambda_b.unit.as_deref(), Some("Angstrom"));
    assert_eq!(ds.coord("LAMBDA_R").unwrap().shape, vec![2]);
    assert_eq!(ds.data_var("FLUX_B").unwrap().dims, vec!["APS_ID", "LAMBDA_B"]);
    assert_eq!(ds.data_var("FLUX_R").unwrap().dims, vec!["APS_ID", "LAMBDA_R"]);
    assert_eq!(ds.data_var("SNR").unwrap().dims, vec!["APS_ID"]);
    assert!(ds.data_var("LAMBDA_B").is_none());
}

#[test]
fn test_single_precision_grid_keeps_source_values() {
    let dir = TempDir::new().unwrap();
    let grid = [4000.1f32, 4000.35, 4000.6];
    let path = write(
        &dir,
        "stack_4002.fits",
        "CLASS_SPEC",
        vec![
            aps_id(),
            TestColumn::new("LAMBDA_B", ArrayData::F32(grid.repeat(3))).cell(vec![3]),
            TestColumn::new("FLUX_B", ArrayData::F32(vec![1.0; 9])).cell(vec![3]),
        ],
    );

    let ds = class_spec().read(&path).unwrap();
    let lambda_b = &ds.coord("LAMBDA_B").unwrap().data;
    assert_eq!(*lambda_b, ArrayData::F32(grid.to_vec()));
    assert_eq!(
        lambda_b.to_f64().unwrap(),
        grid.iter().map(|&v| f64::from(v)).collect::<Vec<_>>()
    );
}

#[test]
fn test_star_and_galaxy_spec_bins() {
    let dir = TempDir::new().unwrap();
    let star = write(
        &dir,
        "stack_5001.fits",
        "STAR_SPEC",
        vec![
            aps_id(),
            TestColumn::new("FLUX_B", ArrayData::F32(vec![0.0; 6])).cell(vec![2]),
            TestColumn::new("FLUX_R", ArrayData::F32(vec![0.0; 9])).cell(vec![3]),
            TestColumn::new("FLUX_C", ArrayData::F32(vec![0.0; 12])).cell(vec![4]),
        ],
    );
    let ds = star_spec().read(&star).unwrap();
    assert_eq!(ds.data_var("FLUX_B").unwrap().dims, vec!["APS_ID", "LAMBIN_B"]);
    assert_eq!(ds.data_var("FLUX_R").unwrap().dims, vec!["APS_ID", "LAMBIN_R"]);
    assert_eq!(ds.data_var("FLUX_C").unwrap().dims, vec!["APS_ID", "LAMBIN_C"]);
    assert_eq!(ds.dim_len("LAMBIN_C"), Some(4));

    let galaxy = write(
        &dir,
        "stack_5002.fits",
        "GALAXY_SPEC",
        vec![
            aps_id(),
            TestColumn::new("FLUX_PPXF", ArrayData::F32(vec![0.0; 12])).cell(vec![4]),
            TestColumn::new("FLUX_GAND", ArrayData::F32(vec![0.0; 12])).cell(vec![4]),
        ],
    );
    let ds = galaxy_spec().read(&galaxy).unwrap();
    assert_eq!(ds.data_var("FLUX_PPXF").unwrap().dims, vec!["APS_ID", "LOGLAMBIN"]);
    assert_eq!(ds.data_var("FLUX_GAND").unwrap().dims, vec!["APS_ID", "LOGLAMBIN"]);
}

#[test]
fn test_missing_extension_is_source_read_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "stack_6001.fits", "STAR_TABLE", vec![aps_id()]);

    match galaxy_spec().read(&path).unwrap_err() {
        CacheError::SourceRead { table, path: p, .. } => {
            assert_eq!(table, "GALAXY_SPEC");
            assert_eq!(p, path);
        }
        other => panic!("Expected SourceRead, got {other:?}"),
    }
}

#[test]
fn test_read_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "stack_7001.fits",
        "STAR_SPEC",
        vec![
            aps_id(),
            TestColumn::new("FLUX_B", ArrayData::F32(vec![1.5; 6])).cell(vec![2]),
        ],
    );
    let reader = star_spec();
    assert_eq!(reader.read(&path).unwrap(), reader.read(&path).unwrap());
}

#[test]
fn test_table_names() {
    assert_eq!(class_table().table_name(), "class_table");
    assert_eq!(galaxy_spec().table_name(), "galaxy_spec");
}

#[test]
fn test_registry_lookup() {
    let registry = ReaderRegistry::weave_l2();
    assert_eq!(registry.names().len(), 6);
    assert_eq!(registry.get("read_star_spec").unwrap().name(), "read_star_spec");
    assert_eq!(registry.get("CLASS_TABLE").unwrap().name(), "read_class_table");
    assert!(matches!(
        registry.get("read_sky_table").unwrap_err(),
        CacheError::UnknownReader { .. }
    ));
}
