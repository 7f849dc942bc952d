use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::error::{FeatureError, Result};

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Read a tab-separated sample table. The whole file is scanned for schema
/// inference so late non-numeric values do not break parsing.
pub fn read_tsv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_separator(b'\t'))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| FeatureError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `df` as TSV. The table goes to a temp file next to `path` first and
/// replaces `path` only once it is complete.
pub fn write_tsv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let unwritable = |source: io::Error| FeatureError::Unwritable {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(unwritable)?;
    CsvWriter::new(tmp.as_file_mut())
        .include_header(true)
        .with_separator(b'\t')
        .finish(df)
        .map_err(|e| unwritable(io::Error::other(e)))?;
    tmp.persist(path).map_err(|e| unwritable(e.error))?;
    Ok(())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Fails with the full list of absent columns, not just the first one.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| !has_column(df, name))
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FeatureError::MissingColumns(missing))
    }
}

/// Column values as floats. Unparseable entries and NaN become `None`.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

/// All `*.tsv` files directly inside `dir`, sorted by path.
pub fn discover_tsv_files(dir: &Path, prefix: Option<&str>) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "tsv"))
        .filter(|path| match prefix {
            Some(prefix) => path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(prefix)),
            None => true,
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn require_columns_lists_every_missing_name() {
        let df = df!["SYMBOL" => &["A"]].unwrap();
        let err = require_columns(&df, &["SYMBOL", "AF", "Gene"]).unwrap_err();
        match err {
            FeatureError::MissingColumns(cols) => assert_eq!(cols, vec!["AF", "Gene"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn f64_values_coerces_text_and_drops_nan() {
        let df = df!["CADD_PHRED" => &[Some("12.5"), Some("-"), None, Some("NaN")]].unwrap();
        let values = f64_values(&df, "CADD_PHRED").unwrap();
        assert_eq!(values, vec![Some(12.5), None, None, None]);
    }

    #[test]
    fn tsv_round_trip_keeps_rows_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.tsv");
        fs::write(&path, "Gene\tSYMBOL\tAF\nENSG1\tA\t0.5\n\tB\t\n").unwrap();

        let mut df = read_tsv(&path).unwrap();
        assert_eq!(df.height(), 2);
        write_tsv(&mut df, &path).unwrap();

        let again = read_tsv(&path).unwrap();
        assert_eq!(again.get_column_names(), df.get_column_names());
        assert_eq!(string_values(&again, "Gene").unwrap(), vec![Some("ENSG1".to_string()), None]);
        assert_eq!(f64_values(&again, "AF").unwrap(), vec![Some(0.5), None]);
    }

    #[test]
    fn unreadable_file_is_reported_with_its_path() {
        let err = read_tsv(Path::new("/definitely/not/here.tsv")).unwrap_err();
        assert!(matches!(err, FeatureError::Unreadable { .. }));
        assert!(err.to_string().contains("here.tsv"));
    }

    #[test]
    fn discovery_filters_by_extension_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["case_2.tsv", "case_1.tsv", "control_1.tsv", "notes.txt"] {
            fs::write(dir.path().join(name), "a\n1\n").unwrap();
        }
        let all = discover_tsv_files(dir.path(), None).unwrap();
        assert_eq!(all.len(), 3);

        let cases = discover_tsv_files(dir.path(), Some("case_")).unwrap();
        let names: Vec<_> = cases
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["case_1.tsv", "case_2.tsv"]);
    }
}
