//! CSV/TSV reader and writer for labeled disruption datasets.
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::StringRecord;
use ndarray::{Array1, Array2};

use crate::data_handling::{Dataset, FEATURE_NAMES};

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn parse_label(value: &str) -> Option<u8> {
    match value.trim() {
        "0" | "0.0" | "false" | "False" => Some(0),
        "1" | "1.0" | "true" | "True" => Some(1),
        _ => None,
    }
}

/// Read the nine canonical measurements plus `label_column` from a delimited
/// file with a header row.
///
/// Columns are located by name (case-insensitive) and returned in canonical
/// order; any other column is ignored. Files ending in `.tsv` are read as
/// tab-separated.
pub fn read_dataset_csv<P: AsRef<Path>>(path: P, label_column: &str) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read dataset header row")?
        .clone();

    let label_idx = find_column(&headers, label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", label_column))?;
    let feature_indices = FEATURE_NAMES
        .iter()
        .map(|name| find_column(&headers, name).ok_or_else(|| anyhow!("Missing feature column '{}'", name)))
        .collect::<Result<Vec<usize>>>()?;

    let mut features = Vec::new();
    let mut labels = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let raw_label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?;
        let label = parse_label(raw_label).ok_or_else(|| {
            anyhow!(
                "Invalid label '{}' at row {}: expected 0 or 1",
                raw_label,
                row_idx + 1
            )
        })?;
        labels.push(label);

        for (&idx, name) in feature_indices.iter().zip(FEATURE_NAMES.iter()) {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing '{}' value at row {}", name, row_idx + 1))?;
            let parsed = value
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid '{}' value at row {}", name, row_idx + 1))?;
            features.push(parsed);
        }
    }

    if labels.is_empty() {
        bail!("Dataset {} has no rows", path.display());
    }

    let n_samples = labels.len();
    let x = Array2::from_shape_vec((n_samples, FEATURE_NAMES.len()), features)
        .context("Failed to build feature matrix")?;
    let y = Array1::from_vec(labels);

    let dataset = Dataset::with_canonical_schema(x, y)?;
    log::debug!(
        "Loaded {} samples ({} positive) from {}",
        dataset.len(),
        dataset.n_positive(),
        path.display()
    );
    Ok(dataset)
}

/// Write `dataset` with its feature names and a trailing `label_column`.
pub fn write_dataset_csv<P: AsRef<Path>>(path: P, dataset: &Dataset, label_column: &str) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_path(path)
        .with_context(|| format!("Failed to create dataset file: {}", path.display()))?;

    let mut header: Vec<&str> = dataset.feature_names.iter().map(String::as_str).collect();
    header.push(label_column);
    writer.write_record(&header)?;

    for (row, label) in dataset.x.rows().into_iter().zip(dataset.y.iter()) {
        let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        record.push(label.to_string());
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write dataset file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn header(label: &str) -> String {
        let mut cols: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        cols.push(label.to_string());
        cols.join(",")
    }

    #[test]
    fn reads_columns_in_any_order() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let mut cols: Vec<&str> = FEATURE_NAMES.iter().rev().copied().collect();
        cols.insert(3, "Shot");
        cols.push("Disruption");
        writeln!(file, "{}", cols.join(",")).unwrap();
        // reversed feature order: Turbulence Level first
        writeln!(file, "9,8,7,shot-1,6,5,4,3,2,1,1").unwrap();
        writeln!(file, "19,18,17,shot-2,16,15,14,13,12,11,0").unwrap();
        file.flush().unwrap();

        let data = read_dataset_csv(file.path(), "Disruption").unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.x.row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(data.y.to_vec(), vec![1, 0]);
        assert_eq!(data.feature_names[0], "Plasma Current");
    }

    #[test]
    fn rejects_bad_label() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", header("Disruption")).unwrap();
        writeln!(file, "1,2,3,4,5,6,7,8,9,2").unwrap();
        file.flush().unwrap();
        let err = read_dataset_csv(file.path(), "Disruption").unwrap_err();
        assert!(err.to_string().contains("Invalid label"));
    }

    #[test]
    fn missing_column_is_named() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Plasma Current,Disruption").unwrap();
        writeln!(file, "1,0").unwrap();
        file.flush().unwrap();
        let err = read_dataset_csv(file.path(), "Disruption").unwrap_err();
        assert!(err.to_string().contains("Electron Density"));
    }

    #[test]
    fn tsv_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shots.tsv");
        let x = Array2::from_shape_fn((4, 9), |(r, c)| r as f64 * 0.5 + c as f64);
        let y = Array1::from_vec(vec![0, 1, 0, 0]);
        let data = Dataset::with_canonical_schema(x, y).unwrap();

        write_dataset_csv(&path, &data, "label").unwrap();
        let back = read_dataset_csv(&path, "label").unwrap();
        assert_eq!(back, data);
    }
}
