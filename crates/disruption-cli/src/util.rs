use anyhow::Result;
use std::path::PathBuf;

/// Check that `path` names an existing `.csv` or `.tsv` dataset and return it.
pub fn validate_dataset_file(path: &str) -> Result<PathBuf> {
    let pb = PathBuf::from(path);

    let ext = pb
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    if !matches!(ext.as_deref(), Some("csv") | Some("tsv")) {
        anyhow::bail!("Shot dataset must have a .tsv or .csv extension: {}", path);
    }
    if !pb.is_file() {
        anyhow::bail!("Shot dataset not found: {}", path);
    }

    Ok(pb)
}
