use crate::tree::SelectedData;
use anyhow::{Context, Result};
use ::csv::WriterBuilder;
use std::path::Path;

/// One row per extracted epoch: the epoch index followed by its samples.
/// Rows may differ in length.
pub fn write_selected_csv(path: &Path, data: &SelectedData) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for (epoch, row) in data.epochs.iter().zip(&data.matrix) {
        let mut fields = Vec::with_capacity(row.len() + 1);
        fields.push(epoch.index().to_string());
        fields.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EpochId;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("selected.csv");
        let data = SelectedData {
            matrix: vec![vec![1.0, 2.5], vec![3.0]],
            epochs: vec![EpochId(4), EpochId(9)],
            fs: Some(1000.0),
        };
        write_selected_csv(&path, &data).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "4,1,2.5\n9,3\n");
    }
}
