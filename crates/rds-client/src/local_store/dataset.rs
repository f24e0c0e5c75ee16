use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use rds_core::Result;

/// Derive a dataset schema from its mock tree: each file maps to its CSV
/// header columns, non-tabular files to an empty list.
pub fn infer_schema(mock_dir: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    let mut schema = BTreeMap::new();
    for entry in WalkDir::new(mock_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_name = entry
            .path()
            .strip_prefix(mock_dir)
            .expect("walkdir stays under its root")
            .to_string_lossy()
            .to_string();
        let columns = if entry.path().extension().and_then(|e| e.to_str()) == Some("csv") {
            csv_header(entry.path()).unwrap_or_default()
        } else {
            Vec::new()
        };
        debug!(file = rel_name, columns = columns.len(), "inferred schema entry");
        schema.insert(rel_name, columns);
    }
    Ok(schema)
}

fn csv_header(path: &Path) -> Option<Vec<String>> {
    let file = std::fs::File::open(path).ok()?;
    let mut first_line = String::new();
    std::io::BufReader::new(file).read_line(&mut first_line).ok()?;
    let header = first_line.trim_end();
    if header.is_empty() {
        return None;
    }
    Some(header.split(',').map(|c| c.trim().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_headers_become_columns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "A,B,C\n1,2,3\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let schema = infer_schema(dir.path()).unwrap();
        assert_eq!(schema["data.csv"], vec!["A", "B", "C"]);
        assert!(schema["README.md"].is_empty());
    }
}
