use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory: {}", parent.display()))?;
    }
    fs::write(path, render_json(value)?)
        .with_context(|| format!("failed writing JSON: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn writes_pretty_json_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs/latest.json");
        write_json_file(&path, &serde_json::json!({ "budget_eur": 1000.0 })).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["budget_eur"], 1000.0);
    }
}
