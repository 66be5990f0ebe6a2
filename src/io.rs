//! Model files.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::Model;

/// Reads and validates a model file.
pub fn load(path: impl AsRef<Path>) -> ModelResult<Model> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model = Model::from_json(&text)?;
    debug!(path = %path.display(), objects = model.graph.objects.len(), "model loaded");
    Ok(model)
}

/// Writes a model file as pretty-printed JSON.
///
/// The text is written to a sibling temporary file first and then renamed
/// over `path`, so a failed save leaves any previous file intact.
pub fn save(model: &Model, path: impl AsRef<Path>) -> ModelResult<()> {
    let path = path.as_ref();
    let text = model.to_json_pretty()?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let io_err = |source: std::io::Error| ModelError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    debug!(path = %path.display(), "model saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ExitStatus};

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut model = Model::new("gridlabd", "4.3.1");
        model.schema.types.insert("double".to_string(), serde_json::json!({}));
        save(&model, &path).unwrap();
        assert_eq!(load(&path).unwrap(), model);
    }

    #[test]
    fn test_missing_file_is_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(ExitStatus::from(&err), ExitStatus::AccessError);
    }

    #[test]
    fn test_garbage_is_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        let err = load(&path).unwrap_err();
        assert_eq!(ExitStatus::from(&err), ExitStatus::SyntaxError);
    }
}
