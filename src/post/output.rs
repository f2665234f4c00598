use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::OutputError;
use crate::retry::WorkItem;

/// One line per item, in item order. Unresolved items give empty lines.
pub fn render_posts<P>(items: &[WorkItem<P>]) -> String {
    let mut content = String::new();
    for item in items {
        content.push_str(item.text());
        content.push('\n');
    }
    content
}

/// Write the batch to `path` atomically.
///
/// The content goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers never see a half-written file.
pub fn write_posts<P>(path: &Path, items: &[WorkItem<P>]) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir).map_err(|e| OutputError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| OutputError::TempFileFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    temp.write_all(render_posts(items).as_bytes())
        .and_then(|_| temp.flush())
        .map_err(|e| OutputError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    temp.persist(path).map_err(|e| OutputError::WriteFailed {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!(path = %path.display(), items = items.len(), "Wrote posts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_keeps_line_positions() {
        let items: Vec<WorkItem<()>> = vec![WorkItem::new(()), WorkItem::new(())];
        assert_eq!(render_posts(&items), "\n\n");
        assert_eq!(render_posts::<()>(&[]), "");
    }

    #[test]
    fn test_write_creates_parent_dirs_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("posts.txt");
        let items: Vec<WorkItem<()>> = vec![WorkItem::new(())];

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale content\n").unwrap();

        write_posts(&path, &items).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "\n");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("posts.txt");

        write_posts::<()>(&path, &[]).unwrap();

        assert!(path.exists());
    }
}
