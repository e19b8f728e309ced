use std::path::{Component, Path, PathBuf};

use crate::error::{DrizzleError, Result};
use crate::models::{EntryKind, FileEntry};

/// List the immediate children of `sub` below `root`, sorted by name.
/// Never recurses. `sub` may be empty for the root itself; parent-traversal
/// components are rejected before any filesystem access.
pub async fn list_directory(root: &Path, sub: &str) -> Result<Vec<FileEntry>> {
    let target = resolve(root, sub)?;

    let metadata = tokio::fs::metadata(&target).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DrizzleError::NotFound(target.clone())
        } else {
            DrizzleError::IOError(e)
        }
    })?;
    if !metadata.is_dir() {
        return Err(DrizzleError::NotADirectory(target));
    }

    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(&target).await?;
    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path().display().to_string(),
            kind: if metadata.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            },
            size: metadata.len(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn resolve(root: &Path, sub: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(sub).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(DrizzleError::PathEscapesRoot(PathBuf::from(sub)));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(DrizzleError::PathEscapesRoot(PathBuf::from(sub)));
            }
        }
    }
    Ok(resolved)
}
