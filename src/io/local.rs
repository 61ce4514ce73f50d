use super::{PackageDirectory, PayloadSource};
use crate::error::{PackError, PackResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Package directory on the local filesystem
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: &Path) -> PackResult<Self> {
        if !root.is_dir() {
            return Err(PackError::InvalidParameter(format!(
                "Not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn relative_name(&self, path: &Path) -> PackResult<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            PackError::InvalidParameter(format!("{} is outside the package root", path.display()))
        })?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }
}

impl PackageDirectory for LocalDirectory {
    fn files_by_last_modified(&self) -> PackResult<Vec<String>> {
        let mut files: Vec<(SystemTime, String)> = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            files.push((modified, self.relative_name(entry.path())?));
        }

        // Ties are broken by name so enumeration is deterministic
        files.sort();
        Ok(files.into_iter().map(|(_, name)| name).collect())
    }

    fn open_file(&self, name: &str) -> PackResult<Box<dyn PayloadSource>> {
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(file))
    }
}
