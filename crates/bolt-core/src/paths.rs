use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "bolt.yaml";
pub const DEFAULT_EXPORT_DIR: &str = "exports";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve `dir` against `root` unless it is already absolute.
pub fn resolve_under(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

/// True when `name` is a bare file name: no separators, no parent references.
pub fn is_bare_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_dirs_resolve_under_root() {
        let root = Path::new("/srv/bolt");
        assert_eq!(
            resolve_under(root, Path::new("exports")),
            PathBuf::from("/srv/bolt/exports")
        );
        assert_eq!(
            resolve_under(root, Path::new("/tmp/out")),
            PathBuf::from("/tmp/out")
        );
    }

    #[test]
    fn bare_filename_rejects_traversal() {
        assert!(is_bare_filename("server_inventory_20250101_101010.csv"));
        assert!(!is_bare_filename("../secrets.csv"));
        assert!(!is_bare_filename("nested/file.csv"));
        assert!(!is_bare_filename("..\\file.csv"));
        assert!(!is_bare_filename(""));
    }
}
