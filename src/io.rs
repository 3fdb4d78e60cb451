use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;

use crate::core::Hash32;

const ANSI_BLUE: Style = Style::new().blue();

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Delete a file or directory tree if it exists. Returns whether anything was
/// actually removed, so deleting an absent path is a quiet success.
pub fn remove_all(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(path)?;
            Ok(true)
        }
        Ok(_) => {
            fs::remove_file(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Recursively copy `src` into `dst`, skipping files whose content hash
/// already matches the destination. Returns the number of files written.
pub fn copy_tree(src: impl AsRef<Utf8Path>, dst: impl AsRef<Utf8Path>) -> io::Result<usize> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    fs::create_dir_all(dst)?;

    let mut written = 0;

    for entry in src.read_dir_utf8()? {
        let entry = entry?;
        let target = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            written += copy_tree(entry.path(), &target)?;
        } else if !same_content(entry.path(), &target) {
            fs::copy(entry.path(), &target)?;
            written += 1;
        }
    }

    Ok(written)
}

fn same_content(a: &Utf8Path, b: &Utf8Path) -> bool {
    if !b.exists() {
        return false;
    }

    matches!(
        (Hash32::hash_file(a), Hash32::hash_file(b)),
        (Ok(ha), Ok(hb)) if ha == hb
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;

    use super::*;

    fn utf8(path: &Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn test_remove_all_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("gone");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/file"), b"x").unwrap();

        assert!(remove_all(&dir).unwrap());
        assert!(!remove_all(&dir).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn test_copy_tree_recurses() {
        let tmp = tempfile::tempdir().unwrap();
        let src = utf8(tmp.path()).join("src");
        let dst = utf8(tmp.path()).join("dst");

        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.txt"), b"alpha").unwrap();
        fs::write(src.join("sub/b.txt"), b"beta").unwrap();

        assert_eq!(copy_tree(&src, &dst).unwrap(), 2);
        assert_eq!(fs::read(dst.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dst.join("sub/b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn test_copy_tree_skips_unchanged_files() {
        let tmp = tempfile::tempdir().unwrap();
        let src = utf8(tmp.path()).join("src");
        let dst = utf8(tmp.path()).join("dst");

        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), b"alpha").unwrap();

        assert_eq!(copy_tree(&src, &dst).unwrap(), 1);
        assert_eq!(copy_tree(&src, &dst).unwrap(), 0);

        fs::write(src.join("a.txt"), b"changed").unwrap();
        assert_eq!(copy_tree(&src, &dst).unwrap(), 1);
    }
}
