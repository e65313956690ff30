//! Tar archive helpers.
//!
//! The Docker archive API wraps a downloaded directory in a top-level entry
//! named after it (`/src/site` arrives as `site/...`). These helpers pack host
//! trees, drop that wrapper, and unpack onto the host.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Pack the contents of `root` (not `root` itself) into a tar archive.
pub fn pack_dir(root: &Path) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all("", root)?;
    builder.into_inner()
}

/// Rewrite an archive so every entry loses its first path component.
/// The wrapper directory entry itself is dropped.
pub fn strip_top_level(archive: &[u8]) -> io::Result<Vec<u8>> {
    let mut input = tar::Archive::new(archive);
    let mut builder = tar::Builder::new(Vec::new());

    for entry in input.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let stripped = strip_first(&path);
        if stripped.as_os_str().is_empty() {
            continue;
        }

        let mut header = entry.header().clone();
        let entry_type = header.entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()?
                .map(|t| t.into_owned())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "link without target"))?;
            // Hard links point at other archive members, which moved too.
            let target = if entry_type.is_hard_link() {
                strip_first(&target)
            } else {
                target
            };
            builder.append_link(&mut header, &stripped, &target)?;
        } else {
            builder.append_data(&mut header, &stripped, &mut entry)?;
        }
    }

    builder.into_inner()
}

/// Unpack a Docker archive download into `dest`, dropping the wrapper entry.
pub fn unpack_stripped(archive: &[u8], dest: &Path) -> io::Result<()> {
    let stripped = strip_top_level(archive)?;
    std::fs::create_dir_all(dest)?;
    tar::Archive::new(stripped.as_slice()).unpack(dest)
}

fn strip_first(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .skip(1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::create_dir_all(dir.path().join("assets/css")).unwrap();
        std::fs::write(dir.path().join("assets/css/site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join(".nojekyll"), "").unwrap();
        dir
    }

    /// Shape an archive the way the Docker API returns `/src/site`.
    fn wrapped(root: &Path, name: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        builder.append_dir_all(name, root).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_unpack_stripped_drops_wrapper() {
        let tree = sample_tree();
        let archive = wrapped(tree.path(), "site");

        let out = tempfile::tempdir().unwrap();
        unpack_stripped(&archive, out.path()).unwrap();

        assert!(out.path().join("index.html").is_file());
        assert!(out.path().join("assets/css/site.css").is_file());
        assert!(out.path().join(".nojekyll").is_file());
        assert!(!out.path().join("site").exists());
    }

    #[test]
    fn test_strip_top_level_entry_names() {
        let tree = sample_tree();
        let stripped = strip_top_level(&wrapped(tree.path(), "site")).unwrap();

        let mut names: Vec<String> = tar::Archive::new(stripped.as_slice())
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert!(names.contains(&"index.html".to_string()));
        assert!(names.iter().all(|n| !n.starts_with("site")));
    }

    #[test]
    fn test_pack_dir_keeps_relative_paths() {
        let tree = sample_tree();
        let packed = pack_dir(tree.path()).unwrap();

        let out = tempfile::tempdir().unwrap();
        tar::Archive::new(packed.as_slice()).unpack(out.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(out.path().join("assets/css/site.css")).unwrap(),
            "body{}"
        );
    }

    #[test]
    fn test_strip_first_ignores_curdir() {
        assert_eq!(strip_first(Path::new("./site/index.html")), PathBuf::from("index.html"));
        assert_eq!(strip_first(Path::new("site")), PathBuf::new());
    }
}
