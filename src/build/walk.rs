use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::entry::{EntryName, Origin};
use crate::error::{Error, Result};

use super::BuildOptions;
use super::source::{ArchiveSource, FileSource, Source};

/// Expand input roots into one producer per file.
///
/// Directories are walked recursively in file-name order. Each file is named
/// by its path relative to the parent of its root, with `/` separators.
/// Files with a `.zip` extension become [`ArchiveSource`]s when merging is
/// enabled. `skip` (normally the destination) is never picked up.
pub fn discover(
    inputs: &[PathBuf],
    options: &BuildOptions,
    skip: Option<&Path>,
) -> Result<Vec<Box<dyn Source>>> {
    let mut sources: Vec<Box<dyn Source>> = Vec::new();

    for (input, root) in inputs.iter().enumerate() {
        std::fs::metadata(root).map_err(|e| Error::input(root, e))?;
        let base = root.parent();
        let mut file = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                Error::input(path, io::Error::from(e))
            })?;
            let path = entry.path();
            // Follows symlinks, so links to directories are skipped too
            if path.is_dir() || skip.is_some_and(|s| s == path) {
                continue;
            }

            let origin = Origin::new(input, file);
            file += 1;

            if options.merge_archives && is_zip(path) {
                sources.push(Box::new(ArchiveSource::new(path.to_path_buf(), origin)));
            } else {
                let name = archive_name(base, path);
                sources.push(Box::new(FileSource::new(path.to_path_buf(), name, origin)));
            }
        }
    }

    tracing::debug!(sources = sources.len(), "discovered inputs");
    Ok(sources)
}

fn is_zip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Name of `path` inside the archive, relative to `base` when possible.
///
/// Components keep their platform bytes; a file name that is not valid UTF-8
/// yields a name without the UTF-8 flag rather than a substituted one.
pub fn archive_name(base: Option<&Path>, path: &Path) -> EntryName {
    let relative = base
        .and_then(|base| path.strip_prefix(base).ok())
        .unwrap_or(path);

    let parts: Vec<&[u8]> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.as_encoded_bytes()),
            _ => None,
        })
        .collect();
    EntryName::from_bytes(parts.join(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn names_are_relative_to_root_parent() {
        let base = Path::new("/data/in");
        assert_eq!(
            archive_name(Some(base), Path::new("/data/in/docs/b/c.txt")),
            "docs/b/c.txt"
        );
        assert_eq!(archive_name(None, Path::new("/a.txt")), "a.txt");
        assert_eq!(archive_name(Some(Path::new("")), Path::new("./x/y")), "x/y");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_file_names_keep_their_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let base = Path::new("/data");
        let first = Path::new("/data/in").join(OsStr::from_bytes(b"\x81.txt"));
        let second = Path::new("/data/in").join(OsStr::from_bytes(b"\x82.txt"));

        let first = archive_name(Some(base), &first);
        let second = archive_name(Some(base), &second);
        assert_eq!(first.as_bytes(), b"in/\x81.txt");
        assert_eq!(second.as_bytes(), b"in/\x82.txt");
        assert!(!first.is_utf8_non_ascii());
    }

    #[test]
    fn zip_extension_is_case_insensitive() {
        assert!(is_zip(Path::new("x.zip")));
        assert!(is_zip(Path::new("X.ZIP")));
        assert!(!is_zip(Path::new("x.zip.txt")));
        assert!(!is_zip(Path::new("zip")));
    }

    #[test]
    fn discovers_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("in");
        fs::create_dir_all(root.join("b/empty")).unwrap();
        fs::write(root.join("z.txt"), "z").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b/c.txt"), "c").unwrap();
        fs::write(root.join("nested.zip"), "").unwrap();

        let options = BuildOptions::default();
        let sources = discover(&[root.clone()], &options, None).unwrap();
        let paths: Vec<_> = sources
            .iter()
            .map(|s| s.path().strip_prefix(&root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            paths,
            [
                PathBuf::from("a.txt"),
                PathBuf::from("b/c.txt"),
                PathBuf::from("nested.zip"),
                PathBuf::from("z.txt"),
            ]
        );
    }

    #[test]
    fn destination_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.zip");
        fs::write(&out, "old").unwrap();
        fs::write(dir.path().join("keep.txt"), "k").unwrap();

        let inputs = [dir.path().to_path_buf()];
        let sources = discover(&inputs, &BuildOptions::default(), Some(&out)).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].path().ends_with("keep.txt"));
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = discover(&[missing.clone()], &BuildOptions::default(), None).unwrap_err();
        assert!(matches!(err, Error::InputNotFound { path } if path == missing));
    }
}
