//! File arguments as given on the command line.
//!
//! Shells on Windows hand wildcards to the program unexpanded, so the
//! uploader expands them itself there.

use globset::GlobBuilder;
use std::path::{Path, PathBuf};

use crate::error::UploadError;

fn has_wildcards(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

/// Turn command line arguments into paths, expanding wildcards in the last
/// path component when `expand_globs` is set.
///
/// Matches are sorted by name. A pattern matching nothing is kept as given,
/// so the upload fails on it the same way an unexpanding shell would.
pub fn expand(args: &[String], expand_globs: bool) -> Result<Vec<PathBuf>, UploadError> {
    let mut paths = Vec::with_capacity(args.len());
    for arg in args {
        let path = Path::new(arg);
        if !expand_globs || !has_wildcards(arg) || path.exists() {
            paths.push(path.to_path_buf());
            continue;
        }
        paths.extend(expand_pattern(arg)?);
    }
    Ok(paths)
}

fn expand_pattern(arg: &str) -> Result<Vec<PathBuf>, UploadError> {
    let path = Path::new(arg);
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if parent.is_some_and(|p| has_wildcards(&p.to_string_lossy())) {
        return Err(UploadError::Glob(format!(
            "{}: only the file name may contain wildcards",
            arg
        )));
    }
    let pattern = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::Glob(arg.to_string()))?;

    let matcher = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .case_insensitive(cfg!(windows))
        .build()
        .map_err(|e| UploadError::Glob(format!("{}: {}", arg, e)))?
        .compile_matcher();

    let dir = parent.unwrap_or_else(|| Path::new("."));
    let entries = std::fs::read_dir(dir).map_err(|e| UploadError::io(dir, e))?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| match parent {
            Some(parent) => parent.join(entry.file_name()),
            None => PathBuf::from(entry.file_name()),
        })
        .collect();

    if matches.is_empty() {
        return Ok(vec![PathBuf::from(arg)]);
    }
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn expands_wildcards_in_file_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.zip", "a.zip", "notes.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let paths = expand(&[arg(&dir.path().join("*.zip"))], true).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.zip"), dir.path().join("b.zip")]);
    }

    #[test]
    fn leaves_arguments_alone_without_expansion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.zip"), "a").unwrap();
        let pattern = arg(&dir.path().join("*.zip"));

        let paths = expand(&[pattern.clone()], false).unwrap();
        assert_eq!(paths, vec![PathBuf::from(pattern)]);
    }

    #[test]
    fn keeps_unmatched_pattern_literally() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = arg(&dir.path().join("*.dmg"));

        let paths = expand(&[pattern.clone()], true).unwrap();
        assert_eq!(paths, vec![PathBuf::from(pattern)]);
    }

    #[test]
    fn preserves_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.bin"), "z").unwrap();
        fs::write(dir.path().join("a.bin"), "a").unwrap();

        let args = vec![arg(&dir.path().join("z.bin")), arg(&dir.path().join("a.bin"))];
        let paths = expand(&args, true).unwrap();
        assert_eq!(paths, vec![dir.path().join("z.bin"), dir.path().join("a.bin")]);
    }
}
