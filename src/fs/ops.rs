use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use util::PathEncodingError;

use super::Error;

/// Compile glob patterns used to exclude entries from a copy.
pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<glob::Pattern>, Error> {
    patterns
        .iter()
        .map(|p| {
            let p = p.as_ref();
            glob::Pattern::new(p).map_err(|_| Error::InvalidPattern(p.to_owned()))
        })
        .collect()
}

fn is_excluded(path: &Path, exclude: &[glob::Pattern]) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => exclude.iter().any(|p| p.matches(name)),
        None => false,
    }
}

/// Copy `src` to `tgt`, recursively if needed.
pub fn copy(src: &Path, tgt: &Path, exclude: &[glob::Pattern]) -> Result<()> {
    if is_excluded(src, exclude) {
        log::debug!("excluding {src:?} from copy");
        return Ok(());
    }
    if src.is_symlink() {
        let link_tgt = fs::read_link(src)?;
        replace_symlink(&link_tgt, tgt)?;
    } else if src.is_file() {
        fs::copy(src, tgt)?;
    } else if src.is_dir() {
        cp_dir(src, tgt, src, tgt, exclude)?;
    } else {
        return Err(
            Error::UnknownPathType(src.to_str().ok_or(PathEncodingError)?.to_owned()).into(),
        );
    }
    Ok(())
}

fn cp_dir(
    src_root: &Path,
    tgt_root: &Path,
    src: &Path,
    tgt: &Path,
    exclude: &[glob::Pattern],
) -> Result<()> {
    // create_dir_all merges into a dir left by an earlier copy:
    fs::create_dir_all(tgt)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_entry = entry.path();
        if is_excluded(&src_entry, exclude) {
            log::debug!("excluding {src_entry:?} from copy");
            continue;
        }
        let ty = entry.file_type()?;
        let tgt_entry = tgt.join(entry.file_name());
        if ty.is_symlink() {
            let orig_link_tgt = fs::read_link(&src_entry)?;
            let new_link_tgt = resolve_new_link_tgt(src_root, tgt_root, orig_link_tgt)?;
            replace_symlink(&new_link_tgt, &tgt_entry)?;
        } else if ty.is_dir() {
            cp_dir(src_root, tgt_root, &src_entry, &tgt_entry, exclude)?;
        } else if ty.is_file() {
            fs::copy(&src_entry, &tgt_entry)?;
        } else {
            return Err(Error::UnknownPathType(
                entry.path().to_str().ok_or(PathEncodingError)?.to_owned(),
            )
            .into());
        }
    }
    Ok(())
}

/// If link is internal to `src_root`, create a new internal link in `tgt_root`.
/// O/w, just link to the same external target.
fn resolve_new_link_tgt(
    src_root: &Path,
    tgt_root: &Path,
    orig_link_tgt: PathBuf,
) -> Result<PathBuf> {
    if orig_link_tgt.starts_with(src_root) {
        Ok(tgt_root.join(orig_link_tgt.strip_prefix(src_root)?))
    } else {
        Ok(orig_link_tgt)
    }
}

fn replace_symlink(tgt: &Path, link: &Path) -> Result<()> {
    if link.is_symlink() {
        fs::remove_file(link)?;
    }
    symlink(tgt, link)
}

/// Symlink the given `link` to `tgt`; works for unix and windows.
pub fn symlink(tgt: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(tgt, link)?;

    #[cfg(windows)]
    if tgt.is_dir() {
        std::os::windows::fs::symlink_dir(tgt, link)?;
    } else {
        std::os::windows::fs::symlink_file(tgt, link)?;
    }
    Ok(())
}

/// Rename `src` to `tgt`, falling back to copy + delete when they are on different devices.
pub fn move_path(src: &Path, tgt: &Path) -> Result<()> {
    if let Err(e) = fs::rename(src, tgt) {
        log::debug!("rename {src:?} -> {tgt:?} failed ({e}); copying instead");
        copy(src, tgt, &[])?;
        if src.is_dir() && !src.is_symlink() {
            fs::remove_dir_all(src)?;
        } else {
            fs::remove_file(src)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_copy_file() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::write(&src, "text to copy")?;

        let tgt = dir.path().join("tgt");

        copy(&src, &tgt, &[])?;

        assert!(tgt.exists());
        assert_eq!(fs::read_to_string(&tgt)?, "text to copy");

        Ok(())
    }

    #[test]
    fn test_copy_dir_keeps_links() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src/_task_outputs/0");
        fs::create_dir_all(&src)?;
        let src_subdir = src.join("S1_A");
        fs::create_dir(&src_subdir)?;
        let file = src_subdir.join("web_summary.html");
        fs::write(&file, "summary")?;

        let dir_link = src.join("latest");
        symlink(&src_subdir, &dir_link)?;

        let external_link = src.join("external_link");
        symlink("/dev/null".as_ref(), &external_link)?;

        let tgt = dir.path().join("tgt");

        copy(&src, &tgt, &[])?;

        assert!(tgt.join("S1_A").is_dir());
        assert_eq!(fs::read_to_string(tgt.join("S1_A/web_summary.html"))?, "summary");

        let tgt_dir_link = tgt.join("latest");
        assert!(tgt_dir_link.is_symlink());
        assert_eq!(fs::read_link(&tgt_dir_link)?, tgt.join("S1_A"));

        let tgt_external_link = tgt.join("external_link");
        assert!(tgt_external_link.is_symlink());
        assert_eq!(&fs::read_link(&tgt_external_link)?, &Path::new("/dev/null"));

        Ok(())
    }

    #[test]
    fn test_copy_excludes_patterns_and_merges() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        let count = src.join("S1_A/count");
        fs::create_dir_all(&count)?;
        fs::write(count.join("sample_alignments.bam"), "bam")?;
        fs::write(count.join("sample_alignments.bam.bai"), "bai")?;
        fs::write(count.join("metrics_summary.csv"), "metrics")?;

        let tgt = dir.path().join("export");
        fs::create_dir_all(tgt.join("from_earlier_task"))?;

        let exclude = compile_patterns(&["*.bam", "*.bam.bai"])?;
        copy(&src, &tgt, &exclude)?;

        assert!(tgt.join("from_earlier_task").is_dir());
        assert!(tgt.join("S1_A/count/metrics_summary.csv").exists());
        assert!(!tgt.join("S1_A/count/sample_alignments.bam").exists());
        assert!(!tgt.join("S1_A/count/sample_alignments.bam.bai").exists());
        // the source is untouched:
        assert!(count.join("sample_alignments.bam").exists());
        Ok(())
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            compile_patterns(&["[unclosed"]),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_move_dir() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("S1_A/outs");
        fs::create_dir_all(src.join("per_sample_outs"))?;
        let tgt = dir.path().join("moved");

        move_path(&src, &tgt)?;

        assert!(!src.exists());
        assert!(tgt.join("per_sample_outs").is_dir());
        Ok(())
    }
}
