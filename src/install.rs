use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Copy the contents of `from` into `to`, like `cp -a from/. to`.
///
/// Symlinks are recreated rather than followed. Regular files keep their
/// permissions and modification time.
pub fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    if !from.is_dir() {
        anyhow::bail!("{} is not a directory", from.display());
    }
    fs::create_dir_all(to).with_context(|| format!("cannot create {}", to.display()))?;

    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("cannot create {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }

    log::debug!("copied {} entries from {} to {}", copied, from.display(), to.display());
    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    // A previous install may have left a read-only file or a link here.
    if to.symlink_metadata().is_ok() {
        fs::remove_file(to).with_context(|| format!("cannot replace {}", to.display()))?;
    }

    let mut source = File::open(from).with_context(|| format!("cannot open {}", from.display()))?;
    let metadata = source.metadata()?;
    let mut dest = File::create(to).with_context(|| format!("cannot create {}", to.display()))?;
    io::copy(&mut source, &mut dest)
        .with_context(|| format!("cannot copy {} to {}", from.display(), to.display()))?;
    dest.set_modified(metadata.modified()?)?;
    drop(dest);

    // Permissions last, so a read-only source does not lock us out of the copy.
    fs::set_permissions(to, metadata.permissions())
        .with_context(|| format!("cannot set permissions on {}", to.display()))?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let link = fs::read_link(from)?;
    if to.symlink_metadata().is_ok() {
        fs::remove_file(to)?;
    }
    std::os::unix::fs::symlink(&link, to)
        .with_context(|| format!("cannot link {} -> {}", to.display(), link.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    copy_file(from, to)
}
