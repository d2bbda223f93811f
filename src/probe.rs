use std::ffi::OsStr;
use std::path::Path;

/// Whether `program` can be found anywhere under a directory listed in `PATH`.
pub fn system_has(program: &str) -> bool {
    match std::env::var_os("PATH") {
        Some(paths) => has_in_paths(program, &paths),
        None => false,
    }
}

/// Same as [`system_has`] but against an explicit `PATH`-style list.
///
/// Directories are searched recursively, so a program installed under
/// `<dir>/<sub>/<program>` also counts. Errors while reading a directory are
/// treated as "not found".
pub fn has_in_paths(program: &str, paths: &OsStr) -> bool {
    if program.is_empty() {
        return false;
    }

    for dir in std::env::split_paths(paths) {
        if !dir.is_dir() {
            continue;
        }
        if dir.join(program).exists() || search_dir(&dir, program) {
            log::debug!("found {} under {}", program, dir.display());
            return true;
        }
    }

    log::debug!("{} not found in PATH", program);
    false
}

fn search_dir(dir: &Path, program: &str) -> bool {
    let pattern = format!(
        "{}/**/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(program)
    );

    match glob::glob(&pattern) {
        Ok(entries) => entries.filter_map(Result::ok).next().is_some(),
        Err(e) => {
            log::debug!("bad search pattern {}: {}", pattern, e);
            false
        }
    }
}
