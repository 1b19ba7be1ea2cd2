use crate::env::ExecContext;
use std::path::{Path, PathBuf};

/// Split a `PATH`-style value into directories, dropping empty entries.
pub fn split_search_path(value: &str) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect()
}

/// Resolve a command name to an executable file, the way a typical shell would.
///
/// - A name containing `/` is a literal path (relative names are taken from the
///   cwd) and is used as is when it is an executable file.
/// - A bare name is looked up in each search-path directory in order; the
///   first executable match wins. Relative directories are taken from the cwd.
/// - An empty name resolves to nothing.
pub fn locate(name: &str, ctx: &ExecContext) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') {
        let path = ctx.cwd.join(name);
        return is_executable(&path).then_some(path);
    }

    ctx.search_path
        .iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| ctx.cwd.join(dir).join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ctx_with_path(cwd: &Path, dirs: &[&Path]) -> ExecContext {
        ExecContext::new(cwd).with_search_path(dirs.iter().map(|d| d.to_path_buf()).collect())
    }

    #[cfg(unix)]
    fn make_file(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\n").expect("write file");
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_executable() {
        let ctx = ctx_with_path(Path::new("/"), &[]);
        assert_eq!(locate("/bin/sh", &ctx), Some(PathBuf::from("/bin/sh")));
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        let ctx = ctx_with_path(Path::new("/"), &[Path::new("/bin")]);
        assert_eq!(locate("/bin/nonexisting", &ctx), None);
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let ctx = ctx_with_path(Path::new("/"), &[Path::new("/bin")]);
        let found = locate("sh", &ctx).expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, PathBuf::from("/bin/sh"));
    }

    #[test]
    #[cfg(unix)]
    fn first_match_in_order_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_file(&first.path().join("tool"), 0o755);
        make_file(&second.path().join("tool"), 0o755);

        let ctx = ctx_with_path(Path::new("/"), &[first.path(), second.path()]);
        assert_eq!(locate("tool", &ctx), Some(first.path().join("tool")));
    }

    #[test]
    #[cfg(unix)]
    fn non_executable_files_are_skipped() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_file(&first.path().join("tool"), 0o644);
        make_file(&second.path().join("tool"), 0o755);

        let ctx = ctx_with_path(Path::new("/"), &[first.path(), second.path()]);
        assert_eq!(locate("tool", &ctx), Some(second.path().join("tool")));
    }

    #[test]
    #[cfg(unix)]
    fn directories_are_not_programs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("tool")).unwrap();
        let ctx = ctx_with_path(Path::new("/"), &[dir.path()]);
        assert_eq!(locate("tool", &ctx), None);
    }

    #[test]
    #[cfg(unix)]
    fn relative_path_is_taken_from_cwd() {
        let cwd = TempDir::new().unwrap();
        fs::create_dir(cwd.path().join("bin")).unwrap();
        make_file(&cwd.path().join("bin").join("run"), 0o755);

        let ctx = ctx_with_path(cwd.path(), &[]);
        assert_eq!(locate("bin/run", &ctx), Some(cwd.path().join("bin/run")));
        assert_eq!(locate("./bin/run", &ctx), Some(cwd.path().join("./bin/run")));
        assert_eq!(locate("run", &ctx), None);
    }

    #[test]
    fn single_component_not_found_in_path() {
        let ctx = ctx_with_path(Path::new("/"), &[Path::new("/bin")]);
        assert_eq!(locate("nonexisting-command-xyz", &ctx), None);
    }

    #[test]
    fn empty_name_is_none() {
        let ctx = ctx_with_path(Path::new("/"), &[Path::new("/bin")]);
        assert_eq!(locate("", &ctx), None);
    }

    #[test]
    fn split_skips_empty_entries() {
        assert_eq!(
            split_search_path(":/a::/b:"),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(split_search_path("").is_empty());
    }
}
