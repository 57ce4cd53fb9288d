//! Throwaway shell-script plugins for exercising the real process invoker.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

/// Directory of executable plugin scripts removed on drop.
pub(crate) struct PluginDir {
    dir: TempDir,
}

impl PluginDir {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("failed to allocate plugin directory");
        Self { dir }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an executable `/bin/sh` script named `name`.
    ///
    /// A helper shell writes the file so this process never holds a writable
    /// descriptor for it. Children forked by concurrent tests would inherit
    /// such a descriptor until they exec, and executing the script meanwhile
    /// fails with `ETXTBSY`.
    pub(crate) fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut writer = Command::new("/bin/sh")
            .args(["-c", r#"cat > "$1" && chmod 755 "$1""#, "sh"])
            .arg(&path)
            .stdin(Stdio::piped())
            .spawn()
            .unwrap_or_else(|error| panic!("failed to start writer for {path:?}: {error}"));
        writer
            .stdin
            .take()
            .expect("writer stdin")
            .write_all(format!("#!/bin/sh\n{body}\n").as_bytes())
            .unwrap_or_else(|error| panic!("failed to write plugin {path:?}: {error}"));
        let status = writer
            .wait()
            .unwrap_or_else(|error| panic!("failed to wait for writer of {path:?}: {error}"));
        assert!(status.success(), "writer for {path:?} exited with {status}");
        path
    }

    /// Writes a file that is not executable.
    pub(crate) fn inert(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n")
            .unwrap_or_else(|error| panic!("failed to write file {path:?}: {error}"));
        set_mode(&path, 0o644);
        path
    }
}

fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .unwrap_or_else(|error| panic!("failed to chmod {path:?}: {error}"));
}
