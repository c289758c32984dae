//! Detection of ttys held open by other processes
//!
//! Walks `/proc/<pid>/fd` and counts descriptors linking to the device node.
//! Processes whose descriptors cannot be listed (permissions, exit races)
//! are skipped.

use std::fs;
use std::path::Path;

use tracing::trace;

/// Default procfs mount point
pub const PROC_ROOT: &str = "/proc";

/// Number of open file descriptors referring to `device`
pub fn count_openers(proc_root: &Path, device: &Path) -> u32 {
    let Ok(entries) = fs::read_dir(proc_root) else {
        return 0;
    };

    let mut openers = 0;
    for entry in entries.flatten() {
        let is_pid = entry
            .file_name()
            .to_str()
            .is_some_and(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
        if !is_pid {
            continue;
        }

        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        for fd in fds.flatten() {
            if fs::read_link(fd.path()).is_ok_and(|target| target == device) {
                trace!("{} held open by pid {:?}", device.display(), entry.file_name());
                openers += 1;
            }
        }
    }
    openers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_links_to_device() {
        let root = std::env::temp_dir().join(format!("uart-detect-proc-{}", std::process::id()));
        let fd_dir = root.join("1234").join("fd");
        fs::create_dir_all(&fd_dir).unwrap();
        fs::create_dir_all(root.join("self-not-a-pid").join("fd")).unwrap();
        std::os::unix::fs::symlink("/dev/ttyS1", fd_dir.join("3")).unwrap();
        std::os::unix::fs::symlink("/dev/ttyS1", fd_dir.join("4")).unwrap();
        std::os::unix::fs::symlink("/dev/null", fd_dir.join("5")).unwrap();

        assert_eq!(count_openers(&root, Path::new("/dev/ttyS1")), 2);
        assert_eq!(count_openers(&root, Path::new("/dev/ttyS2")), 0);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_proc_is_idle() {
        assert_eq!(
            count_openers(Path::new("/nonexistent/proc"), Path::new("/dev/ttyS0")),
            0
        );
    }
}
