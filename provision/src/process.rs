//! Subprocess cleanup utilities shared by the installer.

/// RAII guard that kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned `tokio::process::Child` immediately after `spawn()` so the
/// process dies if the owning future is cancelled. Call `disarm()` after the
/// process exits normally to prevent the kill.
pub(crate) struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    pub(crate) fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    pub(crate) fn child_mut(&mut self) -> &mut tokio::process::Child {
        self.child.as_mut().expect("child present")
    }

    pub(crate) fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        terminate(child);
        let _ = child.try_wait();
    }
}

/// Kill a child, taking its whole process group down on Unix so a
/// shell-spawned `cargo` dies with its parent shell.
pub(crate) fn terminate(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall on a pid we own; failure falls through to start_kill.
        unsafe {
            if libc::killpg(pid as i32, libc::SIGKILL) != -1 {
                return;
            }
        }
    }
    let _ = child.start_kill();
}

/// Put the child process in its own session (Unix only) so the entire process
/// group can be killed via `killpg`.
#[cfg(unix)]
pub(crate) fn set_new_session(cmd: &mut tokio::process::Command) {
    use std::os::unix::process::CommandExt;

    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            // Linux-only: the install child should not outlive a crashed shell.
            #[cfg(target_os = "linux")]
            unsafe {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
            }
            Ok(())
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn new_session_child_leads_its_own_group() {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg("sleep 30").kill_on_drop(true);
        set_new_session(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id().unwrap() as i32;

        // setsid runs in the child between fork and exec; poll until it has.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let pgid = unsafe { libc::getpgid(pid) };
            if pgid == pid {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "child never became its own process-group leader"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        terminate(&mut child);
        let _ = child.wait().await;
    }
}
