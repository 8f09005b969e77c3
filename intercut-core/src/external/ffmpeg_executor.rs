// ============================================================================
// intercut-core/src/external/ffmpeg_executor.rs
// ============================================================================
//
// FFMPEG EXECUTOR: Transcode Process Management and Abstraction
//
// The supervisor owns exactly one child process per job. It reads the child's
// stdout itself, but pause/resume/cancel arrive on other threads, so the
// process is split in two:
//
// - TranscodeProcess: the owned side (pipes, exit status), held by the worker
// - ProcessControl: a shareable capability {suspend, resume, terminate, kill}
//
// SidecarSpawner is the production implementation on top of ffmpeg-sidecar.
// On unix the control side uses SIGSTOP/SIGCONT/SIGTERM via libc. Elsewhere
// suspend/resume are no-ops (the supervisor stops draining stdout while
// paused, which stalls the encoder on pipe back-pressure) and terminate asks
// ffmpeg to quit through its stdin.

use crate::error::{CoreError, CoreResult, command_start_error, command_wait_error};
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use std::io::{Read, Write};
use std::path::Path;
use std::process::ChildStdin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

// --- Process abstraction ---

/// Exit status of a finished transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was ended by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Control operations that may be invoked from any thread.
pub trait ProcessControl: Send + Sync {
    /// Stops the process from executing.
    fn suspend(&self) -> CoreResult<()>;

    /// Lets a suspended process continue.
    fn resume(&self) -> CoreResult<()>;

    /// Asks the process to exit. A suspended process must still be able to
    /// act on the request.
    fn terminate(&self) -> CoreResult<()>;

    /// Ends the process immediately.
    fn kill(&self) -> CoreResult<()>;
}

/// The worker-owned side of a running transcode.
pub trait TranscodeProcess: Send {
    /// Takes the progress stream. Returns `None` on the second call.
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Takes the diagnostic stream. Returns `None` on the second call.
    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Returns the shareable control capability.
    fn control(&self) -> Arc<dyn ProcessControl>;

    /// Returns the exit status if the process has finished.
    fn try_wait(&mut self) -> CoreResult<Option<ProcessExit>>;
}

/// Something that can start a transcode.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> CoreResult<Box<dyn TranscodeProcess>>;
}

// --- ffmpeg-sidecar implementation ---

/// Spawns ffmpeg through `ffmpeg-sidecar`.
#[derive(Debug, Clone, Default)]
pub struct SidecarSpawner;

impl ProcessSpawner for SidecarSpawner {
    fn spawn(&self, program: &Path, args: &[String]) -> CoreResult<Box<dyn TranscodeProcess>> {
        let mut cmd = FfmpegCommand::new_with_path(program);
        cmd.hide_banner().args(args);
        log::debug!("Spawning ffmpeg: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| command_start_error(program.display().to_string(), e))?;

        let stdout = child.take_stdout();
        let stderr = child.take_stderr();
        let stdin = child.take_stdin();
        let pid = child.as_inner().id();
        log::debug!("ffmpeg started with pid {pid}");

        let control = Arc::new(SidecarControl {
            child: Mutex::new(child),
            pid,
            stdin: Mutex::new(stdin),
            exited: AtomicBool::new(false),
        });

        Ok(Box::new(SidecarProcess {
            control,
            stdout: stdout.map(|s| Box::new(s) as Box<dyn Read + Send>),
            stderr: stderr.map(|s| Box::new(s) as Box<dyn Read + Send>),
        }))
    }
}

/// Running ffmpeg child spawned by [`SidecarSpawner`].
pub struct SidecarProcess {
    control: Arc<SidecarControl>,
    stdout: Option<Box<dyn Read + Send>>,
    stderr: Option<Box<dyn Read + Send>>,
}

impl TranscodeProcess for SidecarProcess {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stderr.take()
    }

    fn control(&self) -> Arc<dyn ProcessControl> {
        self.control.clone()
    }

    fn try_wait(&mut self) -> CoreResult<Option<ProcessExit>> {
        let status = self
            .control
            .lock_child()?
            .as_inner_mut()
            .try_wait()
            .map_err(|e| command_wait_error("ffmpeg", e))?;

        Ok(status.map(|status| {
            self.control.exited.store(true, Ordering::SeqCst);
            ProcessExit {
                code: status.code(),
            }
        }))
    }
}

/// Control capability for a sidecar-spawned ffmpeg.
pub struct SidecarControl {
    child: Mutex<FfmpegChild>,
    #[cfg_attr(not(unix), allow(dead_code))]
    pid: u32,
    stdin: Mutex<Option<ChildStdin>>,
    exited: AtomicBool,
}

impl SidecarControl {
    fn lock_child(&self) -> CoreResult<MutexGuard<'_, FfmpegChild>> {
        self.child
            .lock()
            .map_err(|_| CoreError::Supervisor("ffmpeg child lock poisoned".to_string()))
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Writes ffmpeg's interactive quit command.
    fn request_quit(&self) -> CoreResult<()> {
        let mut guard = self.stdin.lock().map_err(|_| CoreError::ProcessControl {
            action: "terminate",
            reason: "stdin lock poisoned".to_string(),
        })?;
        if let Some(mut stdin) = guard.take() {
            // Dropping stdin afterwards closes the pipe, which ffmpeg also
            // treats as a quit request.
            if let Err(e) = stdin.write_all(b"q\n").and_then(|()| stdin.flush()) {
                log::debug!("Could not write quit command to ffmpeg: {e}");
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn signal(&self, action: &'static str, signal: libc::c_int) -> CoreResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        let pid = libc::pid_t::try_from(self.pid).map_err(|_| CoreError::ProcessControl {
            action,
            reason: format!("pid {} out of range", self.pid),
        })?;
        // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs
        // to a child this process has not yet reaped.
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            log::debug!("Sent {action} signal to ffmpeg (pid {pid})");
            Ok(())
        } else {
            Err(CoreError::ProcessControl {
                action,
                reason: std::io::Error::last_os_error().to_string(),
            })
        }
    }
}

#[cfg(unix)]
impl ProcessControl for SidecarControl {
    fn suspend(&self) -> CoreResult<()> {
        self.signal("suspend", libc::SIGSTOP)
    }

    fn resume(&self) -> CoreResult<()> {
        self.signal("resume", libc::SIGCONT)
    }

    fn terminate(&self) -> CoreResult<()> {
        self.signal("terminate", libc::SIGTERM)?;
        // A stopped process only acts on SIGTERM once it runs again.
        self.signal("resume", libc::SIGCONT)?;
        self.request_quit()
    }

    fn kill(&self) -> CoreResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.lock_child()?.kill().map_err(|e| CoreError::ProcessControl {
            action: "kill",
            reason: e.to_string(),
        })
    }
}

#[cfg(not(unix))]
impl ProcessControl for SidecarControl {
    fn suspend(&self) -> CoreResult<()> {
        log::debug!("No suspend signal on this platform; relying on stdout back-pressure");
        Ok(())
    }

    fn resume(&self) -> CoreResult<()> {
        Ok(())
    }

    fn terminate(&self) -> CoreResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.request_quit()
    }

    fn kill(&self) -> CoreResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        self.lock_child()?.kill().map_err(|e| CoreError::ProcessControl {
            action: "kill",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exit_success() {
        assert!(ProcessExit { code: Some(0) }.success());
        assert!(!ProcessExit { code: Some(1) }.success());
        assert!(!ProcessExit { code: None }.success());
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let result = SidecarSpawner.spawn(
            Path::new("/nonexistent/intercut/ffmpeg"),
            &["-version".to_string()],
        );
        assert!(matches!(result, Err(CoreError::ProcessSpawn(_, _))));
    }
}
