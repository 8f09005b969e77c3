// ============================================================================
// intercut-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: ffmpeg and ffprobe
//
// Everything that talks to a process outside this crate lives here: locating
// the tool binaries, probing media with ffprobe, and spawning/controlling the
// ffmpeg transcode. Each concern sits behind a trait so the supervisor can be
// driven by the in-memory doubles in `mocks` during tests.
//
// KEY COMPONENTS:
// - resolve_tool / check_dependency: binary discovery
// - FfprobeExecutor: duration and media summary probes
// - ProcessSpawner / TranscodeProcess / ProcessControl: the child process

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult, command_start_error};

// ---- Standard library imports ----
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

// ============================================================================
// SUBMODULES
// ============================================================================

/// Spawning and signalling the ffmpeg transcode.
pub mod ffmpeg_executor;

/// Duration and media summary probes.
pub mod ffprobe_executor;

/// In-memory doubles for ffmpeg and ffprobe.
#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use ffmpeg_executor::{
    ProcessControl, ProcessExit, ProcessSpawner, SidecarSpawner, TranscodeProcess,
};
pub use ffprobe_executor::{CrateFfprobeExecutor, FfprobeExecutor, MediaSummary};

// ============================================================================
// TOOL RESOLUTION
// ============================================================================

/// Directory next to the executable that may hold bundled tool binaries.
const BUNDLED_TOOLS_DIR: &str = "assets";

/// Locates an external tool binary.
///
/// Resolution order:
/// 1. the environment variable `env_key`, when set and non-empty
/// 2. `assets/<name>` next to the running executable, when that file exists
/// 3. the bare `name`, left for the OS to resolve through `PATH`
#[must_use]
pub fn resolve_tool(name: &str, env_key: &str) -> PathBuf {
    if let Ok(value) = env::var(env_key) {
        if !value.trim().is_empty() {
            log::debug!("Using {name} from {env_key}: {value}");
            return PathBuf::from(value);
        }
    }

    if let Some(bundled) = bundled_tool_path(name) {
        log::debug!("Using bundled {name}: {}", bundled.display());
        return bundled;
    }

    PathBuf::from(name)
}

fn bundled_tool_path(name: &str) -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let candidate = exe
        .parent()?
        .join(BUNDLED_TOOLS_DIR)
        .join(format!("{name}{}", env::consts::EXE_SUFFIX));
    candidate.is_file().then_some(candidate)
}

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that an external tool can be started.
///
/// Runs `<tool> -version` with its output discarded.
///
/// # Returns
///
/// * `Ok(())` - The tool started
/// * `Err(CoreError::DependencyNotFound)` - Nothing was found at `tool`
/// * `Err(CoreError::ProcessSpawn)` - The tool exists but could not be started
pub fn check_dependency(tool: &Path) -> CoreResult<()> {
    let result = Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found dependency: {}", tool.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Dependency '{}' not found.", tool.display());
            Err(CoreError::DependencyNotFound(tool.display().to_string()))
        }
        Err(e) => {
            log::error!(
                "Failed to start dependency check for '{}': {}",
                tool.display(),
                e
            );
            Err(command_start_error(tool.display().to_string(), e))
        }
    }
}
