//! Small process-related helpers shared across the workspace.
//!
//! Every external tool invocation in vidflow is a single shell command string,
//! so the helpers here build a platform shell command around that string.

#[cfg(feature = "tokio")]
use std::ffi::OsStr;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Shell used to interpret command strings on this platform.
#[cfg(windows)]
pub const SHELL: (&str, &str) = ("cmd", "/C");

/// Shell used to interpret command strings on this platform.
#[cfg(not(windows))]
pub const SHELL: (&str, &str) = ("sh", "-c");

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Create a `tokio::process::Command` that runs `command_line` through the platform shell.
///
/// stdin is closed so tools that would otherwise prompt (ffmpeg overwrite
/// confirmation, for one) fail fast instead of hanging the queue.
#[cfg(feature = "tokio")]
pub fn tokio_shell_command(command_line: &str) -> tokio::process::Command {
    let (shell, flag) = SHELL;
    let mut cmd = tokio_command(shell);
    cmd.args([flag, command_line]);
    cmd.stdin(std::process::Stdio::null());
    cmd
}

/// Quote a single argument for inclusion in a shell command string.
///
/// Paths in the pipeline routinely contain spaces, so every interpolated
/// path goes through here.
pub fn shell_quote(arg: &str) -> String {
    #[cfg(windows)]
    {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
    #[cfg(not(windows))]
    {
        let plain =
            |c: char| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '=');
        if !arg.is_empty() && arg.chars().all(plain) {
            return arg.to_string();
        }
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
