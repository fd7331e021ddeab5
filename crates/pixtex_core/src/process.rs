//! Wrappers of [`tokio::process::Command`].

use std::path::Path;
use std::process::Output;
use tokio::process::Command;

/// Builds [`Command`] from a cmd string which can use pipe.
pub fn shell_command(shell_cmd: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", shell_cmd]);
        cmd
    } else {
        let mut cmd = Command::new("bash");
        cmd.args(["-c", shell_cmd]);
        cmd
    }
}

/// Runs `shell_cmd` in `dir` and waits for the full output.
///
/// `output()` captures both pipes, the toolchain chatter must never leak
/// into the stdout shared with the editor.
pub async fn shell_output(shell_cmd: &str, dir: &Path) -> std::io::Result<Output> {
    shell_command(shell_cmd).current_dir(dir).output().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_output() {
        let dir = std::env::current_dir().unwrap();
        let output = shell_output("echo hello && echo world", &dir).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_shell_output_captures_stderr() {
        let dir = std::env::current_dir().unwrap();
        let output = shell_output("echo oops >&2 && exit 3", &dir).await.unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stderr), "oops\n");
    }
}
