//! Login autostart
//!
//! An XDG autostart desktop entry naming the current executable. The entry
//! is rewritten at startup when the binary has moved since it was created,
//! so autostart keeps working after the user relocates the install.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::paths;

fn entry_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("autostart");
    path.push(paths::AUTOSTART_FILENAME);
    path
}

fn desktop_entry(exec: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Scamper\n\
         Comment=Desktop pet overlay\n\
         Exec={}\n\
         X-GNOME-Autostart-enabled=true\n",
        exec.display()
    )
}

fn write_entry(path: &Path, exec: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create autostart directory: {}", parent.display()))?;
    }
    fs::write(path, desktop_entry(exec))
        .context(format!("Failed to write autostart entry: {}", path.display()))?;
    Ok(())
}

fn remove_entry(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).context(format!("Failed to remove autostart entry: {}", path.display())),
    }
}

/// Executable path recorded in an existing entry, if any
fn recorded_exec(path: &Path) -> Option<PathBuf> {
    let contents = fs::read_to_string(path).ok()?;
    contents
        .lines()
        .find_map(|line| line.strip_prefix("Exec="))
        .map(PathBuf::from)
}

/// Create or remove the autostart entry for the current executable
pub fn set(enable: bool) -> Result<()> {
    let path = entry_path();
    if enable {
        let exec = std::env::current_exe().context("Failed to resolve current executable")?;
        write_entry(&path, &exec)?;
        info!(path = %path.display(), "autostart enabled");
    } else {
        remove_entry(&path)?;
        info!(path = %path.display(), "autostart disabled");
    }
    Ok(())
}

/// Rewrite a stale entry when the executable moved. Only acts when the
/// config says autostart should be on.
pub fn check_and_fix(auto_startup: bool) {
    if !auto_startup {
        return;
    }
    let path = entry_path();
    let Ok(current) = std::env::current_exe() else {
        return;
    };
    match recorded_exec(&path) {
        Some(recorded) if recorded != current => {
            info!(old = %recorded.display(), new = %current.display(), "executable moved, updating autostart entry");
            if let Err(err) = write_entry(&path, &current) {
                warn!(error = %err, "failed to repair autostart entry");
            }
        }
        Some(_) => {}
        None => {
            // Config says on but no entry exists (first run after an upgrade,
            // or the user deleted it); recreate.
            if let Err(err) = write_entry(&path, &current) {
                warn!(error = %err, "failed to recreate autostart entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn entry_names_the_executable() {
        let entry = desktop_entry(Path::new("/opt/scamper/scamper"));
        assert!(entry.contains("Exec=/opt/scamper/scamper"));
        assert!(entry.starts_with("[Desktop Entry]"));
    }

    #[test]
    fn write_and_read_back_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autostart").join("scamper.desktop");
        write_entry(&path, Path::new("/usr/bin/scamper")).unwrap();
        assert_eq!(
            recorded_exec(&path),
            Some(PathBuf::from("/usr/bin/scamper"))
        );
    }

    #[test]
    fn removing_a_missing_entry_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scamper.desktop");
        assert!(remove_entry(&path).is_ok());
    }

    #[test]
    fn recorded_exec_ignores_other_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scamper.desktop");
        fs::write(&path, "[Desktop Entry]\nName=Scamper\n").unwrap();
        assert_eq!(recorded_exec(&path), None);
    }
}
