//! Hints for the OS permissions a global keyboard hook needs.
//!
//! Nothing here prompts: the capture daemon may run unattended, so the
//! hints go to the log when the hook cannot be installed.

use tracing::{error, warn};

/// Best-effort check whether this process may observe global key events.
pub fn has_input_permission() -> bool {
    #[cfg(target_os = "linux")]
    {
        linux_input_readable()
    }

    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}

#[cfg(target_os = "linux")]
fn linux_input_readable() -> bool {
    use std::path::Path;

    // Try to read from /dev/input/event0 as a test
    if Path::new("/dev/input/event0").exists() {
        return std::fs::File::open("/dev/input/event0").is_ok();
    }

    // If the device doesn't exist, check group membership
    std::process::Command::new("groups")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .is_some_and(|groups| groups.split_whitespace().any(|g| g == "input"))
}

/// Lines explaining how to grant keyboard access on this platform.
pub fn permission_hints() -> Vec<&'static str> {
    #[cfg(target_os = "macos")]
    {
        vec![
            "keyfold needs accessibility permissions to observe and synthesize keystrokes",
            "Open System Settings > Privacy & Security > Accessibility",
            "Enable the terminal or binary running `keyfold capture`",
            "On macOS 14 or newer, grant Input Monitoring as well",
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            "keyfold needs permission to read input devices",
            "Add your user to the 'input' group: sudo usermod -a -G input $USER",
            "Log out and back in for the group change to take effect",
            "Under Wayland, global hooks may be unavailable; an X11 session is required",
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            "keyfold monitors keyboard input to detect abbreviations",
            "Some antivirus programs block keyboard hooks; add an exception if capture fails",
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec!["Global keyboard hooks are not supported on this platform"]
    }
}

/// Log why the hook likely failed and how to fix it.
pub fn report_missing_permissions(reason: &str) {
    error!("Failed to install keyboard hook: {}", reason);
    if !has_input_permission() {
        warn!("Input devices are not readable by this user");
    }
    for hint in permission_hints() {
        warn!("{}", hint);
    }
}
