// Desktop notifications
// Showing a notification never fails the calling script

#[cfg(test)]
mod tests;

use std::process::Command;
use tracing::{debug, warn};

use crate::clipboard::ToolCommand;

const APP_ID: &str = "Stream Deck Automation";

/// Show a desktop notification, falling back to stdout where no
/// notification tool is known. Failures are logged and otherwise ignored.
#[inline]
pub fn show_notification(title: &str, message: &str) {
    let Some(tool) = notification_command(std::env::consts::OS, title, message) else {
        println!("{}: {}", title, message);
        return;
    };

    debug!("Notification via {}: {}", tool.program, title);
    match Command::new(&tool.program).args(&tool.args).output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => warn!(
            "{} exited with {}: {}",
            tool.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => warn!("Could not show notification with {}: {}", tool.program, e),
    }
}

/// The command that shows a notification on `os`, if there is one
#[inline]
pub fn notification_command(os: &str, title: &str, message: &str) -> Option<ToolCommand> {
    match os {
        "windows" => Some(ToolCommand::new(
            "powershell",
            &["-NoProfile", "-Command", &toast_script(title, message)],
        )),
        "macos" => {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(message),
                escape_applescript(title)
            );
            Some(ToolCommand::new("osascript", &["-e", &script]))
        }
        "linux" => Some(ToolCommand::new("notify-send", &[title, message])),
        _ => None,
    }
}

/// PowerShell that raises a toast. The text sits in a single-quoted
/// here-string, so XML escaping is all it needs.
#[inline]
pub fn toast_script(title: &str, message: &str) -> String {
    format!(
        r#"[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
[Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null
$template = @'
<toast><visual><binding template="ToastGeneric"><text>{}</text><text>{}</text></binding></visual></toast>
'@
$xml = New-Object Windows.Data.Xml.Dom.XmlDocument
$xml.LoadXml($template)
$toast = New-Object Windows.UI.Notifications.ToastNotification $xml
[Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier("{}").Show($toast)"#,
        escape_xml(title),
        escape_xml(message),
        APP_ID
    )
}

#[inline]
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape text for an AppleScript string literal
#[inline]
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
