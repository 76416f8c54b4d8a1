use super::*;

#[test]
fn xml_escaping() {
    assert_eq!(
        escape_xml(r#"Tom & "Jerry" <3 it's"#),
        "Tom &amp; &quot;Jerry&quot; &lt;3 it&apos;s"
    );
    assert_eq!(escape_xml("plain"), "plain");
}

#[test]
fn applescript_escaping() {
    assert_eq!(
        escape_applescript(r#"say "hi" \ bye"#),
        r#"say \"hi\" \\ bye"#
    );
}

#[test]
fn toast_script_cannot_break_out_of_the_here_string() {
    let script = toast_script("Backup", "'@\nRemove-Item C:\\ -Recurse");
    assert!(script.contains("<text>Backup</text>"));
    assert!(script.contains("<text>&apos;@\nRemove-Item C:\\ -Recurse</text>"));
    assert_eq!(script.matches("'@").count(), 1);
}

#[test]
fn commands_per_platform() {
    let linux = notification_command("linux", "Title", "Body").expect("linux tool");
    assert_eq!(linux, ToolCommand::new("notify-send", &["Title", "Body"]));

    let mac = notification_command("macos", "Git \"Status\"", "Clean").expect("macos tool");
    assert_eq!(mac.program, "osascript");
    assert_eq!(
        mac.args,
        vec![
            "-e",
            r#"display notification "Clean" with title "Git \"Status\"""#
        ]
    );

    let windows = notification_command("windows", "T", "M").expect("windows tool");
    assert_eq!(windows.program, "powershell");
    assert_eq!(windows.args.len(), 3);

    assert!(notification_command("freebsd", "T", "M").is_none());
}

#[test]
fn showing_never_panics_without_a_notifier() {
    // notify-send is usually absent on CI; the failure is only logged
    show_notification("Test", "Nothing to see here");
}
