use super::*;

#[test]
fn platform_tools() {
    let mac = Clipboard::for_os("macos").expect("macos is supported");
    assert_eq!(mac.read, ToolCommand::new("pbpaste", &[]));
    assert_eq!(mac.write, ToolCommand::new("pbcopy", &[]));

    let linux = Clipboard::for_os("linux").expect("linux is supported");
    assert_eq!(linux.read.program, "xclip");
    assert_eq!(linux.read.args, vec!["-selection", "clipboard", "-o"]);

    let windows = Clipboard::for_os("windows").expect("windows is supported");
    assert!(windows.strip_trailing_newline);
    assert!(windows.write.args.iter().all(|arg| !arg.contains("{}")));
}

#[test]
fn unsupported_platform() {
    let err = Clipboard::for_os("haiku").expect_err("haiku is not supported");
    assert!(matches!(
        err.downcast_ref::<DeckError>(),
        Some(DeckError::Clipboard(_))
    ));
}

#[test]
fn missing_tool_is_a_clipboard_error() {
    let clipboard = Clipboard::with_commands(
        ToolCommand::new("/nonexistent/paste-tool", &[]),
        ToolCommand::new("/nonexistent/copy-tool", &[]),
    );

    for err in [
        clipboard.get().expect_err("read should fail"),
        clipboard.set("text").expect_err("write should fail"),
    ] {
        assert!(matches!(
            err.downcast_ref::<DeckError>(),
            Some(DeckError::Clipboard(_))
        ));
    }
}

#[cfg(unix)]
mod shell_tools {
    use super::*;
    use tempfile::TempDir;

    fn file_clipboard(temp: &TempDir) -> Clipboard {
        let file = temp.path().join("clipboard");
        let file = file.to_string_lossy();
        Clipboard::with_commands(
            ToolCommand::new("sh", &["-c", &format!("cat '{}'", file)]),
            ToolCommand::new("sh", &["-c", &format!("cat > '{}'", file)]),
        )
    }

    #[test]
    fn set_then_get() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let clipboard = file_clipboard(&temp);

        let text = "quotes \" and $dollars and\nnewlines\n";
        clipboard.set(text).expect("set should succeed");
        assert_eq!(clipboard.get().expect("get should succeed"), text);
    }

    #[test]
    fn trailing_newline_stripping() {
        let mut clipboard = Clipboard::with_commands(
            ToolCommand::new("printf", &["line one\\nline two\\r\\n"]),
            ToolCommand::new("true", &[]),
        );
        assert_eq!(clipboard.get().expect("get"), "line one\nline two\r\n");

        clipboard.strip_trailing_newline = true;
        assert_eq!(clipboard.get().expect("get"), "line one\nline two");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let clipboard = Clipboard::with_commands(
            ToolCommand::new("sh", &["-c", "echo 'no display' >&2; exit 1"]),
            ToolCommand::new("sh", &["-c", "cat > /dev/null; exit 2"]),
        );

        let err = clipboard.get().expect_err("read should fail");
        assert!(err.to_string().contains("no display"));
        assert!(clipboard.set("text").is_err());
    }
}
