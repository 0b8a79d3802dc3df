mod common;

use std::{process::ExitCode, sync::Arc};

use common::{FAKE_PID_BASE, Recorder, strings};
use strata::{
    child_control::Pid,
    config::{Config, ConfigError},
    desktop::Desktop,
    host::{Edges, Rectangle, WindowManagerTools as _, WindowSpecification, WindowState},
    keys::{InputEvent, KeyboardEvent, Keysym, Modifiers},
    shell::Shell,
};

fn config() -> Config {
    Config {
        shell_component: strings(&["panel --top"]),
        ctrl_alt: strings(&[
            "t:foot",
            "Page_Down:@workspace-down",
            "Page_Up:@workspace-up",
            "BackSpace:@exit",
        ]),
        shell_meta: strings(&["space:launcher"]),
        meta: strings(&["Left:@dock-left", "Up:@toggle-maximized"]),
        lockscreen_app: Some("swaylock -f".into()),
        ..Default::default()
    }
}

fn shell() -> (Shell<Desktop>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let desktop = Desktop::new(Rectangle::new(0, 0, 1000, 600));
    let shell = Shell::new(&config(), desktop, recorder.clone()).unwrap();
    (shell, recorder)
}

fn press(shell: &Shell<Desktop>, modifiers: Modifiers, key: &str) -> bool {
    let keysym = Keysym::from_name(key).unwrap();
    shell.input_event(&InputEvent::Keyboard(KeyboardEvent::down(modifiers, keysym)))
}

#[test]
fn shortcuts_drive_the_window_policy() {
    let (shell, _) = shell();
    let window = shell
        .policy()
        .invoke_under_lock(|policy| policy.handle_new_window(WindowSpecification::default()));

    assert!(press(&shell, Modifiers::META, "Left"));
    let info = shell
        .policy()
        .invoke_under_lock(|policy| policy.tools().info_for(window).unwrap());
    assert_eq!(info.state, WindowState::Attached);
    assert_eq!(info.attached_edges, Edges::LEFT);
    assert_eq!(info.size.width, 500);

    let first = shell
        .policy()
        .invoke_under_lock(|policy| policy.workspaces().active_workspace());
    assert!(press(&shell, Modifiers::CTRL_ALT | Modifiers::SHIFT, "Page_Down"));
    shell.policy().invoke_under_lock(|policy| {
        let workspaces = policy.workspaces();
        assert_ne!(workspaces.active_workspace(), first);
        // The carried window left the first workspace empty.
        assert_eq!(workspaces.workspaces(), [workspaces.active_workspace()]);
        assert_eq!(policy.tools().active_window(), Some(window));
    });
}

#[test]
fn launches_respect_privilege() {
    let (shell, recorder) = shell();
    assert!(press(&shell, Modifiers::CTRL_ALT, "t"));
    assert!(press(&shell, Modifiers::META, "space"));
    assert_eq!(recorder.commands(), [strings(&["foot"]), strings(&["launcher"])]);

    let control = shell.child_control();
    assert!(!control.is_shell_pid(Pid::from_raw(FAKE_PID_BASE + 1)));
    assert!(control.is_shell_pid(Pid::from_raw(FAKE_PID_BASE + 2)));
}

#[test]
fn ctrl_alt_delete_suspends_shortcuts() {
    let (shell, recorder) = shell();
    assert!(press(&shell, Modifiers::CTRL_ALT, "Delete"));
    assert!(!press(&shell, Modifiers::CTRL_ALT, "t"));
    assert!(!press(&shell, Modifiers::ALT, "Tab"));
    assert!(recorder.commands().is_empty());

    assert!(press(&shell, Modifiers::CTRL_ALT, "Delete"));
    assert!(press(&shell, Modifiers::CTRL_ALT, "t"));
    assert_eq!(recorder.commands().len(), 1);
}

#[test]
fn locked_sessions_ignore_input() {
    let (shell, recorder) = shell();
    shell.lockscreen().on_lock();
    assert_eq!(recorder.commands(), [strings(&["swaylock", "-f"])]);

    assert!(!press(&shell, Modifiers::CTRL_ALT, "t"));
    assert!(!press(&shell, Modifiers::CTRL_ALT, "Delete"));
    assert_eq!(recorder.commands().len(), 1);

    shell.lockscreen().on_unlock();
    assert!(press(&shell, Modifiers::CTRL_ALT, "t"));
}

#[test]
fn exit_waits_for_windows_to_close() {
    let (shell, _) = shell();
    let window = shell
        .policy()
        .invoke_under_lock(|policy| policy.handle_new_window(WindowSpecification::default()));
    let stop = shell.runner().stop_token();

    assert!(press(&shell, Modifiers::CTRL_ALT, "BackSpace"));
    assert!(!stop.is_cancelled());

    shell
        .policy()
        .invoke_under_lock(|policy| policy.handle_window_closed(window));
    assert!(press(&shell, Modifiers::CTRL_ALT, "BackSpace"));
    assert!(stop.is_cancelled());
}

#[test]
fn invalid_bindings_are_fatal() {
    let config = Config {
        alt: strings(&["NoSuchKey:foot"]),
        ..Default::default()
    };
    let result = Shell::new(&config, Desktop::default(), Arc::new(Recorder::default()));
    assert!(matches!(result, Err(ConfigError::UnrecognisedKey(key)) if key == "NoSuchKey"));
}

#[tokio::test]
async fn running_launches_shell_components() {
    let (shell, recorder) = shell();
    let stop = shell.runner().stop_token();
    shell.runner().add_start_callback(move || stop.cancel());

    assert_eq!(shell.run().await, ExitCode::SUCCESS);
    assert_eq!(recorder.commands(), [strings(&["panel", "--top"])]);
    // Stopping forgets every tracked child.
    assert!(!shell.child_control().is_shell_pid(Pid::from_raw(FAKE_PID_BASE + 1)));
}
