//! Wires the configured pieces of a session together.

use std::{process::ExitCode, sync::Arc};

use crate::{
    child_control::{ChildControl, Launch},
    commands::{CommandState, ShellCommands},
    config::{Config, ConfigError, SESSION_SHUTDOWN_VAR, SESSION_STARTUP_VAR},
    host::WindowManagerTools,
    keys::InputEvent,
    policy::{PolicyHandle, WindowManagerPolicy},
    runner::Runner,
    session::LockScreen,
    workspaces::LogHooks,
};

pub struct Shell<T> {
    runner: Arc<Runner>,
    child_control: ChildControl,
    commands: Arc<ShellCommands>,
    policy: PolicyHandle<T>,
    lockscreen: LockScreen,
}

impl<T: WindowManagerTools + Send + 'static> Shell<T> {
    pub fn new(config: &Config, tools: T, launcher: Arc<dyn Launch>) -> Result<Self, ConfigError> {
        let bindings = config.bindings()?;
        let components = config.shell_components()?;
        let lockscreen_command = config.lockscreen_command()?;

        let runner = Arc::new(Runner::new());
        let child_control = ChildControl::new(launcher);
        child_control.register_with(&runner);

        let state = Arc::new(CommandState::default());
        let commands = Arc::new(ShellCommands::new(
            state.clone(),
            runner.stop_token(),
            child_control.clone(),
            bindings,
        ));
        let policy = PolicyHandle::new(WindowManagerPolicy::new(tools, state, Box::new(LogHooks)));
        commands.init_window_manager(Arc::new(policy.clone()));

        runner.add_start_callback({
            let child_control = child_control.clone();
            move || {
                for component in components {
                    child_control.launch_shell(component);
                }
            }
        });

        runner.add_start_callback({
            let child_control = child_control.clone();
            move || run_session_hook(&child_control, SESSION_STARTUP_VAR)
        });
        runner.add_stop_callback({
            let child_control = child_control.clone();
            move || run_session_hook(&child_control, SESSION_SHUTDOWN_VAR)
        });

        let lockscreen = LockScreen::new(
            child_control.clone(),
            lockscreen_command,
            config.lockscreen_on_idle,
        );

        Ok(Self {
            runner,
            child_control,
            commands,
            policy,
            lockscreen,
        })
    }

    /// Offers an input event to the shell. Returns whether it was consumed.
    pub fn input_event(&self, event: &InputEvent) -> bool {
        if self.lockscreen.is_locked() {
            return false;
        }
        if self.commands.input_event(event) {
            return true;
        }
        match event {
            InputEvent::Keyboard(event) => self
                .policy
                .invoke_under_lock(|policy| policy.handle_keyboard_event(event)),
            InputEvent::Touch | InputEvent::Pointer { .. } => false,
        }
    }

    pub fn policy(&self) -> &PolicyHandle<T> {
        &self.policy
    }

    pub fn lockscreen(&self) -> &LockScreen {
        &self.lockscreen
    }

    pub fn child_control(&self) -> &ChildControl {
        &self.child_control
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub async fn run(&self) -> ExitCode {
        self.runner.run().await
    }
}

fn run_session_hook(child_control: &ChildControl, var: &str) {
    if let Some(command) = std::env::var(var).ok().filter(|it| !it.is_empty()) {
        log::info!("Running {var}");
        child_control.run_app(vec![command]);
    }
}
