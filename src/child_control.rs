//! Launching and supervising child processes.
//!
//! Processes started with shell privilege are tracked by pid. Every terminated child is
//! reaped when SIGCHLD arrives. Processes started with [`ChildControl::launch_shell`] are
//! restarted after an abnormal exit, backing off when they keep failing straight away.

use std::{
    collections::HashMap,
    fmt,
    process::Stdio,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use anyhow::Context as _;
use nix::{
    errno::Errno,
    sys::{
        signal::{Signal, kill},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    runner::Runner,
    utils::{ResultExt as _, cmd_string, lock_mutex, with_mutex_lock},
};

pub use nix::unistd::Pid;

const MIN_TIME_BETWEEN_RUNS: Duration = Duration::from_secs(3);
const WAIT_PER_QUICK_RUN: Duration = Duration::from_secs(3);
const MAX_QUICK_RUNS_IN_A_ROW: u32 = 3;

pub trait Launch: Send + Sync {
    /// Starts `command_line` without waiting for it.
    fn launch(&self, command_line: &[String]) -> anyhow::Result<Pid>;
}

/// Spawns clients as plain child processes of the shell.
#[derive(Debug, Default)]
pub struct ExternalClientLauncher;

impl ExternalClientLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launch for ExternalClientLauncher {
    fn launch(&self, command_line: &[String]) -> anyhow::Result<Pid> {
        let (program, args) = command_line.split_first().context("Empty command line")?;
        // The child is never waited on here. The SIGCHLD reaper collects it.
        let child = std::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch '{}'", cmd_string(command_line)))?;
        let pid = i32::try_from(child.id()).context("Child pid out of range")?;
        log::debug!("Launched '{}' as {pid}", cmd_string(command_line));
        Ok(Pid::from_raw(pid))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildExit {
    Exited(i32),
    Signaled(Signal),
}

impl ChildExit {
    pub fn is_abnormal(self) -> bool {
        match self {
            Self::Exited(code) => code != 0,
            Self::Signaled(_) => true,
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with status {code}"),
            Self::Signaled(signal) => write!(f, "was killed by {signal}"),
        }
    }
}

type OnReap = Box<dyn FnOnce() + Send>;
type RestartPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

struct RestartState {
    last_run_time: Option<Instant>,
    runs_in_quick_succession: u32,
    pending: Option<JoinHandle<()>>,
    should_restart: RestartPredicate,
}
type SharedRestartState = Arc<Mutex<RestartState>>;

fn should_restart(state: &SharedRestartState) -> bool {
    let predicate = with_mutex_lock(state, |state| state.should_restart.clone());
    predicate()
}

struct Inner {
    launcher: Arc<dyn Launch>,
    /// Tracked pids and what to do when they exit abnormally.
    shell_pids: Mutex<HashMap<Pid, OnReap>>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct ChildControl {
    inner: Arc<Inner>,
}

impl fmt::Debug for ChildControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pids: Vec<Pid> = with_mutex_lock(&self.inner.shell_pids, |pids| {
            pids.keys().copied().collect()
        });
        f.debug_struct("ChildControl")
            .field("shell_pids", &pids)
            .finish_non_exhaustive()
    }
}

impl ChildControl {
    pub fn new(launcher: Arc<dyn Launch>) -> Self {
        Self {
            inner: Arc::new(Inner {
                launcher,
                shell_pids: Mutex::default(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Reaps children while `runner` runs, and terminates the tracked ones when it stops.
    pub fn register_with(&self, runner: &Runner) {
        let inner = self.inner.clone();
        runner.add_start_callback(move || {
            use tokio::signal::unix::{SignalKind, signal};
            let Some(mut sigchld) = signal(SignalKind::child()).ok_or_log() else {
                log::error!("Children will not be reaped");
                return;
            };
            let weak = Arc::downgrade(&inner);
            let shutdown = inner.shutdown.clone();
            drop(inner);
            tokio::spawn(async move {
                loop {
                    // Children may already have exited before the handler was installed.
                    match weak.upgrade() {
                        Some(inner) => inner.reap(),
                        None => break,
                    }
                    tokio::select! {
                        received = sigchld.recv() => if received.is_none() { break },
                        () = shutdown.cancelled() => break,
                    }
                }
            });
        });

        let inner = self.inner.clone();
        runner.add_stop_callback(move || inner.shutdown());
    }

    /// Launches a shell component that is restarted whenever it exits abnormally.
    pub fn launch_shell(&self, command_line: Vec<String>) {
        self.launch_shell_with(command_line, || true);
    }

    /// Like [`Self::launch_shell`], but restarts only while `should_restart` holds.
    pub fn launch_shell_with(
        &self,
        command_line: Vec<String>,
        should_restart: impl Fn() -> bool + Send + Sync + 'static,
    ) {
        let state = Arc::new(Mutex::new(RestartState {
            last_run_time: None,
            runs_in_quick_succession: 0,
            pending: None,
            should_restart: Arc::new(should_restart),
        }));
        self.inner.shell_launch(command_line.into(), state);
    }

    /// Launches a one-off process with shell privilege.
    pub fn run_shell(&self, command_line: Vec<String>) -> Option<Pid> {
        self.inner.launch_tracked(&command_line, Box::new(|| {}))
    }

    /// Launches a one-off process without shell privilege.
    pub fn run_app(&self, command_line: Vec<String>) -> Option<Pid> {
        self.inner.launcher.launch(&command_line).ok_or_log()
    }

    pub fn is_shell_pid(&self, pid: Pid) -> bool {
        with_mutex_lock(&self.inner.shell_pids, |pids| pids.contains_key(&pid))
    }

    /// Collects every terminated child.
    pub fn reap(&self) {
        self.inner.reap();
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    #[cfg(test)]
    fn child_exited(&self, pid: Pid, exit: ChildExit) {
        let on_reap = with_mutex_lock(&self.inner.shell_pids, |pids| {
            take_on_reap(pids, pid, exit)
        });
        if let Some(on_reap) = on_reap {
            on_reap();
        }
    }
}

impl Inner {
    /// Launches and registers under one lock so the reaper cannot miss the pid.
    fn launch_tracked(&self, command_line: &[String], on_reap: OnReap) -> Option<Pid> {
        with_mutex_lock(&self.shell_pids, |pids| {
            let pid = self.launcher.launch(command_line).ok_or_log()?;
            pids.insert(pid, on_reap);
            Some(pid)
        })
    }

    fn shell_launch(self: &Arc<Self>, command_line: Arc<[String]>, state: SharedRestartState) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let now = Instant::now();
        let mut guard = lock_mutex(&state);

        let ran_recently = guard
            .last_run_time
            .is_some_and(|last| now.duration_since(last) <= MIN_TIME_BETWEEN_RUNS);
        if !ran_recently {
            guard.runs_in_quick_succession = 0;
            guard.last_run_time = Some(now);
            drop(guard);
            self.launch_supervised(command_line, state);
            return;
        }

        if guard.pending.as_ref().is_some_and(|it| !it.is_finished()) {
            log::debug!("Restart of '{}' already scheduled", cmd_string(&command_line));
            return;
        }
        if guard.runs_in_quick_succession >= MAX_QUICK_RUNS_IN_A_ROW {
            log::warn!("No longer restarting app: '{}'", cmd_string(&command_line));
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::error!(
                "Failed to schedule restart of '{}': no runtime",
                cmd_string(&command_line)
            );
            return;
        };

        let wait = WAIT_PER_QUICK_RUN * (guard.runs_in_quick_succession + 1);
        log::info!(
            "Restarting '{}' in {}s",
            cmd_string(&command_line),
            wait.as_secs()
        );

        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let task_state = state.clone();
        guard.pending = Some(runtime.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = shutdown.cancelled() => return,
            }
            let Some(this) = weak.upgrade() else {
                return;
            };
            if !should_restart(&task_state) {
                return;
            }
            with_mutex_lock(&task_state, |state| {
                state.pending = None;
                state.runs_in_quick_succession += 1;
                state.last_run_time = Some(Instant::now());
            });
            this.launch_supervised(command_line, task_state);
        }));
    }

    fn launch_supervised(self: &Arc<Self>, command_line: Arc<[String]>, state: SharedRestartState) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let restart_line = command_line.clone();
        let on_reap = Box::new(move || {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if should_restart(&state) {
                this.shell_launch(restart_line, state);
            }
        });
        self.launch_tracked(&command_line, on_reap);
    }

    fn reap(&self) {
        loop {
            let reaped = with_mutex_lock(&self.shell_pids, |pids| {
                let (pid, exit) = wait_any()?;
                Some(take_on_reap(pids, pid, exit))
            });
            match reaped {
                None => break,
                Some(Some(on_reap)) => on_reap(),
                Some(None) => {}
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown.cancel();
        with_mutex_lock(&self.shell_pids, |pids| {
            for pid in pids.keys() {
                if pid.as_raw() <= 0 {
                    continue;
                }
                if let Err(err) = kill(*pid, Signal::SIGTERM) {
                    log::debug!("Failed to terminate {pid}: {err}");
                }
            }
            pids.clear();
        });
    }
}

/// Forgets `pid` and returns its callback if it should run.
fn take_on_reap(pids: &mut HashMap<Pid, OnReap>, pid: Pid, exit: ChildExit) -> Option<OnReap> {
    let Some(on_reap) = pids.remove(&pid) else {
        log::trace!("Reaped untracked child {pid}");
        return None;
    };
    if !exit.is_abnormal() {
        log::debug!("Shell process {pid} {exit}");
        return None;
    }
    log::warn!("Shell process {pid} {exit}");
    Some(on_reap)
}

fn wait_any() -> Option<(Pid, ChildExit)> {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => return Some((pid, ChildExit::Exited(code))),
            Ok(WaitStatus::Signaled(pid, signal, _)) => {
                return Some((pid, ChildExit::Signaled(signal)));
            }
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return None,
            Ok(other) => log::trace!("Ignoring child status {other:?}"),
            Err(Errno::EINTR) => {}
            Err(err) => {
                log::error!("Failed to wait for children: {err}");
                return None;
            }
        }
    }
}
