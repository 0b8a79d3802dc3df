use std::{process::ExitCode, sync::Mutex};

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::utils::{CancelDropGuard, ResultExt as _, with_mutex_lock};

type Callback = Box<dyn FnOnce() + Send>;

/// Drives the session: start callbacks run in registration order when [`Runner::run`]
/// begins, stop callbacks in reverse order once it is asked to stop.
#[derive(Default)]
pub struct Runner {
    stop: CancellationToken,
    start_callbacks: Mutex<Vec<Callback>>,
    stop_callbacks: Mutex<Vec<Callback>>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_start_callback(&self, callback: impl FnOnce() + Send + 'static) {
        with_mutex_lock(&self.start_callbacks, |it| it.push(Box::new(callback)));
    }

    pub fn add_stop_callback(&self, callback: impl FnOnce() + Send + 'static) {
        with_mutex_lock(&self.stop_callbacks, |it| it.push(Box::new(callback)));
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Runs until [`Runner::stop`] is called or an exit signal arrives.
    pub async fn run(&self) -> ExitCode {
        let code = {
            let _stop_on_exit = CancelDropGuard::from(self.stop.clone());
            let start_callbacks = with_mutex_lock(&self.start_callbacks, std::mem::take);
            for callback in start_callbacks {
                callback();
            }

            tokio::select! {
                () = self.stop.cancelled() => ExitCode::SUCCESS,
                code = wait_for_exit_signal() => code,
            }
        };

        let stop_callbacks = with_mutex_lock(&self.stop_callbacks, std::mem::take);
        for callback in stop_callbacks.into_iter().rev() {
            callback();
        }
        log::info!("Stopped");
        code
    }
}

async fn wait_for_exit_signal() -> ExitCode {
    type SK = tokio::signal::unix::SignalKind;

    let mut tasks = tokio::task::JoinSet::new();
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);

    for kind in [SK::interrupt(), SK::quit(), SK::hangup(), SK::terminate()] {
        let Some(mut signal) = tokio::signal::unix::signal(kind).ok_or_log() else {
            continue;
        };
        let tx = tx.clone();
        tasks.spawn(async move {
            while let Some(()) = signal.recv().await
                && tx.send(kind).await.is_ok()
            {}
        });
    }
    drop(tx);

    let Some(kind) = rx
        .recv()
        .await
        .context("Failed to receive any signals")
        .ok_or_log()
    else {
        return std::future::pending().await;
    };
    log::debug!("Received exit signal {kind:?}");
    ExitCode::from((128 + kind.as_raw_value()) as u8)
}
