use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::child_control::ChildControl;

/// Session lock state and the lockscreen client.
///
/// The lockscreen is launched as a shell component that is restarted for as long as the
/// session stays locked.
#[derive(Debug)]
pub struct LockScreen {
    locked: Arc<AtomicBool>,
    command: Option<Vec<String>>,
    lock_on_idle: bool,
    child_control: ChildControl,
}

impl LockScreen {
    pub fn new(child_control: ChildControl, command: Option<Vec<String>>, lock_on_idle: bool) -> Self {
        Self {
            locked: Arc::default(),
            command,
            lock_on_idle,
            child_control,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn on_lock(&self) {
        if !self.locked.swap(true, Ordering::AcqRel) {
            log::info!("Session locked");
            self.launch_lockscreen();
        }
    }

    pub fn on_unlock(&self) {
        if self.locked.swap(false, Ordering::AcqRel) {
            log::info!("Session unlocked");
        }
    }

    pub fn on_idle(&self) {
        if self.lock_on_idle && !self.is_locked() {
            self.launch_lockscreen();
        }
    }

    fn launch_lockscreen(&self) {
        let Some(command) = &self.command else {
            log::warn!("No lockscreen-app configured");
            return;
        };
        let locked = self.locked.clone();
        self.child_control
            .launch_shell_with(command.clone(), move || locked.load(Ordering::Acquire));
    }
}
