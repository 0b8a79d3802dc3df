//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use strata::child_control::{Launch, Pid};

/// Well above the kernel's pid limit, so nothing is ever signalled by mistake.
pub const FAKE_PID_BASE: i32 = 1 << 30;

#[derive(Default)]
pub struct Recorder(Mutex<Vec<Vec<String>>>);

impl Recorder {
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.0.lock().unwrap().clone()
    }
}

impl Launch for Recorder {
    fn launch(&self, command_line: &[String]) -> anyhow::Result<Pid> {
        let mut launched = self.0.lock().unwrap();
        launched.push(command_line.to_vec());
        Ok(Pid::from_raw(FAKE_PID_BASE + launched.len() as i32))
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|it| it.to_string()).collect()
}
