use std::sync::Mutex;

use tokio::time::Instant;

use crate::child_control::{Launch, Pid};

/// Far above any pid the kernel hands out, so signalling them cannot hit a real process.
const FAKE_PID_BASE: i32 = 1 << 30;

#[derive(Default)]
pub struct RecordingLauncher {
    fail: bool,
    launches: Mutex<Vec<(Vec<String>, Instant, Pid)>>,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        let launches = self.launches.lock().unwrap();
        launches.iter().map(|(cmd, _, _)| cmd.clone()).collect()
    }

    pub fn launch_times(&self) -> Vec<Instant> {
        let launches = self.launches.lock().unwrap();
        launches.iter().map(|&(_, at, _)| at).collect()
    }

    pub fn pids(&self) -> Vec<Pid> {
        let launches = self.launches.lock().unwrap();
        launches.iter().map(|&(_, _, pid)| pid).collect()
    }
}

impl Launch for RecordingLauncher {
    fn launch(&self, command_line: &[String]) -> anyhow::Result<Pid> {
        if self.fail {
            anyhow::bail!("No such program: {command_line:?}");
        }
        let mut launches = self.launches.lock().unwrap();
        let pid = Pid::from_raw(FAKE_PID_BASE + launches.len() as i32);
        launches.push((command_line.to_vec(), Instant::now(), pid));
        Ok(pid)
    }
}
