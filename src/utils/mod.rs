use tokio_util::sync::CancellationToken;

mod sync;
pub use sync::*;

pub trait ResultExt {
    type Ok;
    #[track_caller]
    fn ok_or_log(self) -> Option<Self::Ok>;
}
impl<T, E: Into<anyhow::Error>> ResultExt for Result<T, E> {
    type Ok = T;
    #[track_caller]
    fn ok_or_log(self) -> Option<T> {
        match self {
            Ok(val) => Some(val),
            Err(err) => {
                log::error!("{:?}", err.into());
                None
            }
        }
    }
}

pub struct CancelDropGuard {
    pub inner: CancellationToken,
}
impl Drop for CancelDropGuard {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}
impl From<CancellationToken> for CancelDropGuard {
    fn from(inner: CancellationToken) -> Self {
        Self { inner }
    }
}

/// Joins a command line for log messages.
pub fn cmd_string(cmd: &[String]) -> String {
    shell_words::join(cmd)
}
