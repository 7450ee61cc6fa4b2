use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Reports elapsed whole seconds through a callback, once per second,
/// starting at 0. Owns at most one ticker task: `restart` aborts the
/// previous one before spawning, and `stop`/drop abort it.
pub struct ElapsedTimer {
    callback: Arc<dyn Fn(u64) + Send + Sync>,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedTimer {
    pub fn new(callback: impl Fn(u64) + Send + Sync + 'static) -> Self {
        Self { callback: Arc::new(callback), handle: None }
    }

    pub fn restart(&mut self) {
        self.stop();
        let callback = self.callback.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            let mut seconds = 0;
            loop {
                ticker.tick().await;
                callback(seconds);
                seconds += 1;
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
