//! Lifecycle-scoped background jobs.
//!
//! A [`Manager`] owns one [`JobSlot`] holding its polling job. Its
//! `initialize` step watches upstream signals and decides when the job runs.
//! [`ManagerLifecycle`] is the explicit `Created -> Resumed <-> Paused ->
//! Destroyed` state machine the host drives.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::errors::{WalletError, WalletResult};

/// Holds at most one running task.
#[derive(Debug, Default)]
pub struct JobSlot {
    current: Mutex<Option<JoinHandle<()>>>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running task, wait for it to unwind, then spawn `job`.
    pub async fn start<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.current.lock().await;
        if let Some(handle) = current.take() {
            cancel(handle).await;
        }
        *current = Some(tokio::spawn(job));
    }

    pub async fn stop(&self) {
        let handle = self.current.lock().await.take();
        if let Some(handle) = handle {
            cancel(handle).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

async fn cancel(handle: JoinHandle<()>) {
    handle.abort();
    if let Err(error) = handle.await {
        if error.is_panic() {
            log::error!("background job panicked: {}", error);
        }
    }
}

#[async_trait]
pub trait Manager: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn job_slot(&self) -> &JobSlot;

    /// Watch upstream signals and start or stop the job. Runs until cancelled.
    async fn initialize(self: Arc<Self>);

    /// The polling body.
    async fn do_job(self: Arc<Self>);

    /// Drop the state this manager caches. Called on destroy.
    fn release(&self) {}
}

/// Restart `manager`'s job, cancelling the running one first.
pub async fn restart_job<M: Manager>(manager: &Arc<M>) {
    log::debug!("{}: (re)starting job", manager.name());
    let job = manager.clone().do_job();
    manager.job_slot().start(job).await;
}

pub async fn stop_job<M: Manager>(manager: &Arc<M>) {
    log::debug!("{}: stopping job", manager.name());
    manager.job_slot().stop().await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Resumed,
    Paused,
    Destroyed,
}

pub struct ManagerLifecycle<M: Manager> {
    manager: Arc<M>,
    init: JobSlot,
    state: Mutex<LifecycleState>,
}

impl<M: Manager> ManagerLifecycle<M> {
    pub fn new(manager: Arc<M>) -> Self {
        Self {
            manager,
            init: JobSlot::new(),
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Start `initialize`. No-op when already resumed.
    pub async fn resume(&self) -> WalletResult<()> {
        let mut state = self.state.lock().await;
        match *state {
            LifecycleState::Resumed => Ok(()),
            LifecycleState::Destroyed => {
                log::warn!("{}: resume after destroy refused", self.manager.name());
                Err(WalletError::NotInitialized)
            }
            LifecycleState::Created | LifecycleState::Paused => {
                log::info!("{}: resumed", self.manager.name());
                self.init.start(self.manager.clone().initialize()).await;
                *state = LifecycleState::Resumed;
                Ok(())
            }
        }
    }

    /// Restart the job right away. Ignored unless resumed; refused after destroy.
    pub async fn refresh(&self) -> WalletResult<()> {
        let state = self.state.lock().await;
        match *state {
            LifecycleState::Resumed => {
                restart_job(&self.manager).await;
                Ok(())
            }
            LifecycleState::Destroyed => Err(WalletError::NotInitialized),
            LifecycleState::Created | LifecycleState::Paused => {
                log::debug!(
                    "{}: refresh ignored while {:?}",
                    self.manager.name(),
                    *state
                );
                Ok(())
            }
        }
    }

    /// Cancel `initialize` and the job. Cached values stay readable.
    pub async fn pause(&self) {
        let mut state = self.state.lock().await;
        if *state != LifecycleState::Resumed {
            return;
        }
        self.halt().await;
        log::info!("{}: paused", self.manager.name());
        *state = LifecycleState::Paused;
    }

    pub async fn destroy(&self) {
        let mut state = self.state.lock().await;
        if *state == LifecycleState::Destroyed {
            return;
        }
        self.halt().await;
        self.manager.release();
        log::info!("{}: destroyed", self.manager.name());
        *state = LifecycleState::Destroyed;
    }

    async fn halt(&self) {
        self.init.stop().await;
        stop_job(&self.manager).await;
    }
}
