//! Resource governor: counting semaphores that cap concurrent use of
//! expensive external tools.
//!
//! The scheduler starts every eligible item at once; the real ceiling on
//! concurrent encodes, API calls and renders is enforced here, per command.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

/// Named resource classes an external command runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourcePool {
    /// Hardware video encoder (clip extraction, concatenation).
    GpuEncode,
    /// General CPU work (ffprobe queries, audio extraction, overlay).
    Cpu,
    /// Speech-to-text API calls.
    Transcription,
    /// The video renderer. Always single-flight.
    Render,
}

impl std::fmt::Display for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourcePool::GpuEncode => write!(f, "GPU-encode"),
            ResourcePool::Cpu => write!(f, "CPU"),
            ResourcePool::Transcription => write!(f, "transcription"),
            ResourcePool::Render => write!(f, "render"),
        }
    }
}

/// Pool capacities. The render pool is not configurable: concurrent renders
/// corrupt each other, so it is fixed at one permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub gpu_encode: usize,
    pub cpu: usize,
    pub transcription: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            gpu_encode: 2,
            cpu: 12,
            transcription: 3,
        }
    }
}

/// Capacity of the render pool.
pub const RENDER_PERMITS: usize = 1;

/// A permit could not be acquired.
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("{0} pool is closed")]
    Closed(ResourcePool),
}

/// Fixed set of counting semaphores, one per [`ResourcePool`].
#[derive(Debug)]
pub struct ResourceGovernor {
    config: PoolConfig,
    gpu_encode: Arc<Semaphore>,
    cpu: Arc<Semaphore>,
    transcription: Arc<Semaphore>,
    render: Arc<Semaphore>,
}

impl ResourceGovernor {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            gpu_encode: Arc::new(Semaphore::new(config.gpu_encode)),
            cpu: Arc::new(Semaphore::new(config.cpu)),
            transcription: Arc::new(Semaphore::new(config.transcription)),
            render: Arc::new(Semaphore::new(RENDER_PERMITS)),
            config,
        }
    }

    fn semaphore(&self, pool: ResourcePool) -> &Arc<Semaphore> {
        match pool {
            ResourcePool::GpuEncode => &self.gpu_encode,
            ResourcePool::Cpu => &self.cpu,
            ResourcePool::Transcription => &self.transcription,
            ResourcePool::Render => &self.render,
        }
    }

    /// Configured capacity of a pool.
    pub fn capacity(&self, pool: ResourcePool) -> usize {
        match pool {
            ResourcePool::GpuEncode => self.config.gpu_encode,
            ResourcePool::Cpu => self.config.cpu,
            ResourcePool::Transcription => self.config.transcription,
            ResourcePool::Render => RENDER_PERMITS,
        }
    }

    /// Permits currently free in a pool.
    pub fn available_permits(&self, pool: ResourcePool) -> usize {
        self.semaphore(pool).available_permits()
    }

    /// Acquire a permit from `pool`, run `f`, and release the permit when `f`
    /// finishes, whether it succeeded or not.
    pub async fn with_permit<F, Fut, T, E>(&self, pool: ResourcePool, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<GovernorError>,
    {
        trace!(
            pool = %pool,
            available = self.available_permits(pool),
            capacity = self.capacity(pool),
            "Waiting for permit"
        );
        let _permit = self
            .semaphore(pool)
            .acquire()
            .await
            .map_err(|_| GovernorError::Closed(pool))?;
        debug!(pool = %pool, "Permit acquired");
        f().await
    }
}

impl Default for ResourceGovernor {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
