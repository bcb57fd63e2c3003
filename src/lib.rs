//! Два способа раздать CPU-bound работу фиксированному набору OS-потоков
//!
//! # Features
//! - `BarrierPool`: постоянные воркеры считают страйдовые срезы общего буфера
//!   и встречаются с драйвером на барьере после каждого раунда
//! - `TaskQueuePool`: воркеры забирают замыкания из общей FIFO-очереди,
//!   результат приходит через `TaskHandle` (блокирующий `get` или `.await`)
//! - Shutdown при drop с гарантированным join всех потоков
//! - Паники задач изолированы в их handles
//! - Режимы shutdown для очереди: дорабатывать (`Drain`) или выбрасывать (`Discard`)

pub mod barrier;
pub mod config;
pub mod errors;
pub mod handle;
pub mod model;
pub mod partition;
pub mod queue;
pub mod result;
pub mod workload;

mod sync;

pub use barrier::{BarrierPool, Input, RoundKernel};
pub use config::{PoolConfig, ShutdownMode};
pub use errors::{PoolError, TaskError};
pub use handle::{join_handles, wait_all, TaskHandle};
pub use partition::StridePartition;
pub use queue::TaskQueuePool;
pub use result::{PoolResult, TaskResult};
