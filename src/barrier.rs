use super::{
    config::PoolConfig,
    errors::{panic_message, PoolError},
    model::{BarrierMetrics, LifecycleState, RoundReport},
    partition::StridePartition,
    result::PoolResult,
    sync::{RoundBarrier, Wake, WorkerSet},
};
use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};
use crossbeam::atomic::AtomicCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};


/// Поэлементная функция раунда. Обычный `fn`, без захваченного состояния.
pub type Transform = fn(f64) -> f64;

/// Откуда берётся аргумент поэлементной функции
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// `x = index / len`
    NormalizedIndex,
    /// `x = values[index]`, значения поставляет драйвер
    Values(Vec<f64>),
}

/// Чистое вычисление одного элемента буфера: `transform(input(index))`
#[derive(Debug, Clone)]
pub struct RoundKernel {
    input: Input,
    transform: Transform,
}

impl Default for RoundKernel {
    fn default() -> Self {
        Self::sine_of_index()
    }
}

impl RoundKernel {
    pub fn new(input: Input, transform: Transform) -> Self {
        Self { input, transform }
    }

    pub fn sine_of_index() -> Self {
        Self::new(Input::NormalizedIndex, f64::sin)
    }

    pub fn over_values(values: Vec<f64>, transform: Transform) -> Self {
        Self::new(Input::Values(values), transform)
    }

    #[inline]
    pub fn input(&self) -> &Input {
        &self.input
    }

    #[inline(always)]
    pub fn evaluate(&self, index: usize, len: usize) -> f64 {
        let x = match &self.input {
            Input::NormalizedIndex => index as f64 / len as f64,
            Input::Values(values) => values[index],
        };
        (self.transform)(x)
    }

    /// Однопоточный эталон для сверки с результатом раунда
    pub fn reference(&self, len: usize) -> Vec<f64> {
        (0..len).map(|index| self.evaluate(index, len)).collect()
    }

    fn check_len(&self, len: usize) -> PoolResult<()> {
        match &self.input {
            Input::Values(values) if values.len() != len => Err(PoolError::InputLength {
                expected: len,
                actual: values.len(),
            }),
            _ => Ok(()),
        }
    }
}


struct Shared {
    buffer: Box<[AtomicCell<f64>]>,
    kernel: RwLock<RoundKernel>,
    partition: StridePartition,
    barrier: RoundBarrier,
    // паники воркеров за текущий раунд
    panics: Mutex<Vec<(usize, String)>>,
}

impl Shared {
    fn compute_slice(&self, worker: usize) {
        let kernel = self.kernel.read();
        let len = self.buffer.len();
        for index in self.partition.indices(worker) {
            self.buffer[index].store(kernel.evaluate(index, len));
        }
    }

    fn worker_loop(&self, worker: usize) {
        let mut seen = 0;
        while let Wake::Round(generation) = self.barrier.wait_for_round(seen) {
            seen = generation;
            trace!(worker, round = generation, "computing slice");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.compute_slice(worker)));
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                warn!(worker, round = generation, %message, "slice computation panicked");
                self.panics.lock().push((worker, message));
            }

            self.barrier.arrive();
        }
    }
}


/// Пул с постоянными воркерами, которые раунд за раундом считают
/// свои страйдовые срезы общего буфера и встречаются на барьере.
///
/// Драйвер читает буфер только после того, как `run_round` вернул управление.
pub struct BarrierPool {
    shared: Arc<Shared>,
    workers: WorkerSet,
    state: LifecycleState,
    rounds_completed: u64,
    worker_panics: u64,
}

impl BarrierPool {
    pub fn new(len: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::default(), len, RoundKernel::default())
    }

    pub fn with_workers(len: usize, num_threads: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::fixed(num_threads), len, RoundKernel::default())
    }

    pub fn with_config(config: PoolConfig, len: usize, kernel: RoundKernel) -> PoolResult<Self> {
        if config.num_threads == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        kernel.check_len(len)?;

        let shared = Arc::new(Shared {
            buffer: (0..len).map(|_| AtomicCell::new(0.0)).collect(),
            kernel: RwLock::new(kernel),
            partition: StridePartition::new(len, config.num_threads),
            barrier: RoundBarrier::new(config.num_threads),
            panics: Mutex::new(Vec::new()),
        });

        let worker_shared = Arc::clone(&shared);
        let workers = WorkerSet::spawn(
            &config,
            move |worker| worker_shared.worker_loop(worker),
            || shared.barrier.shutdown(),
        )?;

        debug!(
            len,
            workers = config.num_threads,
            per_worker = shared.partition.per_worker(),
            "barrier pool started"
        );

        Ok(Self {
            shared,
            workers,
            state: LifecycleState::Running,
            rounds_completed: 0,
            worker_panics: 0,
        })
    }

    /// Один синхронный проход: обнулить буфер, разбудить всех воркеров,
    /// дождаться, пока каждый отчитается.
    pub fn run_round(&mut self) -> PoolResult<RoundReport> {
        if !self.state.accepts_work() {
            return Err(PoolError::ShutDown);
        }

        for cell in self.shared.buffer.iter() {
            cell.store(0.0);
        }

        let start = Instant::now();
        let round = self.shared.barrier.commission()?;
        if !self.shared.barrier.wait_complete(round) {
            return Err(PoolError::ShutDown);
        }
        let elapsed = start.elapsed();
        self.rounds_completed += 1;

        let panics = mem::take(&mut *self.shared.panics.lock());
        trace!(round, ?elapsed, panics = panics.len(), "round complete");

        if let Some((worker, message)) = panics.first().cloned() {
            self.worker_panics += panics.len() as u64;
            return Err(PoolError::WorkerPanicked { worker, message });
        }

        Ok(RoundReport { round, elapsed })
    }

    /// Подменяет входные значения между раундами
    pub fn set_input(&mut self, values: Vec<f64>) -> PoolResult<()> {
        if values.len() != self.len() {
            return Err(PoolError::InputLength {
                expected: self.len(),
                actual: values.len(),
            });
        }
        let mut kernel = self.shared.kernel.write();
        kernel.input = Input::Values(values);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<f64> {
        self.shared.buffer.iter().map(AtomicCell::load).collect()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.shared.buffer.get(index).map(AtomicCell::load)
    }

    /// Эталон текущего ядра, посчитанный в вызывающем потоке
    pub fn reference(&self) -> Vec<f64> {
        self.shared.kernel.read().reference(self.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shared.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.buffer.is_empty()
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.shared.partition.workers()
    }

    #[inline]
    pub fn partition(&self) -> StridePartition {
        self.shared.partition
    }

    #[inline]
    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn metrics(&self) -> BarrierMetrics {
        BarrierMetrics {
            workers: self.workers(),
            len: self.len(),
            rounds_completed: self.rounds_completed,
            worker_panics: self.worker_panics,
        }
    }

    /// Будит всех воркеров на выход и ждёт их завершения. Повторный вызов ничего не делает.
    pub fn shutdown(&mut self) {
        if self.state == LifecycleState::Terminated {
            return;
        }
        self.state = LifecycleState::ShuttingDown;
        self.shared.barrier.shutdown();
        self.workers.join_all();
        self.state = LifecycleState::Terminated;
        debug!(rounds = self.rounds_completed, "barrier pool terminated");
    }
}

impl Drop for BarrierPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
