use super::{
    config::{PoolConfig, ShutdownMode},
    errors::{panic_message, PoolError, TaskError},
    handle::TaskHandle,
    model::{LifecycleState, QueueMetrics},
    result::{PoolResult, TaskResult},
    sync::WorkerSet,
};
use std::{
    collections::VecDeque,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, ThreadId},
};
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, trace};


type Job = Box<dyn FnOnce(&Counters) + Send + 'static>;

#[derive(Default)]
struct Counters {
    active: CachePadded<AtomicUsize>,
    submitted: CachePadded<AtomicUsize>,
    completed: CachePadded<AtomicUsize>,
    failed: CachePadded<AtomicUsize>,
    discarded: CachePadded<AtomicUsize>,
}

struct QueueState {
    jobs: VecDeque<Job>,
    lifecycle: LifecycleState,
}

struct Shared {
    // push и pop под одним и тем же замком
    state: Mutex<QueueState>,
    available: Condvar,
    terminated: Condvar,
    counters: Counters,
}

impl Shared {
    fn worker_loop(&self, worker: usize) {
        loop {
            let job = {
                let mut state = self.state.lock();
                loop {
                    if let Some(job) = state.jobs.pop_front() {
                        self.counters.active.fetch_add(1, Ordering::Relaxed);
                        break job;
                    }
                    if state.lifecycle >= LifecycleState::ShuttingDown {
                        trace!(worker, "queue drained, leaving");
                        return;
                    }
                    self.available.wait(&mut state);
                }
            };

            job(&self.counters);
            self.counters.active.fetch_sub(1, Ordering::Relaxed);
        }
    }
}


/// Пул с общей FIFO-очередью: воркеры забирают по одной задаче,
/// результат уходит в `TaskHandle`.
///
/// При drop выполняется `shutdown`, т.е. явный вызов не обязателен.
pub struct TaskQueuePool {
    shared: Arc<Shared>,
    workers: Mutex<WorkerSet>,
    worker_ids: Vec<ThreadId>,
    num_threads: usize,
    shutdown_mode: ShutdownMode,
}

impl TaskQueuePool {
    pub fn new(num_threads: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::fixed(num_threads))
    }

    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        if config.num_threads == 0 {
            return Err(PoolError::ZeroWorkers);
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                lifecycle: LifecycleState::Constructing,
            }),
            available: Condvar::new(),
            terminated: Condvar::new(),
            counters: Counters::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let workers = WorkerSet::spawn(
            &config,
            move |worker| worker_shared.worker_loop(worker),
            || {
                shared.state.lock().lifecycle = LifecycleState::ShuttingDown;
                shared.available.notify_all();
            },
        )?;
        shared.state.lock().lifecycle = LifecycleState::Running;

        debug!(
            workers = config.num_threads,
            mode = ?config.shutdown_mode,
            "task queue pool started"
        );

        Ok(Self {
            shared,
            worker_ids: workers.thread_ids(),
            workers: Mutex::new(workers),
            num_threads: config.num_threads,
            shutdown_mode: config.shutdown_mode,
        })
    }

    /// Ставит замыкание в очередь и сразу возвращает handle на результат.
    ///
    /// Паника внутри задачи попадает в её handle как `TaskError::Panic`
    /// и не затрагивает ни воркера, ни другие задачи.
    pub fn submit<T, F>(&self, f: F) -> PoolResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<TaskResult<T>>();

        let job: Job = Box::new(move |counters: &Counters| {
            let result = panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| TaskError::Panic(panic_message(payload.as_ref())));

            if result.is_ok() {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }

            let _ = tx.send(result);
        });

        self.push_job(job)?;
        Ok(TaskHandle::new(rx))
    }

    /// `submit(f, args...)`: аргументы переезжают в задачу, `f(args)` считается на воркере
    pub fn submit_with<A, T, F>(&self, f: F, args: A) -> PoolResult<TaskHandle<T>>
    where
        A: Send + 'static,
        T: Send + 'static,
        F: FnOnce(A) -> T + Send + 'static,
    {
        self.submit(move || f(args))
    }

    #[inline]
    fn push_job(&self, job: Job) -> PoolResult<()> {
        let mut state = self.shared.state.lock();
        if !state.lifecycle.accepts_work() {
            return Err(PoolError::ShutDown);
        }
        state.jobs.push_back(job);
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        drop(state);

        self.shared.available.notify_one();
        Ok(())
    }

    /// Перестаёт принимать задачи, дожидается воркеров.
    ///
    /// В режиме `Drain` очередь дорабатывается, в `Discard` невзятые задачи
    /// выбрасываются. Повторный и конкурентный вызовы безопасны: join делает
    /// тот, кто первым забрал handles, остальные ждут `Terminated`. Вызов
    /// изнутри задачи этого же пула не ждёт собственного потока и возвращается сразу.
    pub fn shutdown(&self) {
        let dropped = {
            let mut state = self.shared.state.lock();
            if state.lifecycle < LifecycleState::ShuttingDown {
                state.lifecycle = LifecycleState::ShuttingDown;
                debug!(queued = state.jobs.len(), mode = ?self.shutdown_mode, "task queue pool draining");
            }
            match self.shutdown_mode {
                ShutdownMode::Drain => VecDeque::new(),
                ShutdownMode::Discard => mem::take(&mut state.jobs),
            }
        };
        self.shared.available.notify_all();

        if !dropped.is_empty() {
            self.shared.counters.discarded.fetch_add(dropped.len(), Ordering::Relaxed);
            // senders закрываются, handles получат Discarded
            drop(dropped);
        }

        // замок только на время take, join идёт без него
        let mut workers = self.workers.lock().take();
        if !workers.is_empty() {
            workers.join_all();
            let mut state = self.shared.state.lock();
            state.lifecycle = LifecycleState::Terminated;
            drop(state);
            self.shared.terminated.notify_all();
            debug!("task queue pool terminated");
            return;
        }

        if self.worker_ids.contains(&thread::current().id()) {
            return;
        }
        let mut state = self.shared.state.lock();
        while state.lifecycle != LifecycleState::Terminated {
            self.shared.terminated.wait(&mut state);
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state.lock().lifecycle
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.num_threads
    }

    #[inline]
    pub fn shutdown_mode(&self) -> ShutdownMode {
        self.shutdown_mode
    }

    pub fn metrics(&self) -> QueueMetrics {
        let queued = self.shared.state.lock().jobs.len();
        let counters = &self.shared.counters;
        QueueMetrics {
            workers: self.num_threads,
            queued,
            active: counters.active.load(Ordering::Relaxed),
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TaskQueuePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
