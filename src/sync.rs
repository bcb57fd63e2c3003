use super::{
    config::PoolConfig,
    errors::PoolError,
    result::PoolResult,
};
use std::{
    mem,
    sync::Arc,
    thread::{self, JoinHandle, ThreadId},
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};


/// Причина пробуждения воркера барьерного пула
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Round(u64),
    Shutdown,
}

#[derive(Debug)]
struct RoundState {
    generation: u64,
    pending: usize,
    shutdown: bool,
}

/// Считающий барьер: счётчик незавершённых воркеров + широковещательный старт раунда.
///
/// Всё состояние меняется под одним мьютексом, тем же, под которым
/// ожидающие проверяют свои предикаты, поэтому пробуждение не теряется.
#[derive(Debug)]
pub(crate) struct RoundBarrier {
    state: Mutex<RoundState>,
    round_start: Condvar,
    round_done: Condvar,
    parties: usize,
}

impl RoundBarrier {
    pub(crate) fn new(parties: usize) -> Self {
        Self {
            state: Mutex::new(RoundState {
                generation: 0,
                pending: 0,
                shutdown: false,
            }),
            round_start: Condvar::new(),
            round_done: Condvar::new(),
            parties,
        }
    }

    /// Открывает новый раунд и будит всех воркеров. Возвращает номер поколения.
    pub(crate) fn commission(&self) -> PoolResult<u64> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(PoolError::ShutDown);
        }
        debug_assert_eq!(state.pending, 0, "previous round still in flight");
        state.generation += 1;
        state.pending = self.parties;
        let generation = state.generation;
        drop(state);
        self.round_start.notify_all();
        Ok(generation)
    }

    /// Блокирует воркера, пока не появится раунд новее `last_seen` или shutdown
    pub(crate) fn wait_for_round(&self, last_seen: u64) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return Wake::Shutdown;
            }
            if state.generation != last_seen {
                return Wake::Round(state.generation);
            }
            self.round_start.wait(&mut state);
        }
    }

    pub(crate) fn arrive(&self) {
        let mut state = self.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            drop(state);
            self.round_done.notify_all();
        }
    }

    /// Ждёт, пока все воркеры отчитаются за раунд `generation`.
    /// `false` если барьер закрыли раньше.
    pub(crate) fn wait_complete(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        while state.generation == generation && state.pending > 0 {
            if state.shutdown {
                return false;
            }
            self.round_done.wait(&mut state);
        }
        true
    }

    pub(crate) fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        drop(state);
        self.round_start.notify_all();
        self.round_done.notify_all();
    }
}


/// Набор потоков-воркеров. Гарантирует join на всех путях выхода.
#[derive(Debug, Default)]
pub(crate) struct WorkerSet {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    /// Запускает `config.num_threads` потоков, каждый вызывает `body(index)`.
    ///
    /// Если ОС отказала в очередном потоке, вызывается `abort` (он должен
    /// разбудить уже запущенных воркеров на выход), после чего они join-ятся.
    pub(crate) fn spawn<F, A>(config: &PoolConfig, body: F, abort: A) -> PoolResult<Self>
    where
        F: Fn(usize) + Send + Sync + 'static,
        A: FnOnce(),
    {
        if config.num_threads == 0 {
            return Err(PoolError::ZeroWorkers);
        }

        let body = Arc::new(body);
        let mut set = Self {
            handles: Vec::with_capacity(config.num_threads),
        };

        for index in 0..config.num_threads {
            let body = Arc::clone(&body);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, index))
                .spawn(move || {
                    debug!(worker = index, "worker started");
                    body(index);
                    debug!(worker = index, "worker exited");
                });

            match spawned {
                Ok(handle) => set.handles.push(handle),
                Err(err) => {
                    warn!(worker = index, error = %err, "failed to spawn worker thread");
                    abort();
                    set.join_all();
                    return Err(PoolError::Spawn(err));
                }
            }
        }

        Ok(set)
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub(crate) fn thread_ids(&self) -> Vec<ThreadId> {
        self.handles.iter().map(|handle| handle.thread().id()).collect()
    }

    /// Забирает handles, оставляя пустой набор. Join-ить забранное можно уже без замка.
    pub(crate) fn take(&mut self) -> Self {
        Self {
            handles: mem::take(&mut self.handles),
        }
    }

    pub(crate) fn join_all(&mut self) {
        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            // pool dropped from inside one of its own tasks
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
            if handle.join().is_err() {
                warn!(thread = %name, "worker thread terminated with a panic");
            }
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.join_all();
    }
}
