use std::time::Duration;


/// Состояние жизненного цикла пула. Переходы только вперёд.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Constructing,
    Running,
    /// Для очереди задач это "draining": воркеры доделывают очередь
    ShuttingDown,
    Terminated,
}

impl LifecycleState {
    #[inline]
    pub fn accepts_work(self) -> bool {
        self == LifecycleState::Running
    }
}


#[derive(Debug, Clone)]
pub struct QueueMetrics {
    pub workers: usize,
    pub queued: usize,
    pub active: usize,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub discarded: usize,
}

impl QueueMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.active as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.completed as f64 / total as f64
    }

    /// Задачи, которые ещё не получили результат
    pub fn pending(&self) -> usize {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.discarded)
    }
}



#[derive(Debug, Clone)]
pub struct BarrierMetrics {
    pub workers: usize,
    pub len: usize,
    pub rounds_completed: u64,
    pub worker_panics: u64,
}


/// Итог одного раунда барьерного пула
#[derive(Debug, Clone, Copy)]
pub struct RoundReport {
    pub round: u64,
    pub elapsed: Duration,
}
