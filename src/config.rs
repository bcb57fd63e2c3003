/// Что делать с задачами, которые остались в очереди при shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Доработать всё, что уже в очереди, новые задачи не принимать
    #[default]
    Drain,
    /// Выбросить ещё не взятые задачи, их handles получат `TaskError::Discarded`
    Discard,
}


/// Конфигурация пула потоков
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_threads: usize,
    pub thread_name: String,
    pub shutdown_mode: ShutdownMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name: "pool-worker".to_owned(),
            shutdown_mode: ShutdownMode::Drain,
        }
    }
}

impl PoolConfig {
    /// По одному потоку на физическое ядро, для тяжёлой арифметики
    pub fn cpu_bound() -> Self {
        Self {
            num_threads: num_cpus::get_physical(),
            ..Default::default()
        }
    }

    pub fn fixed(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_shutdown_mode(mut self, mode: ShutdownMode) -> Self {
        self.shutdown_mode = mode;
        self
    }
}
