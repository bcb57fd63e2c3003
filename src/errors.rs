use thiserror::Error;


/// Ошибки уровня пула: конструирование, жизненный цикл, раунды барьера
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool requires at least one worker thread")]
    ZeroWorkers,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("pool is shutting down or terminated")]
    ShutDown,

    #[error("input length {actual} does not match buffer length {expected}")]
    InputLength { expected: usize, actual: usize },

    #[error("worker {worker} panicked while computing its slice: {message}")]
    WorkerPanicked { worker: usize, message: String },
}


/// Ошибка конкретной задачи, доставляется только в её handle
#[derive(Debug, Error, PartialEq, PartialOrd, Eq, Ord, Clone)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panic(String),

    #[error("task was discarded before it was dispatched")]
    Discarded,

    #[error("timed out waiting for task result")]
    Timeout,

    #[error("task result was already taken from this handle")]
    Consumed,
}


/// Достаёт текст из payload паники (`&str` или `String`)
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
