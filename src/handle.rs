use super::{
    errors::TaskError,
    result::TaskResult,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll}
};
use futures::{
    ready,
    stream::{FuturesUnordered, StreamExt},
};
use tokio::{
    sync::oneshot::{self, error::TryRecvError},
    time::Duration,
};


/// Handle на результат задачи из очереди.
///
/// Один и тот же handle можно ждать из обычного потока драйвера (`get`,
/// `try_get`) и из async-кода (`.await`, `await_timeout`): под ним oneshot,
/// который воркер заполняет ровно один раз. Забранный результат второй раз
/// не выдаётся, повторная попытка даёт `TaskError::Consumed`.
pub struct TaskHandle<T> {
    receiver: Option<oneshot::Receiver<TaskResult<T>>>,
}

impl<T> TaskHandle<T> {

    pub(crate) fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { receiver: Some(receiver) }
    }

    /// Блокирует поток до результата.
    ///
    /// # Panics
    /// Паникует, если вызвать изнутри async runtime, там нужен `.await`.
    pub fn get(self) -> TaskResult<T> {
        match self.receiver {
            Some(receiver) => receiver.blocking_recv().unwrap_or(Err(TaskError::Discarded)),
            None => Err(TaskError::Consumed),
        }
    }

    /// Неблокирующая проверка: `None`, пока задача не закончилась
    /// (и после того, как результат уже забрали).
    pub fn try_get(&mut self) -> Option<TaskResult<T>> {
        let receiver = self.receiver.as_mut()?;
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            // sender дропнут без отправки: задачу выбросили при shutdown
            Err(TryRecvError::Closed) => Err(TaskError::Discarded),
        };
        self.receiver = None;
        Some(result)
    }

    /// `true`, если результат уже забран через `try_get`
    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.receiver.is_none()
    }

    /// Async-ожидание с дедлайном; по истечении handle пропадает вместе с результатом
    pub async fn await_timeout(self, timeout: Duration) -> TaskResult<T> {
        tokio::time::timeout(timeout, self)
            .await
            .unwrap_or(Err(TaskError::Timeout))
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(receiver) = this.receiver.as_mut() else {
            return Poll::Ready(Err(TaskError::Consumed));
        };
        let result = ready!(Pin::new(receiver).poll(cx)).unwrap_or(Err(TaskError::Discarded));
        this.receiver = None;
        Poll::Ready(result)
    }
}


/// Блокирующее ожидание всех handles, результаты в порядке отправки
pub fn wait_all<T>(handles: Vec<TaskHandle<T>>) -> Vec<TaskResult<T>> {
    handles.into_iter().map(TaskHandle::get).collect()
}

/// Асинхронное ожидание всех handles, результаты в порядке завершения
pub async fn join_handles<T>(handles: Vec<TaskHandle<T>>) -> Vec<TaskResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }

    let len = handles.len();
    let mut futures = FuturesUnordered::from_iter(handles);
    let mut results = Vec::with_capacity(len);

    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}
