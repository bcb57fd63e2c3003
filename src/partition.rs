/// Страйдовое разбиение индексов `[0, len)` между воркерами.
///
/// Воркер `t` получает индексы `t, t + stride, t + 2 * stride, ...`,
/// где `stride == workers`. Каждый воркер проходит не более
/// `ceil(len / workers)` блоков, индексы `>= len` пропускаются.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StridePartition {
    len: usize,
    workers: usize,
}

impl StridePartition {
    pub fn new(len: usize, workers: usize) -> Self {
        assert!(workers > 0, "stride partition needs at least one worker");
        Self { len, workers }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.workers
    }

    /// Максимум элементов на одного воркера
    #[inline]
    pub fn per_worker(&self) -> usize {
        self.len.div_ceil(self.workers)
    }

    #[inline]
    pub fn owner(&self, index: usize) -> usize {
        index % self.workers
    }

    /// Точное количество индексов воркера
    pub fn len_for(&self, worker: usize) -> usize {
        if worker >= self.workers || worker >= self.len {
            return 0;
        }
        (self.len - worker).div_ceil(self.workers)
    }

    pub fn indices(&self, worker: usize) -> impl Iterator<Item = usize> {
        let Self { len, workers } = *self;
        let blocks = if worker < workers { self.per_worker() } else { 0 };
        (0..blocks)
            .map(move |block| block * workers + worker)
            .take_while(move |&index| index < len)
    }
}
