//! Входные данные и имитация нагрузки для драйвера, тестов и бенчмарков.
//! Сами пулы этот модуль не используют.

use std::{
    thread,
    time::Duration,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const SEED_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;


/// Равномерные значения из `[0, 1)`, воспроизводимые по `seed`
pub fn random_input(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random::<f64>()).collect()
}

/// Сумма модулей расхождений с эталоном
pub fn abs_error(reference: &[f64], actual: &[f64]) -> f64 {
    reference
        .iter()
        .zip(actual)
        .map(|(expected, got)| (expected - got).abs())
        .sum()
}


/// Имитация "тяжёлого" вычисления: `base ± jitter`, отрицательное время обрезается до нуля.
///
/// Генератор не глобальный: для каждой задачи он выводится из `seed` и номера задачи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedLatency {
    pub base: Duration,
    pub jitter: Duration,
    pub seed: u64,
}

impl Default for SimulatedLatency {
    fn default() -> Self {
        Self::none()
    }
}

impl SimulatedLatency {
    pub fn new(base: Duration, jitter: Duration, seed: u64) -> Self {
        Self { base, jitter, seed }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0)
    }

    pub fn delay_for(&self, task: u64) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let mut rng = StdRng::seed_from_u64(self.seed ^ task.wrapping_mul(SEED_SPREAD));
        let jitter = self.jitter.as_micros() as i64;
        let offset = rng.random_range(-jitter..=jitter);
        let micros = (self.base.as_micros() as i64 + offset).max(0);
        Duration::from_micros(micros as u64)
    }

    pub fn simulate(&self, task: u64) {
        let delay = self.delay_for(task);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}


/// Демонстрационная задача для очереди: умножение с имитацией задержки
pub fn multiply(a: i64, b: i64, latency: SimulatedLatency, task: u64) -> i64 {
    latency.simulate(task);
    a * b
}
