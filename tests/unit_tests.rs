#[cfg(test)]
mod tests {
    use workpools::{
        errors::{PoolError, TaskError},
        model::LifecycleState,
        workload::{self, SimulatedLatency},
        join_handles,
        BarrierPool,
        PoolConfig,
        RoundKernel,
        ShutdownMode,
        StridePartition,
        TaskQueuePool,
    };
    use crossbeam::channel;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn wait_until<F: FnMut() -> bool>(mut cond: F) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn explode_above_three_quarters(x: f64) -> f64 {
        if x >= 0.75 {
            panic!("kernel blew up at {x}");
        }
        x
    }

    fn double(x: f64) -> f64 {
        x * 2.0
    }

    #[test]
    fn test_partition_covers_range_disjoint() {
        println!("\n=== TEST: Разбиение индексов ===");
        for len in 0..=200 {
            for workers in 1..=17 {
                let partition = StridePartition::new(len, workers);
                let mut hits = vec![0u32; len];

                for worker in 0..workers {
                    let indices: Vec<_> = partition.indices(worker).collect();
                    assert!(indices.len() <= partition.per_worker());
                    assert_eq!(indices.len(), partition.len_for(worker));
                    for index in indices {
                        assert_eq!(partition.owner(index), worker);
                        hits[index] += 1;
                    }
                }

                assert!(
                    hits.iter().all(|&h| h == 1),
                    "len={len} workers={workers}: every index exactly once"
                );
            }
        }
        println!("  ✓ Объединение = [0, len), пересечений нет");
    }

    #[test]
    fn test_partition_stride_layout() {
        let partition = StridePartition::new(10, 4);
        assert_eq!(partition.stride(), 4);
        assert_eq!(partition.per_worker(), 3);
        assert_eq!(partition.indices(0).collect::<Vec<_>>(), vec![0, 4, 8]);
        assert_eq!(partition.indices(1).collect::<Vec<_>>(), vec![1, 5, 9]);
        assert_eq!(partition.indices(2).collect::<Vec<_>>(), vec![2, 6]);
        assert_eq!(partition.indices(3).collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(partition.indices(4).count(), 0);

        let sparse = StridePartition::new(3, 8);
        assert_eq!(sparse.per_worker(), 1);
        assert_eq!(sparse.indices(7).count(), 0);
        assert_eq!(sparse.len_for(2), 1);
    }

    #[test]
    fn test_zero_workers_rejected() {
        println!("\n=== TEST: Ноль воркеров ===");
        assert!(matches!(BarrierPool::with_workers(10, 0), Err(PoolError::ZeroWorkers)));
        assert!(matches!(TaskQueuePool::new(0), Err(PoolError::ZeroWorkers)));
        assert!(matches!(
            TaskQueuePool::with_config(PoolConfig::default().with_threads(0)),
            Err(PoolError::ZeroWorkers)
        ));
        println!("  ✓ Пулы без воркеров не создаются");
    }

    #[test]
    fn test_barrier_round_values() {
        println!("\n=== TEST: Значения после раунда ===");
        let mut pool = BarrierPool::with_workers(1000, 8).unwrap();
        assert_eq!(pool.state(), LifecycleState::Running);
        assert_eq!(pool.workers(), 8);

        for expected_round in 1..=10u64 {
            let report = pool.run_round().unwrap();
            assert_eq!(report.round, expected_round);

            let values = pool.snapshot();
            assert_eq!(values.len(), 1000);
            for (index, value) in values.iter().enumerate() {
                assert_eq!(*value, (index as f64 / 1000.0).sin(), "index {index}");
            }
        }

        assert_eq!(pool.rounds_completed(), 10);
        assert_eq!(pool.get(1000), None);
        assert_eq!(pool.get(0), Some(0.0));
        println!("  ✓ 10 раундов, все элементы = sin(i/1000)");
    }

    #[test]
    fn test_barrier_odd_shapes() {
        let mut more_workers = BarrierPool::with_workers(3, 8).unwrap();
        more_workers.run_round().unwrap();
        assert_eq!(more_workers.snapshot(), more_workers.reference());

        let mut empty = BarrierPool::with_workers(0, 4).unwrap();
        assert!(empty.is_empty());
        empty.run_round().unwrap();
        empty.run_round().unwrap();
        assert!(empty.snapshot().is_empty());

        let mut single = BarrierPool::with_workers(17, 1).unwrap();
        single.run_round().unwrap();
        assert_eq!(single.snapshot(), single.reference());
    }

    #[test]
    fn test_barrier_supplied_input() {
        println!("\n=== TEST: Входные данные драйвера ===");
        let input = workload::random_input(257, 7);
        let kernel = RoundKernel::over_values(input.clone(), double);
        let mut pool = BarrierPool::with_config(PoolConfig::fixed(3), 257, kernel).unwrap();

        pool.run_round().unwrap();
        let expected: Vec<f64> = input.iter().map(|x| x * 2.0).collect();
        assert_eq!(pool.snapshot(), expected);

        let next = workload::random_input(257, 8);
        pool.set_input(next.clone()).unwrap();
        pool.run_round().unwrap();
        let expected: Vec<f64> = next.iter().map(|x| x * 2.0).collect();
        assert_eq!(pool.snapshot(), expected);
        assert_eq!(pool.reference(), expected);

        assert!(matches!(
            pool.set_input(vec![1.0; 3]),
            Err(PoolError::InputLength { expected: 257, actual: 3 })
        ));
        assert!(matches!(
            BarrierPool::with_config(
                PoolConfig::fixed(2),
                10,
                RoundKernel::over_values(vec![0.0; 4], double),
            ),
            Err(PoolError::InputLength { expected: 10, actual: 4 })
        ));
        println!("  ✓ Раунды воспроизводимы для одинакового входа");
    }

    #[test]
    fn test_barrier_worker_panic_reported() {
        println!("\n=== TEST: Паника в срезе воркера ===");
        let kernel = RoundKernel::new(workpools::Input::NormalizedIndex, explode_above_three_quarters);
        let mut pool = BarrierPool::with_config(PoolConfig::fixed(4), 100, kernel).unwrap();

        match pool.run_round() {
            Err(PoolError::WorkerPanicked { worker, message }) => {
                assert!(worker < 4);
                assert!(message.contains("kernel blew up"), "{message}");
            }
            other => panic!("ожидали WorkerPanicked, получили {other:?}"),
        }
        assert_eq!(pool.rounds_completed(), 1);
        assert!(pool.metrics().worker_panics >= 1);

        // пул остаётся рабочим
        pool.set_input(vec![0.25; 100]).unwrap();
        pool.run_round().unwrap();
        assert!(pool.snapshot().iter().all(|&v| v == 0.25));
        println!("  ✓ Паника доставлена драйверу, следующий раунд прошёл");
    }

    #[test]
    fn test_barrier_shutdown() {
        let mut pool = BarrierPool::with_workers(64, 4).unwrap();
        pool.run_round().unwrap();
        pool.shutdown();
        assert_eq!(pool.state(), LifecycleState::Terminated);
        pool.shutdown();
        assert!(matches!(pool.run_round(), Err(PoolError::ShutDown)));
        // буфер после shutdown всё ещё доступен
        assert_eq!(pool.snapshot().len(), 64);
    }

    #[test]
    fn test_idle_pools_terminate_on_drop() {
        println!("\n=== TEST: Нет потерянных пробуждений ===");
        let start = Instant::now();
        for _ in 0..20 {
            let barrier = BarrierPool::with_workers(128, 16).unwrap();
            let queue = TaskQueuePool::new(16).unwrap();
            thread::sleep(Duration::from_millis(2));
            drop(barrier);
            drop(queue);
        }
        let mut pool = BarrierPool::with_workers(128, 16).unwrap();
        pool.run_round().unwrap();
        drop(pool);
        assert!(start.elapsed() < Duration::from_secs(10));
        println!("  ✓ Все воркеры вышли: {:?}", start.elapsed());
    }

    #[test]
    fn test_result_fidelity() {
        let pool = TaskQueuePool::new(3).unwrap();
        let f = |(a, b): (i64, i64)| a * b - a + 7;

        let handles: Vec<_> = (0..50)
            .map(|i| pool.submit_with(f, (i, i + 3)).unwrap())
            .collect();

        for (i, handle) in (0..50).zip(handles) {
            assert_eq!(handle.get(), Ok(f((i, i + 3))));
        }

        let owned = pool.submit(|| String::from("done")).unwrap();
        assert_eq!(owned.get().unwrap(), "done");
    }

    #[test]
    fn test_task_panic_isolated() {
        println!("\n=== TEST: Паника в задаче ===");
        let pool = TaskQueuePool::new(2).unwrap();

        let bad = pool.submit(|| -> i32 { panic!("bad task") }).unwrap();
        let good: Vec<_> = (0..20).map(|i| pool.submit(move || i * 10).unwrap()).collect();

        assert_eq!(bad.get(), Err(TaskError::Panic("bad task".to_owned())));
        for (i, handle) in good.into_iter().enumerate() {
            assert_eq!(handle.get(), Ok(i as i32 * 10));
        }

        pool.shutdown();
        let metrics = pool.metrics();
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.completed, 20);
        assert_eq!(metrics.pending(), 0);
        println!("  ✓ Ошибка осталась в своём handle");
    }

    #[test]
    fn test_at_most_once_dispatch() {
        let pool = TaskQueuePool::new(8).unwrap();
        let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..2000).map(|_| AtomicUsize::new(0)).collect());

        for task in 0..2000 {
            let runs = Arc::clone(&runs);
            pool.submit(move || {
                runs[task].fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
        assert_eq!(pool.metrics().submitted, 2000);
        assert_eq!(pool.metrics().completed, 2000);
    }

    #[test]
    fn test_drain_on_shutdown() {
        println!("\n=== TEST: Drain при shutdown ===");
        let pool = TaskQueuePool::new(2).unwrap();
        assert_eq!(pool.shutdown_mode(), ShutdownMode::Drain);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(2));
                    i
                })
                .unwrap()
            })
            .collect();

        pool.shutdown();
        assert_eq!(pool.state(), LifecycleState::Terminated);
        assert!(matches!(pool.submit(|| 1), Err(PoolError::ShutDown)));

        let results: Vec<_> = workpools::wait_all(handles)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(results, (0..20).collect::<Vec<_>>());

        // повторный shutdown и drop после него безопасны
        pool.shutdown();
        println!("  ✓ Очередь доработана, новые задачи отклонены");
    }

    #[test]
    fn test_discard_on_shutdown() {
        println!("\n=== TEST: Discard при shutdown ===");
        let pool = TaskQueuePool::with_config(
            PoolConfig::fixed(1).with_shutdown_mode(ShutdownMode::Discard),
        )
        .unwrap();

        let (gate_tx, gate_rx) = channel::bounded::<()>(0);
        let (started_tx, started_rx) = channel::bounded::<()>(1);

        let blocker = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                gate_rx.recv().unwrap();
                "first"
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued: Vec<_> = (0..5).map(|i| pool.submit(move || i).unwrap()).collect();
        assert_eq!(pool.metrics().queued, 5);

        thread::scope(|s| {
            s.spawn(|| pool.shutdown());
            wait_until(|| pool.state() != LifecycleState::Running);
            gate_tx.send(()).unwrap();
        });

        assert_eq!(blocker.get(), Ok("first"));
        for handle in queued {
            assert_eq!(handle.get(), Err(TaskError::Discarded));
        }
        let metrics = pool.metrics();
        assert_eq!(metrics.discarded, 5);
        assert_eq!(metrics.completed, 1);
        assert_eq!(pool.state(), LifecycleState::Terminated);
        println!("  ✓ Невзятые задачи выброшены");
    }

    #[test]
    fn test_try_get() {
        let pool = TaskQueuePool::new(1).unwrap();
        let (gate_tx, gate_rx) = channel::bounded::<()>(0);

        let mut handle = pool
            .submit(move || {
                gate_rx.recv().unwrap();
                5
            })
            .unwrap();

        assert!(handle.try_get().is_none());
        assert!(!handle.is_consumed());

        gate_tx.send(()).unwrap();
        let mut result = None;
        wait_until(|| {
            if result.is_none() {
                result = handle.try_get();
            }
            result.is_some()
        });
        assert_eq!(result, Some(Ok(5)));

        // результат выдаётся один раз
        assert!(handle.try_get().is_none());
        assert!(handle.is_consumed());
        assert_eq!(handle.get(), Err(TaskError::Consumed));
    }

    #[test]
    fn test_shutdown_from_task_while_external_shutdown_joins() {
        println!("\n=== TEST: shutdown из задачи во время внешнего shutdown ===");
        let pool = Arc::new(TaskQueuePool::new(2).unwrap());
        let (done_tx, done_rx) = channel::bounded::<()>(1);

        let inner = Arc::clone(&pool);
        let handle = pool
            .submit(move || {
                thread::sleep(Duration::from_millis(100));
                inner.shutdown();
                "inner"
            })
            .unwrap();

        let outer = Arc::clone(&pool);
        thread::spawn(move || {
            outer.shutdown();
            done_tx.send(()).unwrap();
        });

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("shutdown hung while a task was also shutting the pool down");
        assert_eq!(pool.state(), LifecycleState::Terminated);
        assert_eq!(handle.get(), Ok("inner"));
        println!("  ✓ Оба вызова shutdown вернулись");
    }

    #[test]
    fn test_pool_dropped_inside_own_task() {
        println!("\n=== TEST: drop пула изнутри его задачи ===");
        let pool = Arc::new(TaskQueuePool::new(2).unwrap());
        assert_eq!(pool.state(), LifecycleState::Running);
        let (released_tx, released_rx) = channel::bounded::<()>(0);

        let last_owner = Arc::clone(&pool);
        let handle = pool
            .submit(move || {
                released_rx.recv().unwrap();
                thread::sleep(Duration::from_millis(50));
                // последняя ссылка, drop идёт на воркере этого же пула
                drop(last_owner);
                7
            })
            .unwrap();

        drop(pool);
        released_tx.send(()).unwrap();

        let (done_tx, done_rx) = channel::bounded(1);
        thread::spawn(move || {
            done_tx.send(handle.get()).unwrap();
        });
        let result = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("pool dropped from its own worker never finished");
        assert_eq!(result, Ok(7));
        println!("  ✓ Воркер не ждал сам себя");
    }

    #[test]
    fn test_concurrent_shutdown_callers() {
        let pool = TaskQueuePool::new(3).unwrap();
        let handles: Vec<_> = (0..30)
            .map(|i| {
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(1));
                    i
                })
                .unwrap()
            })
            .collect();

        let (done_tx, done_rx) = channel::unbounded::<LifecycleState>();
        thread::scope(|s| {
            for _ in 0..4 {
                let pool = &pool;
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    pool.shutdown();
                    done_tx.send(pool.state()).unwrap();
                });
            }

            for _ in 0..4 {
                let state = done_rx
                    .recv_timeout(Duration::from_secs(5))
                    .expect("concurrent shutdown caller hung");
                // ни один вызов не возвращается раньше Terminated
                assert_eq!(state, LifecycleState::Terminated);
            }
        });

        assert!(matches!(pool.submit(|| 0), Err(PoolError::ShutDown)));
        let results: Vec<_> = workpools::wait_all(handles)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(results, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_submitters() {
        let pool = TaskQueuePool::new(4).unwrap();

        let sums: Vec<i64> = thread::scope(|s| {
            let submitters: Vec<_> = (0..4i64)
                .map(|t| {
                    let pool = &pool;
                    s.spawn(move || {
                        let handles: Vec<_> = (0..250i64)
                            .map(|i| pool.submit(move || t * 1000 + i).unwrap())
                            .collect();
                        handles.into_iter().map(|h| h.get().unwrap()).sum::<i64>()
                    })
                })
                .collect();
            submitters.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (t, sum) in sums.into_iter().enumerate() {
            let t = t as i64;
            assert_eq!(sum, (0..250i64).map(|i| t * 1000 + i).sum::<i64>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_handles() {
        println!("\n=== TEST: Handles как Future ===");
        let pool = TaskQueuePool::new(4).unwrap();

        let single = pool.submit(|| 21 * 2).unwrap();
        assert_eq!(single.await, Ok(42));

        let handles: Vec<_> = (0..100).map(|i| pool.submit(move || i).unwrap()).collect();
        let mut results: Vec<_> = join_handles(handles)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        results.sort_unstable();
        assert_eq!(results, (0..100).collect::<Vec<_>>());

        let slow = pool
            .submit(|| {
                thread::sleep(Duration::from_millis(300));
                1
            })
            .unwrap();
        assert_eq!(
            slow.await_timeout(Duration::from_millis(20)).await,
            Err(TaskError::Timeout)
        );

        let fast = pool.submit(|| 3).unwrap();
        assert_eq!(fast.await_timeout(Duration::from_secs(5)).await, Ok(3));
        println!("  ✓ await, join_handles и timeout работают");
    }

    #[test]
    fn test_thread_names() {
        let pool = TaskQueuePool::with_config(PoolConfig::fixed(2).with_thread_name("named")).unwrap();
        let name = pool
            .submit(|| thread::current().name().map(str::to_owned))
            .unwrap()
            .get()
            .unwrap()
            .unwrap();
        assert!(name == "named-0" || name == "named-1", "{name}");
    }

    #[test]
    fn test_workload_reproducible() {
        assert_eq!(workload::random_input(100, 3), workload::random_input(100, 3));
        assert_ne!(workload::random_input(100, 3), workload::random_input(100, 4));
        assert!(workload::random_input(1000, 1).iter().all(|x| (0.0..1.0).contains(x)));

        let latency = SimulatedLatency::new(Duration::from_millis(10), Duration::from_millis(20), 9);
        for task in 0..100 {
            let delay = latency.delay_for(task);
            assert_eq!(delay, latency.delay_for(task));
            assert!(delay <= Duration::from_millis(30));
        }
        assert_eq!(SimulatedLatency::none().delay_for(5), Duration::ZERO);
        assert_eq!(workload::multiply(6, 7, SimulatedLatency::none(), 0), 42);
        assert_eq!(workload::abs_error(&[1.0, 2.0], &[1.5, 1.0]), 1.5);
    }
}
