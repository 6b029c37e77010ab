//! Runtime unit tests
//!
//! Futures, fork-join, scopes and host interop against real worker pools.

use crate::runtime::{
    invoke_callback, wait_all, ExclusiveLock, FutureStatus, NoHostLock, Runtime, RuntimeError,
};
use crate::util::config::RuntimeConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn runtime(workers: usize) -> Runtime {
    Runtime::new(RuntimeConfig::default().with_workers(workers)).unwrap()
}

#[cfg(test)]
mod future_tests {
    use super::*;

    #[test]
    fn test_spawn_and_get() {
        let rt = runtime(2);
        let future = rt.spawn(|| 21 * 2);
        assert_eq!(future.get(), Ok(42));
        assert_eq!(future.status(), FutureStatus::Ready);
    }

    #[test]
    fn test_get_is_idempotent() {
        let rt = runtime(2);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let future = rt.spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![1, 2, 3]
        });
        assert_eq!(future.get(), Ok(vec![1, 2, 3]));
        assert_eq!(future.get(), Ok(vec![1, 2, 3]));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_observed_twice_without_rerun() {
        let rt = runtime(2);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let future = rt.spawn(move || -> u32 {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("boom");
        });

        let first = future.get().unwrap_err();
        let second = future.get().unwrap_err();
        assert_eq!(first, second);
        assert!(first.is_task_failure());
        assert!(first.to_string().contains("boom"));
        assert_eq!(future.status(), FutureStatus::Failed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(rt.stats().tasks_failed >= 1);
    }

    #[test]
    fn test_try_spawn_keeps_error() {
        let rt = runtime(1);
        let future = rt.try_spawn(|| -> crate::runtime::Result<u8> {
            Err(RuntimeError::dimension_mismatch("test", 1, 2))
        });
        assert_eq!(
            future.wait(),
            Err(RuntimeError::dimension_mismatch("test", 1, 2))
        );
    }

    #[test]
    fn test_nested_waits_on_single_worker() {
        // Each level waits on its child from inside a task; with one worker
        // this only finishes if waiting workers keep executing tasks.
        fn depth(rt: Runtime, n: u32) -> u32 {
            if n == 0 {
                return 0;
            }
            let child_rt = rt.clone();
            1 + rt.spawn(move || depth(child_rt, n - 1)).wait().unwrap()
        }

        let rt = runtime(1);
        let root = rt.clone();
        assert_eq!(rt.spawn(move || depth(root, 32)).wait(), Ok(32));
        assert!(rt.stats().tasks_helped > 0);
    }

    #[test]
    fn test_wait_all_success() {
        let rt = runtime(3);
        let futures: Vec<_> = (0..16).map(|i| rt.spawn(move || i * i)).collect();
        assert_eq!(wait_all(&futures), Ok(()));
        assert!(futures.iter().all(|f| f.status() == FutureStatus::Ready));
        assert_eq!(wait_all::<u8>(&[]), Ok(()));
    }

    #[test]
    fn test_wait_all_returns_failure_while_others_pending() {
        let rt = runtime(2);
        let slow = rt.spawn(|| {
            thread::sleep(Duration::from_millis(500));
            0
        });
        let failing = rt.spawn(|| -> i32 { panic!("first failure") });
        let result = wait_all(&[slow, failing]);
        let error = result.unwrap_err();
        assert!(error.to_string().contains("first failure"));
    }
}

#[cfg(test)]
mod fork_join_tests {
    use super::*;

    #[test]
    fn test_join_borrows_stack_data() {
        let rt = runtime(2);
        let data: Vec<u64> = (1..=100).collect();
        let (left, right) = data.split_at(50);
        let (a, b) = rt
            .join(|| left.iter().sum::<u64>(), || right.iter().sum::<u64>())
            .unwrap();
        assert_eq!(a + b, 5050);
    }

    #[test]
    fn test_scope_writes_disjoint_chunks() {
        let rt = runtime(4);
        let mut out = vec![0usize; 64];
        rt.scope(|s| {
            for (i, chunk) in out.chunks_mut(8).enumerate() {
                s.spawn(move || chunk.iter_mut().for_each(|x| *x = i));
            }
        });
        for (i, chunk) in out.chunks(8).enumerate() {
            assert!(chunk.iter().all(|&x| x == i));
        }
    }

    #[test]
    fn test_scope_waits_when_body_panics() {
        let rt = runtime(2);
        let finished = AtomicUsize::new(0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.scope(|s| {
                s.spawn(|| {
                    thread::sleep(Duration::from_millis(50));
                    finished.fetch_add(1, Ordering::SeqCst);
                });
                panic!("scope body");
            })
        }));
        assert!(result.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_join_reports_task_failure() {
        let rt = runtime(2);
        let result = rt.join(|| 1, || -> i32 { panic!("right side") });
        assert!(result.unwrap_err().is_task_failure());
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_zero_workers_rejected() {
        let result = Runtime::new(RuntimeConfig::default().with_workers(0));
        assert!(matches!(result, Err(RuntimeError::InvalidConfig(_))));
    }

    #[test]
    fn test_missed_startup_deadline_returns_promptly() {
        let config = RuntimeConfig::default()
            .with_workers(16)
            .with_startup_timeout(Duration::ZERO);
        let started = std::time::Instant::now();
        match Runtime::new(config) {
            Err(error) => {
                assert_eq!(error, RuntimeError::InitializationTimeout(Duration::ZERO));
            },
            Ok(rt) => rt.shutdown(),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_drains_queued_tasks() {
        let rt = runtime(1);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let done = Arc::clone(&done);
            rt.spawn(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        rt.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_spawn_after_shutdown_runs_inline() {
        let rt = runtime(1);
        rt.shutdown();
        assert!(rt.is_shut_down());
        assert_eq!(rt.spawn(|| 9).wait(), Ok(9));
        assert!(rt.stats().tasks_inlined >= 1);
    }

    #[test]
    fn test_worker_count_is_fixed() {
        let rt = runtime(3);
        assert_eq!(rt.num_workers(), 3);
        assert_eq!(rt.config().num_workers, 3);
        assert!(!rt.on_worker());
        let probe = rt.clone();
        assert_eq!(rt.spawn(move || probe.on_worker()).wait(), Ok(true));
    }
}

#[cfg(test)]
mod host_tests {
    use super::*;

    #[test]
    fn test_invoke_callback_without_host_lock() {
        let rt = runtime(2);
        let result = invoke_callback(&rt, &Arc::new(NoHostLock), |x| x * 3, 14);
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn test_invoke_callback_releases_and_reacquires() {
        let rt = runtime(2);
        let host = Arc::new(ExclusiveLock::new());
        host.acquire();

        let probe = Arc::clone(&host);
        let result = invoke_callback(
            &rt,
            &host,
            move |x| {
                assert!(probe.held_by_current_thread());
                x + 1
            },
            41,
        );

        assert_eq!(result, Ok(42));
        assert!(host.held_by_current_thread());
        host.release();
    }

    #[test]
    fn test_invoke_callback_panic_is_task_failure() {
        let rt = runtime(1);
        let host = Arc::new(ExclusiveLock::new());
        host.acquire();
        let result = invoke_callback(&rt, &host, |_| -> i64 { panic!("host raised") }, 0);
        assert!(result.unwrap_err().to_string().contains("host raised"));
        assert!(host.held_by_current_thread());
        host.release();
    }
}
