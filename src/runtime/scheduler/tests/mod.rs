//! Scheduler unit tests
//!
//! Task identity, worker pool behaviour and shutdown.


use crate::runtime::scheduler::{Scheduler, Task, TaskId, TaskIdGenerator};
use crate::util::config::RuntimeConfig;
use crossbeam::channel;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn start(workers: usize) -> Arc<Scheduler> {
    let (ready_tx, ready_rx) = channel::unbounded();
    let scheduler = Scheduler::start(RuntimeConfig::default().with_workers(workers), ready_tx).unwrap();
    for _ in 0..workers {
        ready_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    scheduler
}

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(5).to_string(), "Task(5)");
    }

    #[test]
    fn test_task_id_conversions() {
        let id = TaskId::from(7usize);
        assert_eq!(id.inner(), 7);
        assert_eq!(usize::from(id), 7);
        assert!(TaskId(1) < TaskId(2));
    }

    #[test]
    fn test_generator_is_unique_across_threads() {
        let generator = Arc::new(TaskIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || (0..250).map(|_| generator.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<TaskId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_task_run_reports_success() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let task = Task::new(TaskId(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(task.id(), TaskId(1));
        assert!(task.run());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}

#[cfg(test)]
mod scheduler_tests {
    use super::*;

    #[test]
    fn test_start_rejects_zero_workers() {
        let (ready_tx, _ready_rx) = channel::unbounded();
        let result = Scheduler::start(RuntimeConfig::default().with_workers(0), ready_tx);
        assert!(result.is_err());
    }

    #[test]
    fn test_every_worker_reports_ready() {
        let (ready_tx, ready_rx) = channel::unbounded();
        let scheduler = Scheduler::start(RuntimeConfig::default().with_workers(3), ready_tx).unwrap();
        let mut seen: Vec<usize> = (0..3)
            .map(|_| ready_rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(scheduler.num_workers(), 3);
        scheduler.shutdown();
    }

    #[test]
    fn test_submitted_tasks_all_run() {
        let scheduler = start(4);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..200 {
            let done = Arc::clone(&done);
            scheduler.submit(Task::new(scheduler.next_task_id(), move || {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let counter = Arc::clone(&done);
        scheduler.wait_until(|| counter.load(Ordering::SeqCst) == 200, std::thread::sleep);

        let stats = scheduler.snapshot();
        assert_eq!(stats.tasks_scheduled, 200);
        assert_eq!(stats.num_workers, 4);
        scheduler.shutdown();
        assert_eq!(scheduler.snapshot().tasks_completed, 200);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let scheduler = start(2);
        scheduler.shutdown();
        scheduler.shutdown();
        assert!(scheduler.is_terminating());
        assert_eq!(scheduler.snapshot().queued, 0);
    }

    #[test]
    fn test_terminate_does_not_wait_for_busy_worker() {
        let scheduler = start(1);
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        scheduler.submit(Task::new(scheduler.next_task_id(), move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(10));
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(scheduler.terminate());
        assert!(scheduler.is_terminating());
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // Already terminating: neither call joins.
        assert!(!scheduler.terminate());
        scheduler.shutdown();
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        let counter = Arc::clone(&finished);
        scheduler.wait_until(|| counter.load(Ordering::SeqCst) == 1, std::thread::sleep);
    }

    #[test]
    fn test_submit_after_shutdown_runs_inline() {
        let scheduler = start(1);
        scheduler.shutdown();

        let ran_on = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&ran_on);
        scheduler.submit(Task::new(scheduler.next_task_id(), move || {
            *slot.lock() = Some(std::thread::current().id());
        }));

        assert_eq!(*ran_on.lock(), Some(std::thread::current().id()));
        assert_eq!(scheduler.snapshot().tasks_inlined, 1);
    }

    #[test]
    fn test_on_worker_only_inside_pool() {
        let scheduler = start(2);
        assert!(!scheduler.on_worker());

        let other = start(1);
        let seen = Arc::new(AtomicUsize::new(0));
        let (probe, counter) = (Arc::clone(&scheduler), Arc::clone(&seen));
        let (probe_other, counter_done) = (Arc::clone(&other), Arc::clone(&seen));
        scheduler.submit(Task::new(scheduler.next_task_id(), move || {
            // A worker of one pool is not a worker of another.
            if probe.on_worker() && !probe_other.on_worker() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        scheduler.wait_until(|| counter_done.load(Ordering::SeqCst) == 1, std::thread::sleep);

        scheduler.shutdown();
        other.shutdown();
    }

    #[test]
    fn test_failed_task_is_counted() {
        let scheduler = start(1);
        let id = scheduler.next_task_id();
        scheduler.submit(Task::from_job(id, Box::new(|| false)));
        scheduler.shutdown();
        let stats = scheduler.snapshot();
        assert_eq!(stats.tasks_failed, 1);
        assert_eq!(stats.tasks_completed, 1);
    }
}
