//! Host lock protocol against a real pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use weft::runtime::{invoke_callback, ExclusiveLock};
use weft::{Runtime, RuntimeConfig};

#[test]
fn test_callbacks_from_many_host_threads() {
    let rt = Runtime::new(RuntimeConfig::default().with_workers(2)).unwrap();
    let host = Arc::new(ExclusiveLock::new());
    let max_inside = Arc::new(AtomicUsize::new(0));
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4i64)
        .map(|t| {
            let (rt, host) = (rt.clone(), Arc::clone(&host));
            let (inside, max_inside) = (Arc::clone(&inside), Arc::clone(&max_inside));
            thread::spawn(move || {
                let mut total = 0;
                for i in 0..10 {
                    host.acquire();
                    let (inside, max_inside) = (Arc::clone(&inside), Arc::clone(&max_inside));
                    let value = invoke_callback(
                        &rt,
                        &host,
                        move |x| {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                            x * 2
                        },
                        t * 100 + i,
                    )
                    .unwrap();
                    host.release();
                    total += value;
                }
                total
            })
        })
        .collect();

    let total: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let expected: i64 = (0..4i64).flat_map(|t| (0..10).map(move |i| 2 * (t * 100 + i))).sum();
    assert_eq!(total, expected);
    // The host lock serializes callbacks.
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert!(!host.is_held());
}
