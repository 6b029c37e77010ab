//! The process default runtime.
//!
//! Everything touching the global lifecycle lives in one test so that stop
//! and restart do not race with other tests of this binary.

use std::sync::Arc;
use std::thread;
use weft::RuntimeState;

#[test]
fn test_global_lifecycle() {
    let handles: Vec<_> = (0..6).map(|_| thread::spawn(|| weft::start(Some(3)))).collect();
    let runtimes: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert_eq!(weft::state(), RuntimeState::Running);
    assert!(runtimes.iter().all(|rt| rt.num_workers() == 3));

    // Already running: the argument is ignored.
    assert_eq!(weft::start(Some(5)).unwrap().num_workers(), 3);

    assert_eq!(weft::factorial(5), Ok(120));
    assert_eq!(weft::reduce_sum(&[1, 2, 3, 4]), Ok(10));
    assert_eq!(weft::sort(&[9, -1, 4]), Ok(vec![-1, 4, 9]));
    assert_eq!(
        weft::matrix_multiply(&[vec![1, 2]], &[vec![3], vec![4]]),
        Ok(vec![vec![11]])
    );
    let mut r = [0.0; 2];
    weft::elementwise(&mut r, &[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0], 2.0).unwrap();
    assert_eq!(r, [17.0, 28.0]);

    let shared = Arc::new(String::from("weft"));
    let probe = Arc::clone(&shared);
    assert_eq!(
        weft::invoke_callback(move |n| probe.len() as i64 + n, 1),
        Ok(5)
    );

    assert!(weft::stop());
    assert_eq!(weft::state(), RuntimeState::Stopped);
    assert!(!weft::stop());
    assert!(runtimes[0].is_shut_down());

    // Helpers restart the default runtime on demand.
    assert_eq!(weft::factorial(3), Ok(6));
    assert_eq!(weft::state(), RuntimeState::Running);
    assert!(weft::stop());
}
