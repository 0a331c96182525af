use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lantern::server::pool::{PoolError, SubmitError, WorkerPool};

#[test]
fn test_pool_rejects_zero_threads_or_capacity() {
    assert!(matches!(
        WorkerPool::<u32>::new(0, 8, |_| {}),
        Err(PoolError::NoThreads)
    ));
    assert!(matches!(
        WorkerPool::<u32>::new(2, 0, |_| {}),
        Err(PoolError::NoCapacity)
    ));
}

#[test]
fn test_pool_reports_its_size() {
    let pool = WorkerPool::<u32>::new(3, 16, |_| {}).unwrap();
    assert_eq!(pool.threads(), 3);
    assert_eq!(pool.capacity(), 16);
}

#[test]
fn test_single_worker_runs_items_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut pool = WorkerPool::new(1, 100, move |n: u32| {
        sink.lock().unwrap().push(n);
    })
    .unwrap();

    for n in 0..50 {
        pool.submit(n).unwrap();
    }
    pool.shutdown();

    assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
}

#[test]
fn test_full_queue_hands_item_back() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut pool = WorkerPool::new(1, 2, move |n: u32| {
        if n == 0 {
            started_tx.send(()).unwrap();
            release_rx.lock().unwrap().recv().unwrap();
        }
        sink.lock().unwrap().push(n);
    })
    .unwrap();

    // occupy the only worker, then fill the queue
    pool.submit(0).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    pool.submit(1).unwrap();
    pool.submit(2).unwrap();
    assert_eq!(pool.queued(), 2);

    match pool.submit(3) {
        Err(SubmitError::Full(item)) => assert_eq!(item, 3),
        other => panic!("expected Full, got {other:?}"),
    }
    assert_eq!(pool.queued(), 2);

    release_tx.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.queued() >= 2 {
        assert!(Instant::now() < deadline, "queue never drained");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(pool.submit(4).is_ok());

    pool.shutdown();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 4]);
}

#[test]
fn test_shutdown_drains_queue_then_refuses_work() {
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let mut pool = WorkerPool::new(4, 1000, move |_: u32| {
        std::thread::sleep(Duration::from_millis(1));
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    for n in 0..200 {
        pool.submit(n).unwrap();
    }
    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 200);

    let err = pool.submit(7).unwrap_err();
    assert!(matches!(err, SubmitError::Closed(_)));
    assert_eq!(err.into_inner(), 7);
}

#[test]
fn test_every_item_runs_exactly_once() {
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let pool = WorkerPool::new(8, 10_000, move |n: usize| {
        counter.fetch_add(n, Ordering::SeqCst);
    })
    .unwrap();

    for n in 1..=1000 {
        pool.submit(n).unwrap();
    }
    drop(pool);

    assert_eq!(done.load(Ordering::SeqCst), 1000 * 1001 / 2);
}
