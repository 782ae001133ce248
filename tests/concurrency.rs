use expiring_cache::{Cache, CacheError, CacheOption};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn it_calls_the_provider_once_for_concurrent_callers() {
    // given
    let cache = Cache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(16));

    // when
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_create("key", Duration::from_secs(60), || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok::<_, CacheError>(format!("value-{call}"))
                })
            })
        })
        .collect();

    let values: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();

    // then
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|value| value == "value-0"));
}

#[test]
fn it_does_not_block_other_keys_while_a_provider_runs() {
    // given
    let cache = Cache::new();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let slow_cache = cache.clone();
    let slow = thread::spawn(move || {
        slow_cache.get_or_create("slow", Duration::from_secs(60), || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Ok::<_, CacheError>(1_u32)
        })
    });
    started_rx.recv().unwrap();

    // when
    let fast = cache.get_or_create("fast", Duration::from_secs(60), || Ok::<_, CacheError>(2_u32));

    // then
    assert_eq!(fast, Ok(2));
    assert!(cache.try_get::<u32>("fast").is_some());
    release_tx.send(()).unwrap();
    assert_eq!(slow.join().unwrap(), Ok(1));
}

#[test]
fn it_survives_concurrent_stress() {
    // given
    let cache = Cache::with_options([
        CacheOption::LruEviction(8),
        CacheOption::JanitorInterval(Duration::from_millis(5)),
    ]);
    let keys: Vec<String> = (0..20).map(|i| format!("key-{i}")).collect();
    let keys = Arc::new(keys);

    // when
    let handles: Vec<_> = (0..32)
        .map(|worker| {
            let cache = cache.clone();
            let keys = Arc::clone(&keys);
            thread::spawn(move || {
                for i in 0..200 {
                    let key = &keys[(worker + i) % keys.len()];
                    match i % 5 {
                        0 => {
                            cache.forgot(key);
                        }
                        1 => {
                            cache.try_get::<String>(key);
                        }
                        2 => {
                            cache.janitor_purge();
                        }
                        _ => {
                            let value = cache
                                .get_or_create(key, Duration::from_millis(50), || {
                                    Ok::<_, CacheError>(key.clone())
                                })
                                .unwrap();
                            assert_eq!(&value, key);
                        }
                    }
                }
            })
        })
        .collect();

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        for handle in handles {
            handle.join().unwrap();
        }
        done_tx.send(()).unwrap();
    });
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(30)), Ok(()), "workers deadlocked");

    // then
    assert!(cache.len() <= keys.len());
    cache.janitor_purge();
    assert!(cache.len() <= 8);
}

#[test]
fn it_empties_itself_after_expiry() {
    // given
    let cache = Cache::builder()
        .lfu_eviction(4)
        .janitor_interval(Duration::from_millis(10))
        .build();

    for i in 0..10 {
        cache
            .get_or_create(&format!("key-{i}"), Duration::from_millis(20), || {
                Ok::<_, CacheError>(i)
            })
            .unwrap();
    }
    assert!(cache.is_janitor_running());

    // when
    let deadline = Instant::now() + Duration::from_secs(5);
    while cache.is_janitor_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    // then
    assert!(!cache.is_janitor_running());
    assert!(cache.is_empty());

    cache
        .get_or_create("again", Duration::from_secs(60), || Ok::<_, CacheError>(0))
        .unwrap();
    assert!(cache.is_janitor_running());
}
