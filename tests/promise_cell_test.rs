#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_cell::{flatten, Failure, Future, Promise, WaitError};
    use proptest::prelude::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::{thread, time::Duration};

    #[derive(Debug, thiserror::Error)]
    #[error("user {0} not found")]
    struct UserNotFound(u32);

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct ConnectionRefused;

    #[test]
    fn test_promise_completed_from_another_thread() {
        let promise = Promise::<i32, Failure>::new();
        let future = promise.future();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            promise.complete(42).unwrap();
        });

        let result = future.blocking_await().unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_concurrent_registration_fires_each_awaiter_once() {
        let (promise, future) = Promise::<u64, ()>::pair();
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Arc::new(Barrier::new(101));

        let mut handles = vec![];
        for _ in 0..100 {
            let future = future.clone();
            let calls = calls.clone();
            let start = start.clone();
            handles.push(thread::spawn(move || {
                start.wait();
                future.add_awaiter(move |result| {
                    assert_eq!(*result, Ok(7));
                    calls.fetch_add(1, Ordering::SeqCst);
                });
            }));
        }
        let completer = thread::spawn(move || {
            start.wait();
            promise.complete(7).unwrap();
        });

        completer.join().expect("The completer thread has panicked");
        for handle in handles {
            handle.join().expect("A registering thread has panicked");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_racing_completions_have_one_winner() {
        let promise = Arc::new(Promise::<usize, ()>::new());
        let future = promise.future();
        let start = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let promise = promise.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    promise.complete(i).is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        let value = future.blocking_await().unwrap();
        assert!(value < 8);
        assert_eq!(future.blocking_await(), Ok(value));
    }

    #[test]
    fn test_awaiter_registered_after_completion_runs_once() {
        let (promise, future) = Promise::<&str, ()>::pair();
        promise.complete("done").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        future.add_awaiter(move |result| {
            assert_eq!(*result, Ok("done"));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_awaiter_leaves_mapped_future_intact() {
        let (promise, future) = Promise::<u32, ()>::pair();
        let calls = Arc::new(AtomicUsize::new(0));
        let first = calls.clone();
        future.add_awaiter(move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        future.add_awaiter(|_| panic!("observer failed"));
        let second = calls.clone();
        future.add_awaiter(move |_| {
            second.fetch_add(1, Ordering::SeqCst);
        });
        let mapped = future.map(|v| v + 1);

        let completed = panic::catch_unwind(AssertUnwindSafe(|| promise.complete(1)));
        assert!(completed.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(mapped.blocking_await(), Ok(2));
        assert!(future.is_completed());
    }

    #[test]
    fn test_flatten_out_of_order_completion() {
        let promises: Vec<_> = (0..4).map(|_| Promise::<String, Failure>::new()).collect();
        let all = flatten(promises.iter().map(Promise::future));
        let words = ["Hello", "World", "Foo", "Bar"];

        let handles: Vec<_> = promises
            .into_iter()
            .zip(words)
            .enumerate()
            .map(|(i, (promise, word))| {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10 * (4 - i as u64)));
                    promise.complete(word.to_string()).unwrap();
                })
            })
            .collect();

        assert_eq!(all.blocking_await().unwrap(), words);
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_request_pipeline() {
        let (query, rows) = Promise::<Vec<u32>, Failure>::pair();
        let handled = Arc::new(Mutex::new(vec![]));
        let (not_found, fallback) = (handled.clone(), handled.clone());

        let view = rows
            .try_map(|ids| ids.first().copied().ok_or_else(|| UserNotFound(0).into()))
            .flat_map(|id| Future::ready(format!("<h1>user {id}</h1>")));
        view.catch_as(move |e: &UserNotFound| not_found.lock().unwrap().push(e.to_string()))
            .catch_as(move |_: &ConnectionRefused| fallback.lock().unwrap().push("retry".into()));

        query.complete(vec![]).unwrap();
        assert_eq!(*handled.lock().unwrap(), vec!["user 0 not found".to_string()]);
        let err = view.blocking_await().unwrap_err();
        assert_eq!(err.to_string(), "future failed: user 0 not found");
    }

    #[test]
    fn test_await_inside_async_block() {
        let (promise, future) = Promise::<u32, Failure>::pair();
        let doubled = future.map(|v| v * 2);
        let task = thread::spawn(move || block_on(async { doubled.await }));
        promise.complete(21).unwrap();
        assert_eq!(task.join().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_blocked_zero_timeout_never_hangs() {
        let (_promise, future) = Promise::<u32, Failure>::pair();
        match future.blocked(Duration::ZERO) {
            Err(WaitError::Timeout(timeout)) => assert_eq!(timeout, Duration::ZERO),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn awaiters_fire_in_registration_order(count in 0usize..64, value in any::<i64>()) {
            let (promise, future) = Promise::<i64, ()>::pair();
            let seen = Arc::new(Mutex::new(vec![]));
            for i in 0..count {
                let seen = seen.clone();
                future.add_awaiter(move |result| seen.lock().unwrap().push((i, *result)));
            }
            promise.complete(value).unwrap();
            prop_assert!(promise.complete(value).is_err());
            let expected: Vec<(usize, Result<i64, ()>)> = (0..count).map(|i| (i, Ok(value))).collect();
            prop_assert_eq!(&*seen.lock().unwrap(), &expected);
        }

        #[test]
        fn flatten_preserves_input_order(
            order in Just((0..16usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let promises: Vec<_> = (0..order.len()).map(|_| Promise::<usize, ()>::new()).collect();
            let all = flatten(promises.iter().map(Promise::future));
            for &index in &order {
                promises[index].complete(index * 10).unwrap();
            }
            let expected: Vec<_> = (0..order.len()).map(|i| i * 10).collect();
            prop_assert_eq!(all.blocking_await(), Ok(expected));
        }
    }
}
