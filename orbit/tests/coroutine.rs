use orbit::{Async, CancellationToken, Error, Executor, Generator, yield_now};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::task::{Context, Waker};
use std::thread;
use std::time::Duration;

type Trace = Arc<Mutex<String>>;

fn record(trace: &Trace, entry: &str) {
    trace.lock().unwrap().push_str(entry);
}

fn leaf(trace: Trace, entry: &'static str) -> Async<()> {
    Async::new(async move {
        record(&trace, entry);
        Ok(())
    })
}

/// Records `[x1]`, `[x0]` then `[x2]`, where `[x1]` and `[x2]` come from
/// awaited callees.
fn nested(trace: Trace, name: &'static str) -> Async<()> {
    let (first, own, second) = match name {
        "a" => ("[a1]", "[a0]", "[a2]"),
        _ => ("[b1]", "[b0]", "[b2]"),
    };

    Async::new(async move {
        leaf(trace.clone(), first).await?;
        record(&trace, own);
        leaf(trace.clone(), second).await?;
        Ok(())
    })
}

fn chain(n: u64) -> Async<u64> {
    Async::new(async move {
        if n == 0 {
            return Ok(0);
        }
        Ok(n + chain(n - 1).await?)
    })
}

fn fibonacci(n: u64) -> Async<u64> {
    Async::new(async move {
        if n < 2 {
            return Ok(n);
        }
        Ok(fibonacci(n - 1).await? + fibonacci(n - 2).await?)
    })
}

fn fails(message: &'static str) -> Async<u32> {
    Async::new(async move { Err(Error::failed(message)) })
}

fn spinner(stop: Arc<AtomicBool>) -> Async<()> {
    Async::new(async move {
        while !stop.load(Ordering::SeqCst) {
            yield_now().await;
        }
        Ok(())
    })
}

#[test]
fn test_nested_calls_run_in_order() {
    let trace = Trace::default();

    let result = nested(trace.clone(), "a").sync();

    assert!(matches!(result, Some(Ok(()))));
    assert_eq!(*trace.lock().unwrap(), "[a1][a0][a2]");
}

#[test]
fn test_body_is_lazy() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let task = Async::<()>::new(async move {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    assert!(!task.is_completed());
    assert!(!ran.load(Ordering::SeqCst));

    task.sync();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_deep_chain_completes() {
    let result = chain(100_000).sync();

    assert_eq!(result.unwrap().unwrap(), 5_000_050_000);
}

#[test]
fn test_fibonacci() {
    assert_eq!(fibonacci(15).sync().unwrap().unwrap(), 610);
}

#[test]
fn test_error_propagates_to_top_level() {
    let reached = Arc::new(AtomicBool::new(false));
    let flag = reached.clone();

    let result = Async::<u32>::new(async move {
        let value = fails("boom").await?;
        flag.store(true, Ordering::SeqCst);
        Ok(value)
    })
    .sync();

    assert!(matches!(result, Some(Err(Error::Failed(ref message))) if message == "boom"));
    assert!(!reached.load(Ordering::SeqCst));
}

#[test]
fn test_propagate_unwraps_value() {
    let result = Async::<u64>::new(async { Ok(chain(10).propagate().await * 2) }).sync();

    assert_eq!(result.unwrap().unwrap(), 110);
}

#[test]
#[should_panic(expected = "propagated asynchronous call failed")]
fn test_propagate_aborts_on_error() {
    Async::<u32>::new(async { Ok(fails("fatal").propagate().await) }).sync();
}

#[test]
fn test_no_return_discards_result() {
    let trace = Trace::default();
    let inner = trace.clone();

    let result = Async::<()>::new(async move {
        fails("ignored").no_return().await;
        leaf(inner, "[done]").no_return().await;
        Ok(())
    })
    .sync();

    assert!(matches!(result, Some(Ok(()))));
    assert_eq!(*trace.lock().unwrap(), "[done]");
}

#[test]
fn test_yield_interleaves_top_level_tasks() {
    let trace = Trace::default();
    let executor = Executor::new();

    let tasks: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let trace = trace.clone();
            Async::<()>::new(async move {
                for step in 0..3 {
                    record(&trace, &format!("{name}{step} "));
                    yield_now().await;
                }
                Ok(())
            })
        })
        .collect();

    for task in &tasks {
        executor.enqueue(task);
    }
    executor.run();

    assert!(tasks.iter().all(Async::is_completed));
    assert_eq!(*trace.lock().unwrap(), "a0 b0 a1 b1 a2 b2 ");
}

#[test]
fn test_generator_yields_items_lazily() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = produced.clone();

    let result = Async::<Vec<u32>>::new(async move {
        let mut squares = Generator::<u32>::new(|emitter| async move {
            for n in 1..=4 {
                counter.fetch_add(1, Ordering::SeqCst);
                emitter.emit(n * n).await;
            }
            Ok(())
        });

        let mut items = Vec::new();
        while let Some(item) = squares.next().await {
            items.push(item?);
        }

        assert!(squares.is_completed());
        assert!(squares.next().await.is_none());
        Ok(items)
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), vec![1, 4, 9, 16]);
    assert_eq!(produced.load(Ordering::SeqCst), 4);
}

#[test]
fn test_generator_stops_on_demand() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = produced.clone();

    let result = Async::<u32>::new(async move {
        let mut naturals = Generator::<u32>::new(|emitter| async move {
            for n in 0u32.. {
                counter.fetch_add(1, Ordering::SeqCst);
                emitter.emit(n).await;
            }
            Ok(())
        });

        let mut sum = 0;
        for _ in 0..3 {
            sum += naturals.next().await.unwrap()?;
        }
        Ok(sum)
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), 3);
    assert_eq!(produced.load(Ordering::SeqCst), 3);
}

#[test]
fn test_generator_reports_error_once() {
    let result = Async::<(Vec<u32>, bool)>::new(async {
        let mut numbers = Generator::<u32>::new(|emitter| async move {
            emitter.emit(1).await;
            emitter.emit(2).await;
            Err(Error::failed("exhausted source"))
        });

        let mut items = Vec::new();
        let mut failed = false;
        while let Some(item) = numbers.next().await {
            match item {
                Ok(value) => items.push(value),
                Err(_) => failed = true,
            }
        }
        Ok((items, failed))
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), (vec![1, 2], true));
}

#[test]
fn test_token_cancels_top_level_task() {
    let executor = Executor::new();
    let token = CancellationToken::new();

    let mut looping = spinner(Arc::new(AtomicBool::new(false)));
    looping.set_cancellation_token(token.clone());

    let trigger = Async::<()>::new(async move {
        yield_now().await;
        token.trigger();
        Ok(())
    });

    executor.enqueue(&looping);
    executor.enqueue(&trigger);
    executor.run();

    assert!(looping.is_completed());
    assert!(looping.is_canceled());
    assert!(looping.move_result_out().is_none());
    assert!(trigger.is_completed() && !trigger.is_canceled());
}

#[test]
fn test_canceled_callee_cancels_awaiter() {
    let executor = Executor::new();
    let callee_token = CancellationToken::new();
    let reached = Arc::new(AtomicBool::new(false));

    let mut callee = spinner(Arc::new(AtomicBool::new(false)));
    callee.set_cancellation_token(callee_token.clone());

    let flag = reached.clone();
    let caller = Async::<()>::new(async move {
        callee.await?;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    let trigger = Async::<()>::new(async move {
        yield_now().await;
        callee_token.trigger();
        Ok(())
    });

    executor.enqueue(&caller);
    executor.enqueue(&trigger);
    executor.run();

    assert!(caller.is_canceled());
    assert!(!reached.load(Ordering::SeqCst));
}

#[test]
fn test_trigger_reschedules_parked_frame() {
    let executor = Executor::new();
    let token = CancellationToken::new();

    let mut parked = Async::<()>::new(async {
        std::future::pending::<()>().await;
        Ok(())
    });
    parked.set_cancellation_token(token.clone());

    let trigger = Async::<()>::new(async move {
        yield_now().await;
        token.trigger();
        Ok(())
    });

    executor.enqueue(&parked);
    executor.enqueue(&trigger);
    executor.run();

    assert!(parked.is_completed());
    assert!(parked.is_canceled());
    assert_eq!(executor.workload_count(), 0);
}

#[test]
fn test_trigger_from_another_thread_ends_run() {
    let token = CancellationToken::new();

    let mut parked = Async::<u32>::new(async {
        std::future::pending::<()>().await;
        Ok(1)
    });
    parked.set_cancellation_token(token.clone());

    let (sender, receiver) = mpsc::channel();
    let runner = thread::spawn(move || {
        let executor = Executor::new();
        sender.send(parked.run(&executor)).unwrap();
    });

    thread::sleep(Duration::from_millis(50));
    token.trigger();

    let result = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("run did not return after the token was triggered");

    assert!(result.is_none());
    runner.join().unwrap();
}

#[test]
fn test_completed_frame_stays_unaffected_by_trigger() {
    let token = CancellationToken::new();

    let mut task = Async::<u32>::new(async {
        yield_now().await;
        yield_now().await;
        Ok(3)
    });
    task.set_cancellation_token(token.clone());

    let result = task.sync();
    token.trigger();

    assert_eq!(result.unwrap().unwrap(), 3);
}

#[test]
fn test_body_reports_its_own_cancellation() {
    let task = Async::<u32>::new(async {
        let token = orbit::current_token().unwrap();
        token.trigger();

        if token.is_canceled() {
            return Err(Error::Canceled);
        }
        Ok(1)
    });

    assert!(matches!(task.sync(), Some(Err(Error::Canceled))));
}

#[test]
fn test_callee_inherits_caller_token() {
    let token = CancellationToken::new();
    let expected = token.clone();

    let mut task = Async::<bool>::new(async move {
        let inner = Async::<bool>::new(async move {
            Ok(orbit::current_token().is_some_and(|token| token.same_as(&expected)))
        });
        inner.await
    });
    task.set_cancellation_token(token);

    assert!(task.sync().unwrap().unwrap());
}

#[test]
#[should_panic(expected = "queried before completion")]
fn test_result_before_completion_is_rejected() {
    let mut task = Async::<u32>::new(async { Ok(1) });
    task.move_result_out();
}

#[test]
#[should_panic(expected = "awaited outside of an executor")]
fn test_await_outside_executor_is_rejected() {
    let mut task = Async::<u32>::new(async { Ok(1) });
    let mut cx = Context::from_waker(Waker::noop());

    let _ = Pin::new(&mut task).poll(&mut cx);
}
