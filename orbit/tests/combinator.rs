use orbit::{AssertHasValue, Async, CancellationToken, Error, Executor, all, any, yield_now};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Trace = Arc<Mutex<String>>;

fn record(trace: &Trace, entry: &str) {
    trace.lock().unwrap().push_str(entry);
}

fn ready(value: u32) -> Async<u32> {
    Async::new(async move { Ok(value) })
}

fn after_yields(value: u32, yields: usize) -> Async<u32> {
    Async::new(async move {
        for _ in 0..yields {
            yield_now().await;
        }
        Ok(value)
    })
}

/// Never completes unless `stop` is raised.
fn pending_until(stop: Arc<AtomicBool>) -> Async<u32> {
    Async::new(async move {
        while !stop.load(Ordering::SeqCst) {
            yield_now().await;
        }
        Ok(0)
    })
}

fn leaf(trace: Trace, entry: &'static str) -> Async<()> {
    Async::new(async move {
        record(&trace, entry);
        Ok(())
    })
}

fn nested(trace: Trace, name: char) -> Async<()> {
    Async::new(async move {
        leaf(trace.clone(), if name == 'a' { "[a1]" } else { "[b1]" }).await?;
        record(&trace, if name == 'a' { "[a0]" } else { "[b0]" });
        leaf(trace.clone(), if name == 'a' { "[a2]" } else { "[b2]" }).await?;
        Ok(())
    })
}

#[test]
fn test_all_collects_in_branch_order() {
    let result = Async::<(u32, u32)>::new(async {
        // The second branch finishes first.
        let (a, b) = all((after_yields(1, 3), ready(2))).await;
        Ok((a?, b?))
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), (1, 2));
}

#[test]
fn test_all_interleaves_branches() {
    let trace = Trace::default();
    let branches = trace.clone();

    let result = Async::<()>::new(async move {
        let (a, b) = all((nested(branches.clone(), 'a'), nested(branches, 'b'))).await;
        a?;
        b?;
        Ok(())
    })
    .sync();

    assert!(matches!(result, Some(Ok(()))));
    assert_eq!(*trace.lock().unwrap(), "[a1][b1][a0][b0][a2][b2]");
}

#[test]
fn test_all_of_eight() {
    let result = Async::<u32>::new(async {
        let (a, b, c, d, e, f, g, h) = all((
            ready(1),
            after_yields(2, 1),
            ready(3),
            after_yields(4, 2),
            ready(5),
            after_yields(6, 3),
            ready(7),
            ready(8),
        ))
        .await;

        Ok(a? + b? + c? + d? + e? + f? + g? + h?)
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), 36);
}

#[test]
fn test_all_keeps_errors_per_branch() {
    let result = Async::<bool>::new(async {
        let failing = Async::<u32>::new(async { Err(Error::failed("branch failed")) });
        let (a, b) = all((failing, ready(2))).await;

        Ok(a.is_err() && matches!(b, Ok(2)))
    })
    .sync();

    assert!(result.unwrap().unwrap());
}

#[test]
fn test_any_returns_first_winner() {
    let result = Async::<(Option<u32>, bool)>::new(async {
        let never = pending_until(Arc::new(AtomicBool::new(false)));
        let (fast, slow) = any((ready(12), never)).await;

        Ok((fast.transpose()?, slow.is_none()))
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), (Some(12), true));
}

#[test]
fn test_any_assert_has_value() {
    let result = Async::<u32>::new(async {
        let never = pending_until(Arc::new(AtomicBool::new(false)));
        let winner = any((never, after_yields(12, 2))).await;

        winner.assert_has_value::<1>()
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), 12);
}

#[test]
#[should_panic(expected = "slot 1 holds no value")]
fn test_assert_has_value_on_loser() {
    Async::<u32>::new(async {
        let never = pending_until(Arc::new(AtomicBool::new(false)));
        any((ready(12), never)).await.assert_has_value::<1>()
    })
    .sync();
}

#[test]
fn test_any_error_counts_as_completion() {
    let result = Async::<bool>::new(async {
        let failing = Async::<u32>::new(async { Err(Error::failed("first")) });
        let (first, second) = any((failing, after_yields(2, 3))).await;

        Ok(matches!(first, Some(Err(_))) && second.is_none())
    })
    .sync();

    assert!(result.unwrap().unwrap());
}

#[test]
fn test_all_with_canceled_branch_cancels_caller() {
    let executor = Executor::new();
    let token = CancellationToken::new();
    let reached = Arc::new(AtomicBool::new(false));

    let mut doomed = pending_until(Arc::new(AtomicBool::new(false)));
    doomed.set_cancellation_token(token.clone());

    let flag = reached.clone();
    let caller = Async::<()>::new(async move {
        let _ = all((doomed, ready(1))).await;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    let trigger = Async::<()>::new(async move {
        yield_now().await;
        token.trigger();
        Ok(())
    });

    executor.enqueue(&caller);
    executor.enqueue(&trigger);
    executor.run();

    assert!(caller.is_canceled());
    assert!(!reached.load(Ordering::SeqCst));
}

#[test]
fn test_any_with_every_branch_canceled_cancels_caller() {
    let executor = Executor::new();
    let token = CancellationToken::new();
    let reached = Arc::new(AtomicBool::new(false));

    let mut first = pending_until(Arc::new(AtomicBool::new(false)));
    let mut second = pending_until(Arc::new(AtomicBool::new(false)));
    first.set_cancellation_token(token.child());
    second.set_cancellation_token(token.child());

    let flag = reached.clone();
    let caller = Async::<()>::new(async move {
        let _ = any((first, second)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    let trigger = Async::<()>::new(async move {
        yield_now().await;
        token.trigger();
        Ok(())
    });

    executor.enqueue(&caller);
    executor.enqueue(&trigger);
    executor.run();

    assert!(caller.is_canceled());
    assert!(!reached.load(Ordering::SeqCst));
}

#[test]
fn test_any_survives_one_canceled_branch() {
    let executor = Executor::new();
    let token = CancellationToken::new();

    let mut doomed = pending_until(Arc::new(AtomicBool::new(false)));
    doomed.set_cancellation_token(token.clone());

    let mut caller = Async::<Option<u32>>::new(async move {
        let (_, late) = any((doomed, after_yields(7, 6))).await;
        late.transpose()
    });

    let trigger = Async::<()>::new(async move {
        yield_now().await;
        token.trigger();
        Ok(())
    });

    executor.enqueue(&caller);
    executor.enqueue(&trigger);
    executor.run();

    assert_eq!(caller.move_result_out().unwrap().unwrap(), Some(7));
}

#[test]
fn test_branches_inherit_caller_token() {
    let token = CancellationToken::new();
    let expected = token.clone();

    let probe = move || {
        let expected = expected.clone();
        Async::<bool>::new(async move {
            Ok(orbit::current_token().is_some_and(|token| token.same_as(&expected)))
        })
    };

    let mut task = Async::<bool>::new(async move {
        let (a, b) = all((probe(), probe())).await;
        Ok(a? && b?)
    });
    task.set_cancellation_token(token);

    assert!(task.sync().unwrap().unwrap());
}

#[test]
fn test_already_completed_branches_settle_immediately() {
    let executor = Executor::new();

    let first = ready(3);
    let second = ready(4);
    executor.enqueue(&first);
    executor.enqueue(&second);
    executor.run();
    assert!(first.is_completed() && second.is_completed());

    let result = Async::<u32>::new(async move {
        let (a, b) = all((first, second)).await;
        Ok(a? * b?)
    })
    .run(&executor);

    assert_eq!(result.unwrap().unwrap(), 12);
}
