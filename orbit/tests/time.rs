use orbit::time::{Clock, ManualClock, Millisecond, SystemClock, delay, timeout};
use orbit::{Async, ClockError, Error, yield_now};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Advances `clock` by `step` per iteration until `stop` is raised.
fn ticking(
    clock: Arc<ManualClock>,
    step: u64,
    stop: Arc<AtomicBool>,
    polls: Arc<AtomicUsize>,
) -> Async<u32> {
    Async::new(async move {
        while !stop.load(Ordering::SeqCst) {
            polls.fetch_add(1, Ordering::SeqCst);
            clock.advance(step);
            yield_now().await;
        }
        Ok(1)
    })
}

/// Raises its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct Unavailable;

impl Clock for Unavailable {
    fn get_time(&self) -> Result<Millisecond, ClockError> {
        Err(ClockError::Unavailable)
    }
}

#[test]
fn test_delay_waits_for_system_clock() {
    let started = Instant::now();

    let result = delay(Arc::new(SystemClock::new()), Duration::from_millis(20)).sync();

    assert!(matches!(result, Some(Ok(()))));
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_delay_follows_manual_clock() {
    let clock = Arc::new(ManualClock::new());

    let driver = clock.clone();
    let result = Async::<bool>::new(async move {
        let advancer = {
            let driver = driver.clone();
            Async::<()>::new(async move {
                for _ in 0..10 {
                    driver.advance(10u64);
                    yield_now().await;
                }
                Ok(())
            })
        };

        let (waited, advanced) = orbit::any((delay(driver, 50u64), advancer)).await;
        Ok(matches!(waited, Some(Ok(()))) && advanced.is_none())
    })
    .sync();

    assert!(result.unwrap().unwrap());
    let now = clock.get_time().unwrap();
    assert!(now >= Millisecond(50) && now <= Millisecond(60));
}

#[test]
fn test_operation_finishing_first_wins() {
    let clock = Arc::new(ManualClock::new());

    let result = timeout(clock, 100u64, Async::<u32>::new(async { Ok(5) })).sync();

    assert_eq!(result.unwrap().unwrap(), 5);
}

#[test]
fn test_slow_operation_times_out() {
    let clock = Arc::new(ManualClock::new());
    let stop = Arc::new(AtomicBool::new(false));
    let polls = Arc::new(AtomicUsize::new(0));

    let operation = ticking(clock.clone(), 10, stop, polls.clone());
    let result = timeout(clock.clone(), 100u64, operation).sync();

    assert!(matches!(result, Some(Err(Error::Timeout))));
    assert!(clock.get_time().unwrap() >= Millisecond(100));
    assert!(polls.load(Ordering::SeqCst) >= 10);
}

#[test]
fn test_timed_out_operation_is_canceled() {
    let clock = Arc::new(ManualClock::new());
    let polls = Arc::new(AtomicUsize::new(0));

    let operation = ticking(clock.clone(), 10, Arc::new(AtomicBool::new(false)), polls.clone());

    let driver = clock.clone();
    let result = Async::<u32>::new(async move {
        let outcome = timeout(driver, 100u64, operation).await;
        assert!(matches!(outcome, Err(Error::Timeout)));

        // Give a canceled operation the chance to run again.
        let after_timeout = polls.load(Ordering::SeqCst);
        for _ in 0..10 {
            yield_now().await;
        }
        Ok((polls.load(Ordering::SeqCst) - after_timeout) as u32)
    })
    .sync();

    assert_eq!(result.unwrap().unwrap(), 0);
}

#[test]
fn test_parked_operation_is_torn_down_on_timeout() {
    let dropped = Arc::new(AtomicBool::new(false));

    let flag = dropped.clone();
    let operation = Async::<u32>::new(async move {
        let _guard = DropFlag(flag);
        std::future::pending::<()>().await;
        Ok(1)
    });

    let observed = dropped.clone();
    let result = Async::<bool>::new(async move {
        let outcome = timeout(Arc::new(SystemClock::new()), 10u64, operation).await;
        assert!(matches!(outcome, Err(Error::Timeout)));

        for _ in 0..10 {
            if observed.load(Ordering::SeqCst) {
                break;
            }
            yield_now().await;
        }
        Ok(observed.load(Ordering::SeqCst))
    })
    .sync();

    assert!(result.unwrap().unwrap());
}

#[test]
fn test_clock_failure_surfaces_as_error() {
    let operation = Async::<u32>::new(async {
        for _ in 0..3 {
            yield_now().await;
        }
        Ok(1)
    });

    let result = timeout(Arc::new(Unavailable), 100u64, operation).sync();

    assert!(matches!(
        result,
        Some(Err(Error::Clock(ClockError::Unavailable)))
    ));
}
