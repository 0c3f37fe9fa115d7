use proctor_d::scheduler::{spawn_repeating, Cancellation, SessionClock, Ticker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{advance, sleep};

#[tokio::test(start_paused = true)]
async fn repeating_task_runs_on_period_until_cancelled() {
    let cancellation = Cancellation::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();

    let handle = spawn_repeating(
        "test",
        Duration::from_millis(100),
        cancellation.token(),
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    sleep(Duration::from_millis(1050)).await;
    let seen = runs.load(Ordering::SeqCst);
    assert!((10..=12).contains(&seen), "ran {} times", seen);

    cancellation.cancel();
    handle.await.unwrap();
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(runs.load(Ordering::SeqCst), seen);
}

#[tokio::test(start_paused = true)]
async fn ticker_reports_cancellation() {
    let cancellation = Cancellation::new();
    let mut ticker = Ticker::new(Duration::from_millis(50), cancellation.token());
    assert!(ticker.tick().await);
    assert!(ticker.tick().await);
    cancellation.cancel();
    assert!(!ticker.tick().await);
    assert!(cancellation.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn dropping_cancellation_releases_waiters() {
    let cancellation = Cancellation::new();
    let mut token = cancellation.token();
    drop(cancellation);
    token.cancelled().await;
}

#[tokio::test(start_paused = true)]
async fn session_clock_follows_tokio_time() {
    let clock = SessionClock::start();
    let first = clock.now_ms();
    advance(Duration::from_millis(1500)).await;
    assert_eq!(clock.now_ms() - first, 1500);
    assert_eq!(clock.elapsed(), Duration::from_millis(1500));
}
