use std::time::Duration;

use rate_guard_actor::{
    BucketError, RefillSchedule, ResolverConfig, TokenBucket, TokenBucketConfig,
    TokenBucketHandle,
};
use tokio::task::yield_now;
use tokio::time::{advance, sleep};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn spawn(rps: i64) -> TokenBucketHandle {
    init_logger();
    TokenBucket::spawn(TokenBucketConfig::new(rps).with_name(format!("bucket-{rps}"))).unwrap()
}

async fn drain(bucket: &TokenBucketHandle) {
    for _ in 0..bucket.max_tokens() {
        assert!(bucket.query().await);
    }
    assert!(!bucket.query().await);
}

#[tokio::test(start_paused = true)]
async fn first_ten_queries_pass_then_eleventh_fails() {
    let bucket = spawn(10);
    for i in 0..10 {
        assert!(bucket.query().await, "query #{i} should pass");
    }
    assert!(!bucket.query().await);
}

#[tokio::test(start_paused = true)]
async fn drained_bucket_recovers_after_one_interval() {
    let bucket = spawn(10);
    let schedule = bucket.schedule();
    assert_eq!((schedule.refill_tokens(), schedule.interval_ms()), (1, 100));

    drain(&bucket).await;

    // One tick at 100 ms, the next one is due at 200 ms.
    sleep(Duration::from_millis(150)).await;
    assert!(bucket.query().await);
    let snapshot = bucket.snapshot().await.unwrap();
    assert_eq!(snapshot.tokens, 0);
    assert_eq!(snapshot.refills, 1);
    assert!(!bucket.query().await);

    sleep(Duration::from_millis(100)).await;
    let snapshot = bucket.snapshot().await.unwrap();
    assert_eq!(snapshot.tokens, 1);
    assert_eq!(snapshot.refills, 2);
}

#[tokio::test(start_paused = true)]
async fn several_intervals_add_several_refills() {
    let bucket = spawn(5);
    assert_eq!(bucket.schedule().interval_ms(), 200);
    drain(&bucket).await;

    sleep(Duration::from_millis(650)).await;
    for _ in 0..3 {
        assert!(bucket.query().await);
    }
    assert!(!bucket.query().await);
}

#[tokio::test(start_paused = true)]
async fn timer_keeps_ticking_on_a_full_bucket() {
    let bucket = spawn(10);
    sleep(Duration::from_millis(1050)).await;

    let snapshot = bucket.snapshot().await.unwrap();
    assert_eq!(snapshot.refills, 10);
    assert_eq!(snapshot.tokens, 10);
    assert_eq!(snapshot.max_tokens, 10);

    // The schedule survived all those capped ticks.
    drain(&bucket).await;
    sleep(Duration::from_millis(100)).await;
    assert!(bucket.query().await);
}

#[tokio::test(start_paused = true)]
async fn delayed_tick_refills_once_and_reschedules_from_now() {
    let bucket = spawn(10);
    drain(&bucket).await;

    // Ten intervals pass in one jump: one refill, no catch-up.
    advance(Duration::from_millis(1000)).await;
    yield_now().await;
    let snapshot = bucket.snapshot().await.unwrap();
    assert_eq!(snapshot.refills, 1);
    assert_eq!(snapshot.tokens, 1);

    // The next tick is one interval after the late one.
    advance(Duration::from_millis(99)).await;
    yield_now().await;
    let snapshot = bucket.snapshot().await.unwrap();
    assert_eq!(snapshot.refills, 1);
    assert_eq!(snapshot.tokens, 1);

    advance(Duration::from_millis(1)).await;
    yield_now().await;
    let snapshot = bucket.snapshot().await.unwrap();
    assert_eq!(snapshot.refills, 2);
    assert_eq!(snapshot.tokens, 2);
}

#[tokio::test(start_paused = true)]
async fn refills_never_exceed_capacity() {
    let bucket = spawn(3);
    bucket.query().await;
    sleep(Duration::from_secs(60)).await;
    assert_eq!(bucket.snapshot().await.unwrap().tokens, 3);
}

#[tokio::test(start_paused = true)]
async fn snapshot_does_not_consume() {
    let bucket = spawn(2);
    for _ in 0..5 {
        assert_eq!(bucket.snapshot().await.unwrap().tokens, 2);
    }
    assert!(bucket.query().await);
    assert_eq!(bucket.snapshot().await.unwrap().tokens, 1);
}

#[tokio::test(start_paused = true)]
async fn custom_resolver_sets_the_cadence() {
    init_logger();
    let fixed = RefillSchedule::new(2, 50).unwrap();
    let bucket = TokenBucket::spawn_with_resolver(TokenBucketConfig::new(4), &fixed).unwrap();
    assert_eq!(bucket.schedule(), fixed);
    assert_eq!(bucket.max_tokens(), 4);

    drain(&bucket).await;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(bucket.snapshot().await.unwrap().tokens, 2);
}

#[tokio::test]
async fn handle_reports_name_and_schedule() {
    let bucket = spawn(1500);
    assert_eq!(bucket.name(), "bucket-1500");
    assert_eq!(bucket.max_tokens(), 1500);
    assert_eq!(bucket.schedule(), RefillSchedule::new(3, 2).unwrap());

    let unnamed = TokenBucket::spawn(TokenBucketConfig::new(1)).unwrap();
    assert_eq!(unnamed.name(), "token-bucket");
}

#[tokio::test]
async fn invalid_rates_spawn_nothing() {
    init_logger();
    assert_eq!(
        TokenBucket::spawn(TokenBucketConfig::new(0)).unwrap_err(),
        BucketError::InvalidRate(0)
    );
    assert_eq!(
        TokenBucket::spawn(TokenBucketConfig::new(-5)).unwrap_err(),
        BucketError::InvalidRate(-5)
    );
}

#[tokio::test]
async fn bad_hosting_options_are_rejected() {
    init_logger();
    let zero_mailbox = TokenBucketConfig::new(10).with_mailbox_capacity(0);
    assert!(matches!(
        TokenBucket::spawn(zero_mailbox),
        Err(BucketError::Config(_))
    ));

    let bad_tolerance = TokenBucketConfig::new(10).with_resolver(ResolverConfig::new(2_000_000, 1000));
    assert!(matches!(
        TokenBucket::spawn(bad_tolerance),
        Err(BucketError::Config(_))
    ));

    let too_tight = TokenBucketConfig::new(3).with_resolver(ResolverConfig::new(1000, 100));
    assert_eq!(
        TokenBucket::spawn(too_tight).unwrap_err(),
        BucketError::ResolutionFailure {
            rps: 3,
            max_interval_ms: 100
        }
    );
}

#[test]
fn spawning_outside_a_runtime_fails() {
    init_logger();
    assert!(matches!(
        TokenBucket::spawn(TokenBucketConfig::new(10)),
        Err(BucketError::Config(_))
    ));
}

#[tokio::test]
async fn shutdown_stops_the_actor() {
    let bucket = spawn(10);
    let other = bucket.clone();
    assert!(bucket.query().await);

    bucket.shutdown().await.unwrap();
    assert!(other.is_closed());
    assert_eq!(other.try_query().await, Err(BucketError::Stopped));
    assert!(!other.query().await);
    assert_eq!(other.snapshot().await, Err(BucketError::Stopped));
    assert_eq!(bucket.shutdown().await, Err(BucketError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn clones_share_one_bucket() {
    let bucket = spawn(4);
    let clones: Vec<_> = (0..4).map(|_| bucket.clone()).collect();
    for clone in &clones {
        assert!(clone.query().await);
    }
    assert!(!bucket.query().await);
    drop(clones);
    assert_eq!(bucket.try_query().await, Ok(false));
}
