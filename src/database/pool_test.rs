use std::time::Duration;

use super::pool::*;
use crate::test_utils::FakeDialer;
use crate::Error;
use crate::ExhaustedPolicy;
use crate::PoolConfig;
use crate::PoolError;

fn config(
    max_idle: usize,
    max_active: usize,
    exhausted_policy: ExhaustedPolicy,
) -> PoolConfig {
    PoolConfig {
        max_idle,
        max_active,
        exhausted_policy,
        wait_timeout_ms: 0,
    }
}

#[tokio::test]
async fn test_released_connection_is_reused() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, PoolConfig::default()).unwrap();

    let conn = pool.borrow().await.unwrap();
    assert_eq!(pool.stats(), PoolStats { idle: 0, active: 1 });
    drop(conn);
    assert_eq!(pool.stats(), PoolStats { idle: 1, active: 0 });

    let _conn = pool.borrow().await.unwrap();
    assert_eq!(log.dialed(), 1);
    assert_eq!(log.closed(), 0);
}

#[tokio::test]
async fn test_fail_policy_rejects_borrow_beyond_max_active() {
    let (dialer, _log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, config(2, 2, ExhaustedPolicy::Fail)).unwrap();

    let first = pool.borrow().await.unwrap();
    let _second = pool.borrow().await.unwrap();

    let result = pool.borrow().await;
    assert!(matches!(
        result,
        Err(Error::Pool(PoolError::Exhausted { max_active: 2 }))
    ));

    drop(first);
    assert!(pool.borrow().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_wait_policy_gives_up_after_timeout() {
    let (dialer, _log) = FakeDialer::new();
    let mut config = config(1, 1, ExhaustedPolicy::Wait);
    config.wait_timeout_ms = 50;
    let pool = ConnectionPool::new(dialer, config).unwrap();

    let _held = pool.borrow().await.unwrap();
    let result = pool.borrow().await;

    assert!(matches!(result, Err(Error::Pool(PoolError::Exhausted { .. }))));
}

#[tokio::test]
async fn test_wait_policy_hands_over_released_connection() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, config(1, 1, ExhaustedPolicy::Wait)).unwrap();

    let held = pool.borrow().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.borrow().await.map(|conn| conn.release()) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(held);
    waiter.await.unwrap().unwrap();
    assert_eq!(log.dialed(), 1);
}

#[tokio::test]
async fn test_idle_set_never_exceeds_max_idle() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, config(2, 5, ExhaustedPolicy::Fail)).unwrap();

    let mut borrowed = Vec::new();
    for _ in 0..5 {
        borrowed.push(pool.borrow().await.unwrap());
    }
    assert_eq!(pool.stats().active, 5);
    drop(borrowed);

    assert_eq!(pool.stats(), PoolStats { idle: 2, active: 0 });
    assert_eq!(log.dialed(), 5);
    assert_eq!(log.closed(), 3);
}

#[tokio::test]
async fn test_broken_connection_is_closed_on_release() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, PoolConfig::default()).unwrap();

    let mut conn = pool.borrow().await.unwrap();
    conn.mark_broken();
    drop(conn);

    assert_eq!(pool.stats(), PoolStats { idle: 0, active: 0 });
    assert_eq!(log.closed(), 1);
}

#[tokio::test]
async fn test_connection_dropped_in_transaction_is_closed() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, PoolConfig::default()).unwrap();

    let mut conn = pool.borrow().await.unwrap();
    conn.begin_transaction().await.unwrap();
    drop(conn);

    assert_eq!(pool.stats().idle, 0);
    assert_eq!(log.closed(), 1);
    assert_eq!(log.calls(), vec!["begin"]);
}

#[tokio::test]
async fn test_unhealthy_idle_connection_is_replaced() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, PoolConfig::default()).unwrap();

    pool.borrow().await.unwrap().release();
    log.set_unhealthy(true);

    let _conn = pool.borrow().await.unwrap();

    assert_eq!(log.dialed(), 2);
    assert_eq!(log.closed(), 1);
}

#[tokio::test]
async fn test_failed_dial_frees_its_slot() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, config(1, 1, ExhaustedPolicy::Fail)).unwrap();

    log.set_fail_dial(true);
    assert!(matches!(pool.borrow().await, Err(Error::Pool(PoolError::Dial(_)))));
    assert_eq!(pool.stats().active, 0);

    log.set_fail_dial(false);
    assert!(pool.borrow().await.is_ok());
}

#[tokio::test]
async fn test_close_drops_idle_and_rejects_borrows() {
    let (dialer, log) = FakeDialer::new();
    let pool = ConnectionPool::new(dialer, PoolConfig::default()).unwrap();

    pool.borrow().await.unwrap().release();
    let held = pool.borrow().await.unwrap();
    let second = pool.borrow().await.unwrap();
    drop(second);
    assert_eq!(pool.stats().idle, 1);

    pool.close();
    assert_eq!(pool.stats().idle, 0);
    assert!(matches!(pool.borrow().await, Err(Error::Pool(PoolError::Closed))));

    // Still-borrowed connections are closed when they come back
    drop(held);
    assert_eq!(pool.stats().idle, 0);
    assert_eq!(log.closed(), log.dialed());
}

#[test]
fn test_zero_max_active_is_rejected() {
    let (dialer, _log) = FakeDialer::new();

    let result = ConnectionPool::new(dialer, config(0, 0, ExhaustedPolicy::Fail));

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
