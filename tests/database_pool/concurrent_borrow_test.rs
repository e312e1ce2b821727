use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confsync::Condition;
use confsync::Database;
use confsync::Dialer;
use confsync::Driver;
use confsync::Error;
use confsync::ExecResult;
use confsync::ExhaustedPolicy;
use confsync::PoolConfig;
use confsync::PoolError;
use confsync::Result;
use confsync::Row;
use confsync::Statement;
use confsync::Value;

/// Tracks how many connections are in use at once
#[derive(Default)]
struct Gauge {
    opened: AtomicUsize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

struct SlowDialer {
    gauge: Arc<Gauge>,
}

#[async_trait]
impl Dialer for SlowDialer {
    type Driver = SlowDriver;

    async fn dial(&self) -> Result<SlowDriver> {
        self.gauge.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SlowDriver {
            gauge: self.gauge.clone(),
        })
    }
}

struct SlowDriver {
    gauge: Arc<Gauge>,
}

#[async_trait]
impl Driver for SlowDriver {
    async fn execute(
        &mut self,
        statement: &Statement,
    ) -> Result<ExecResult> {
        let now = self.gauge.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.gauge.in_use.fetch_sub(1, Ordering::SeqCst);

        if statement.sql.contains("missing_table") {
            return Err(PoolError::Driver("no such table".to_string()).into());
        }
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn query(
        &mut self,
        _statement: &Statement,
    ) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

fn database(config: PoolConfig) -> (Database<SlowDialer>, Arc<Gauge>) {
    let gauge = Arc::new(Gauge::default());
    let db = Database::new(SlowDialer { gauge: gauge.clone() }, config).unwrap();
    (db, gauge)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_respect_max_active_and_max_idle() {
    crate::enable_logger();
    let (db, gauge) = database(PoolConfig {
        max_idle: 2,
        max_active: 3,
        exhausted_policy: ExhaustedPolicy::Wait,
        wait_timeout_ms: 0,
    });

    let mut handles = Vec::new();
    for i in 0..12 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.update("counters", [("hits", Value::from(Database::<SlowDialer>::raw("hits + 1")))], &[Condition::eq("id", i)])
                .await?
                .execute()
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
    assert!(gauge.opened.load(Ordering::SeqCst) <= 12);
    let stats = db.stats();
    assert_eq!(stats.active, 0);
    assert!(stats.idle <= 2);
}

#[tokio::test]
async fn test_fail_policy_surfaces_exhaustion() {
    let (db, _gauge) = database(PoolConfig {
        max_idle: 1,
        max_active: 1,
        exhausted_policy: ExhaustedPolicy::Fail,
        wait_timeout_ms: 0,
    });

    let held = db.borrow().await.unwrap();
    assert!(matches!(
        db.borrow().await,
        Err(Error::Pool(PoolError::Exhausted { max_active: 1 }))
    ));

    held.release();
    assert!(db.borrow().await.is_ok());
}

#[tokio::test]
async fn test_failed_transaction_returns_connection_to_pool() {
    let (db, gauge) = database(PoolConfig::default());

    let result: Result<()> = db
        .transaction(|conn| {
            Box::pin(async move {
                conn.insert("orders", [("id", 1)])?.execute().await?;
                conn.delete("missing_table", &[Condition::eq("id", 1)])?.execute().await?;
                Ok::<_, Error>(())
            })
        })
        .await;

    assert!(matches!(result, Err(Error::Pool(PoolError::Driver(_)))));
    assert_eq!(db.stats().active, 0);
    assert_eq!(db.stats().idle, 1);
    assert_eq!(gauge.opened.load(Ordering::SeqCst), 1);
}
