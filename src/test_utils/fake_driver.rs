use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::Dialer;
use crate::Driver;
use crate::ExecResult;
use crate::PoolError;
use crate::Result;
use crate::Row;
use crate::Statement;

/// Shared record of everything the fake connections of one dialer did
#[derive(Debug, Default)]
pub struct DriverLog {
    dialed: AtomicUsize,
    closed: AtomicUsize,
    calls: Mutex<Vec<String>>,
    rows: Mutex<Vec<Row>>,
    unhealthy: AtomicBool,
    fail_dial: AtomicBool,
    fail_rollback: AtomicBool,
}

impl DriverLog {
    pub fn dialed(&self) -> usize {
        self.dialed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// `begin`, `commit`, `rollback`, `execute:<sql>` or `query:<sql>` in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Rows returned by every query
    pub fn set_rows(
        &self,
        rows: Vec<Row>,
    ) {
        *self.rows.lock() = rows;
    }

    pub fn set_unhealthy(
        &self,
        unhealthy: bool,
    ) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn set_fail_dial(
        &self,
        fail: bool,
    ) {
        self.fail_dial.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollback(
        &self,
        fail: bool,
    ) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    fn record(
        &self,
        call: String,
    ) {
        self.calls.lock().push(call);
    }
}

/// Dials [`FakeDriver`]s that only record what they are asked to do
pub struct FakeDialer {
    log: Arc<DriverLog>,
}

impl FakeDialer {
    pub fn new() -> (Self, Arc<DriverLog>) {
        let log = Arc::new(DriverLog::default());
        (Self { log: log.clone() }, log)
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    type Driver = FakeDriver;

    async fn dial(&self) -> Result<FakeDriver> {
        if self.log.fail_dial.load(Ordering::SeqCst) {
            return Err(PoolError::Dial("connection refused".to_string()).into());
        }
        let id = self.log.dialed.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeDriver {
            id,
            log: self.log.clone(),
        })
    }
}

/// Statements whose SQL mentions `fail` are rejected
pub struct FakeDriver {
    id: usize,
    log: Arc<DriverLog>,
}

impl FakeDriver {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for FakeDriver {
    fn drop(&mut self) {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn execute(
        &mut self,
        statement: &Statement,
    ) -> Result<ExecResult> {
        self.log.record(format!("execute:{}", statement.sql));
        if statement.sql.contains("fail") {
            return Err(PoolError::Driver(format!("rejected: {}", statement.sql)).into());
        }
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(self.id as i64),
        })
    }

    async fn query(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<Row>> {
        self.log.record(format!("query:{}", statement.sql));
        Ok(self.log.rows.lock().clone())
    }

    async fn begin(&mut self) -> Result<()> {
        self.log.record("begin".to_string());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.log.record("commit".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.log.record("rollback".to_string());
        if self.log.fail_rollback.load(Ordering::SeqCst) {
            return Err(PoolError::Driver("rollback failed".to_string()).into());
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.log.unhealthy.load(Ordering::SeqCst)
    }
}
