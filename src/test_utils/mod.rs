//! the test_utils folder here will share utils or test components between unit
//! tests of the sync engine and of the connection pool
mod common;
mod fake_driver;

pub use common::*;
pub use fake_driver::*;
