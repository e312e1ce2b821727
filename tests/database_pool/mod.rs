mod concurrent_borrow_test;
