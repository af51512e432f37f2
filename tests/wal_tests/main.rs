//! WAL test suite
