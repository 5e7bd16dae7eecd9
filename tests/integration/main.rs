//! Integration tests over the public API

mod common;
mod export_test;
mod pipeline_test;
mod store_test;
