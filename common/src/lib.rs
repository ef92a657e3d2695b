#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::result_large_err)]

pub mod error;
pub mod storage;
pub mod utils;
