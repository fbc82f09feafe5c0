pub mod cli;
pub mod config;
pub mod feed;
pub mod pipeline;
pub mod storage;
pub mod stream;
