// src/main.rs
//! 交易联赛服务：交易日志、联赛排行、材料审核，外加审计日志与限流。
mod core;
mod dtos;
mod entity;
mod extractors;
mod handlers;
mod middleware;
mod routes;
mod services;
mod start;
mod state;
mod utils;

#[tokio::main]
async fn main() {
    start::run().await;
}
