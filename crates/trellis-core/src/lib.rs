//! trellis-core
//!
//! Schedule dependency cascade engine: working calendars, dependency
//! propagation with locks, template instantiation, follow-up task spawning
//! and the overdue-task rollover job.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, dependency, graph, calendar, template, audit, state, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, AuditLog, HolidaySource, RunQueue, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（cascade, instantiate, spawner, rollover, rollover_loop, calendar）
//! - **impls**: 実装（InMemoryTaskStore など開発・テスト用）
//! - **config**: TOML 設定の読み込みと検証

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
