//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: TaskStore と AuditLog を兼ねるインメモリの正本
//! - **InMemoryHolidays**: 固定テーブルの HolidaySource
//! - **ChannelRunQueue / RecordingRunQueue**: RunQueue
//!
//! 本番用の永続化実装はこのクレートには含めません。

pub mod inmem_holidays;
pub mod inmem_store;
pub mod run_queue;

pub use self::inmem_holidays::InMemoryHolidays;
pub use self::inmem_store::InMemoryTaskStore;
pub use self::run_queue::{ChannelRunQueue, RecordingRunQueue};
