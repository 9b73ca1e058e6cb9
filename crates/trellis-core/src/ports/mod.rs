//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（DB, 祝日データ, ジョブキュー）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod audit_log;
pub mod clock;
pub mod holiday_source;
pub mod id_generator;
pub mod run_queue;
pub mod task_store;

pub use self::audit_log::AuditLog;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::holiday_source::HolidaySource;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::run_queue::RunQueue;
pub use self::task_store::TaskStore;
