//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **CalendarProvider**: リージョンごとの稼働日カレンダー（メモ化）
//! - **CascadeEngine**: 日付変更の後続タスクへの伝播とプレビュー
//! - **TemplateInstantiator**: テンプレートからのタスク生成と初期日付
//! - **TaskSpawner**: 完了・着手に応じた補助タスクの生成
//! - **RolloverJob**: 期限切れタスクの移動と監査ログ
//! - **RolloverScheduler / RolloverLoop**: ロールオーバーの定期実行

pub mod calendar;
pub mod cascade;
pub mod instantiate;
pub mod rollover;
pub mod rollover_loop;
pub mod spawner;

pub use self::calendar::CalendarProvider;
pub use self::cascade::{
    BlockedSuccessor, CascadeEngine, CascadePreview, CascadeReport, ChangedField,
    PreviewedSuccessor, SkippedTask,
};
pub use self::instantiate::{InstantiationReport, TemplateInstantiator};
pub use self::rollover::{RolloverJob, next_run_at};
pub use self::rollover_loop::{RolloverLoop, RolloverScheduler};
pub use self::spawner::{PlannedSpawn, SpawnReport, SpawnTrigger, TaskSpawner};
