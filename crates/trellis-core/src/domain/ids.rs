//! Typed identifiers for schedules, tasks, template rows and audit rows.
//!
//! すべて ULID で、`Id<T>` の `T` はコンパイル時だけのマーカー型です。
//! ScheduleId を TaskId の代わりに渡すとコンパイルエラーになります。
//!
//! - Display: `task-01J...` のようにプレフィックス付き（ログ・CLI 表示用）
//! - serde: プレフィックスなしの ULID 文字列（スナップショットと同じ形）
//! - FromStr: どちらの形も受け付ける

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Display で付けるプレフィックスを決めるマーカー
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// u128 から Id を作成（fixture / テスト用）
    pub fn from_u128(value: u128) -> Self {
        Self::from_ulid(Ulid::from_bytes(value.to_be_bytes()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

impl<T: IdMarker> std::str::FromStr for Id<T> {
    type Err = ulid::DecodeError;

    /// プレフィックス付き・なしの両方を受け付ける
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident => $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// 工事 1 件分のタスク集合
    Schedule => "schedule-"
);
id_marker!(Task => "task-");
id_marker!(TemplateRow => "row-");
id_marker!(
    /// ロールオーバー監査ログの 1 行
    AuditEntry => "audit-"
);

/// Identifier of a schedule container (one construction job).
pub type ScheduleId = Id<Schedule>;

/// Identifier of a schedulable task.
pub type TaskId = Id<Task>;

/// Identifier of a row inside a schedule template.
pub type TemplateRowId = Id<TemplateRow>;

/// Identifier of one rollover audit row.
pub type AuditEntryId = Id<AuditEntry>;
