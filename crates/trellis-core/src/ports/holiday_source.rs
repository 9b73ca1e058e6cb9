//! HolidaySource port - 地域ごとの非稼働日
//!
//! 呼び出しは CalendarProvider がリージョン単位でキャッシュするので、
//! 実装側でキャッシュする必要はない。

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Region, ScheduleError};

#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn non_working_dates(&self, region: &Region) -> Result<BTreeSet<NaiveDate>, ScheduleError>;
}
