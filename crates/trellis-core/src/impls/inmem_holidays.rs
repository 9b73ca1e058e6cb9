//! InMemoryHolidays - 固定の祝日テーブル

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Region, ScheduleError};
use crate::ports::HolidaySource;

#[derive(Debug, Default)]
pub struct InMemoryHolidays {
    by_region: BTreeMap<Region, BTreeSet<NaiveDate>>,
    /// 読み込み回数（キャッシュの確認用）
    lookups: AtomicUsize,
}

impl InMemoryHolidays {
    pub fn new(by_region: BTreeMap<Region, BTreeSet<NaiveDate>>) -> Self {
        Self {
            by_region,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_region(
        mut self,
        region: Region,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        self.by_region.entry(region).or_default().extend(dates);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn regions(&self) -> &BTreeMap<Region, BTreeSet<NaiveDate>> {
        &self.by_region
    }
}

#[async_trait]
impl HolidaySource for InMemoryHolidays {
    async fn non_working_dates(&self, region: &Region) -> Result<BTreeSet<NaiveDate>, ScheduleError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        // 未登録のリージョンは祝日なし扱い
        Ok(self.by_region.get(region).cloned().unwrap_or_default())
    }
}
