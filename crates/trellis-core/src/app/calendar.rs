//! CalendarProvider - リージョンごとの WorkingCalendar をメモ化
//!
//! # 方針
//! - 祝日は HolidaySource から 1 リージョンにつき 1 回だけ読む
//! - リージョン未設定・読み込み失敗は「週パターンのみ（祝日なし）」にフォールバック
//!   （失敗はキャッシュしないので次回また読みに行く）
//! - ロールオーバー開始時に invalidate() して祝日を読み直す

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::config::CalendarSettings;
use crate::domain::{Region, WorkingCalendar};
use crate::ports::HolidaySource;

pub struct CalendarProvider {
    settings: CalendarSettings,
    source: Arc<dyn HolidaySource>,
    cache: Mutex<HashMap<Option<Region>, Arc<WorkingCalendar>>>,
}

impl CalendarProvider {
    pub fn new(settings: CalendarSettings, source: Arc<dyn HolidaySource>) -> Self {
        Self {
            settings,
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 指定リージョン（なければ既定リージョン）のカレンダー
    pub async fn calendar_for(&self, region: Option<&Region>) -> Arc<WorkingCalendar> {
        let region = region.or(self.settings.default_region.as_ref()).cloned();

        let mut cache = self.cache.lock().await;
        if let Some(calendar) = cache.get(&region) {
            return Arc::clone(calendar);
        }

        let Some(code) = region.as_ref() else {
            warn!("no region configured; using weekly pattern without holidays");
            let calendar = Arc::new(WorkingCalendar::weekly(self.settings.pattern.clone()));
            cache.insert(None, Arc::clone(&calendar));
            return calendar;
        };

        match self.source.non_working_dates(code).await {
            Ok(holidays) => {
                let calendar = Arc::new(WorkingCalendar::new(
                    self.settings.pattern.clone(),
                    holidays,
                ));
                cache.insert(region, Arc::clone(&calendar));
                calendar
            }
            Err(err) => {
                warn!(region = %code, error = %err, "holiday lookup failed; using weekly pattern");
                Arc::new(WorkingCalendar::weekly(self.settings.pattern.clone()))
            }
        }
    }

    /// キャッシュを捨てる（次回の calendar_for で読み直す）
    pub async fn invalidate(&self) {
        self.cache.lock().await.clear();
    }
}
