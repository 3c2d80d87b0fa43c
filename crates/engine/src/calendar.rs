use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;

use common::{CalendarSettings, Clock, Result, TradingSchedule, TradingScheduleProvider};

/// Trading calendar built from configured session hours, weekdays and holidays.
pub struct ExchangeCalendar {
    settings: CalendarSettings,
    clock: Arc<dyn Clock>,
}

impl ExchangeCalendar {
    pub fn new(settings: CalendarSettings, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    /// Schedule for `date`. Non-trading days still carry the nominal hours.
    pub fn schedule_for(&self, date: NaiveDate) -> TradingSchedule {
        let is_trading_day = self.settings.weekdays.contains(&date.weekday())
            && !self.settings.holidays.contains(&date);
        TradingSchedule {
            is_trading_day,
            start: at(date, self.settings.open),
            end: at(date, self.settings.close),
        }
    }
}

fn at(date: NaiveDate, time: NaiveTime) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

#[async_trait]
impl TradingScheduleProvider for ExchangeCalendar {
    async fn todays_schedule(&self) -> Result<TradingSchedule> {
        let today = self.clock.now().date_naive();
        let schedule = self.schedule_for(today);
        debug!(%today, trading = schedule.is_trading_day, start = %schedule.start, end = %schedule.end, "Trading schedule");
        Ok(schedule)
    }
}
