//! 日历边界计算
//!
//! 刷新锚定在各周期蜡烛收盘边界上：1H 每小时整点、4H 逢 0/4/8/12/16/20 点、
//! 1D 每日 UTC 零点。全部为纯函数，时间由调用方传入。

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::market::model::pattern::Timeframe;

/// 整点后的容差窗口（分钟）：minute ∈ [0, 2] 视为在刷新窗口内
pub const DUE_TOLERANCE_MINUTES: u32 = 2;

fn hour_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(now.hour(), 0, 0)
        .expect("整点时刻必然有效")
        .and_utc()
}

/// 下一个边界时刻
///
/// 边界在它开始的那一瞬间不算"下一个"：12:00:00 的下一个 4H 边界是 16:00。
pub fn next_boundary(timeframe: Timeframe, now: DateTime<Utc>) -> DateTime<Utc> {
    match timeframe {
        Timeframe::H1 => hour_start(now) + Duration::hours(1),
        Timeframe::H4 => {
            let mut candidate = hour_start(now) + Duration::hours(1);
            while candidate.hour() % 4 != 0 {
                candidate += Duration::hours(1);
            }
            candidate
        }
        Timeframe::D1 => (now.date_naive() + chrono::Days::new(1))
            .and_hms_opt(0, 0, 0)
            .expect("零点时刻必然有效")
            .and_utc(),
    }
}

/// 当前处于刷新窗口内的周期集合
///
/// 窗口外返回空集；1H 没有额外小时约束，4H 要求 hour % 4 == 0，
/// 1D 要求 hour == 0。
pub fn due_classes(now: DateTime<Utc>) -> Vec<Timeframe> {
    if now.minute() > DUE_TOLERANCE_MINUTES {
        return vec![];
    }

    let mut due = vec![Timeframe::H1];
    if now.hour() % 4 == 0 {
        due.push(Timeframe::H4);
    }
    if now.hour() == 0 {
        due.push(Timeframe::D1);
    }
    due
}

/// 边界时刻（毫秒），落库用
pub fn next_boundary_millis(timeframe: Timeframe, now: DateTime<Utc>) -> i64 {
    next_boundary(timeframe, now).timestamp_millis()
}
