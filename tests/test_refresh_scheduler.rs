use chrono::{TimeZone, Utc};
use flow_radar::market::model::pattern::Timeframe;
use flow_radar::scheduler::refresh_scheduler::{due_classes, next_boundary};

fn at(hour: u32, minute: u32, second: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, second).unwrap()
}

#[test]
fn test_next_boundary_short() {
    // 任意时刻都指向下一个整点
    assert_eq!(next_boundary(Timeframe::H1, at(9, 30, 15)), at(10, 0, 0));
    assert_eq!(next_boundary(Timeframe::H1, at(9, 59, 59)), at(10, 0, 0));
    // 恰在边界上时，边界本身不算"下一个"
    assert_eq!(next_boundary(Timeframe::H1, at(9, 0, 0)), at(10, 0, 0));
}

#[test]
fn test_next_boundary_medium() {
    // 09:03 -> 当日 12:00
    assert_eq!(next_boundary(Timeframe::H4, at(9, 3, 0)), at(12, 0, 0));
    // 恰在 12:00:00 -> 16:00
    assert_eq!(next_boundary(Timeframe::H4, at(12, 0, 0)), at(16, 0, 0));
    assert_eq!(next_boundary(Timeframe::H4, at(12, 0, 1)), at(16, 0, 0));
    // 23:30 -> 跨日 00:00
    assert_eq!(
        next_boundary(Timeframe::H4, at(23, 30, 0)),
        Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_next_boundary_long() {
    let next_midnight = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
    assert_eq!(next_boundary(Timeframe::D1, at(0, 0, 0)), next_midnight);
    assert_eq!(next_boundary(Timeframe::D1, at(23, 59, 59)), next_midnight);
    assert_eq!(next_boundary(Timeframe::D1, at(12, 0, 0)), next_midnight);
}

#[test]
fn test_due_classes_inside_window() {
    assert_eq!(
        due_classes(at(0, 1, 0)),
        vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]
    );
    assert_eq!(
        due_classes(at(0, 0, 0)),
        vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]
    );
    // 8 % 4 == 0 但 hour != 0：1D 不在列
    assert_eq!(due_classes(at(8, 2, 59)), vec![Timeframe::H1, Timeframe::H4]);
    // 非 4 的倍数小时只有 1H
    assert_eq!(due_classes(at(13, 0, 30)), vec![Timeframe::H1]);
}

#[test]
fn test_due_classes_outside_window() {
    // 5 % 4 != 0，且这里重点是分钟在窗口内小时不匹配时的集合
    assert_eq!(due_classes(at(5, 1, 0)), vec![Timeframe::H1]);
    // 分钟超出容差，任何周期都不到点
    assert!(due_classes(at(0, 3, 0)).is_empty());
    assert!(due_classes(at(10, 30, 0)).is_empty());
}
