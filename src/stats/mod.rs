pub mod calendar;
pub mod equity;
pub mod summary;

pub use calendar::{CalendarDay, CalendarMonth};
pub use equity::{equity_curve, EquityCurvePoint};
pub use summary::{compute_summary, group_by_date, DailyGroup, DailyGroups, TradeSummary};
