//! Statistics engine.
//!
//! Derives daily, range, trend, comparative, peak-hour and airline reports
//! from stored flight history. The engine owns no storage; every query reads
//! through [`FlightHistory`] and returns a freshly computed value.
//!
//! Absence of data is not an error: a day or window without flights produces
//! a well-formed zero-valued result.
//!
//! Classification of a single record:
//!
//! | class     | rule                                                              |
//! |-----------|-------------------------------------------------------------------|
//! | on-time   | status in {on-time, scheduled, landed, departed, en-route} and delay <= 15 |
//! | delayed   | status is delayed, or delay > 15                                  |
//! | cancelled | status is cancelled                                               |
//!
//! The classes are evaluated independently and need not sum to the total.

use chrono::{Datelike, Duration, NaiveDate};
use log::debug;
use std::collections::{BTreeMap, HashMap};

use super::history::FlightHistory;
use crate::api::{
    AirlinePerformance, AirlineStats, AnalysisPeriod, ComparativeAnalysis, ComparisonType,
    DailyStatistics, DayPerformance, DelayTrend, HourlyStats, HourlyTraffic, PeakHoursAnalysis,
    PerformanceGrade, PerformanceTrend, PeriodChanges, PeriodStats, RangeAggregate,
    RangeStatistics, TrafficIntensity, TrafficTrend, TrendAnalysis, TrendDataPoint, TrendInsights,
    TrendSummary,
};
use crate::models::time::{days_in_range, days_inclusive, same_day_previous_month};
use crate::models::{FlightRecord, SharedClock};

const PEAK_HOUR_COUNT: usize = 4;
const TOP_AIRLINE_COUNT: usize = 10;
const TREND_THRESHOLD: f64 = 5.0;
const INSIGHT_THRESHOLD: f64 = 10.0;

pub struct StatisticsEngine {
    history: FlightHistory,
    clock: SharedClock,
}

impl StatisticsEngine {
    pub fn new(history: FlightHistory, clock: SharedClock) -> Self {
        Self { history, clock }
    }

    /// Window of `period` ending today: `[today - (N - 1), today]`.
    pub fn window(&self, period: AnalysisPeriod) -> (NaiveDate, NaiveDate) {
        let today = self.clock.today();
        (today - Duration::days(period.days() - 1), today)
    }

    pub async fn get_daily_statistics(&self, airport_code: &str, date: NaiveDate) -> DailyStatistics {
        let airport = airport_code.to_uppercase();
        let flights = self.history.flights_for_day(&airport, date).await;
        let stats = compute_daily_statistics(&airport, date, &flights);
        debug!(
            "Daily statistics for {} on {}: {} flights, {}% on-time",
            airport, date, stats.total_flights, stats.on_time_percentage
        );
        stats
    }

    pub async fn get_range_statistics(
        &self,
        airport_code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RangeStatistics {
        let airport = airport_code.to_uppercase();
        let by_day = self.history.flights_by_day(&airport, from, to).await;
        build_range_statistics(&airport, from, to, &by_day)
    }

    pub async fn get_trend_analysis(&self, airport_code: &str, period: AnalysisPeriod) -> TrendAnalysis {
        let (from, to) = self.window(period);
        let range = self.get_range_statistics(airport_code, from, to).await;
        let data_points: Vec<TrendDataPoint> = range
            .daily_stats
            .iter()
            .map(|day| TrendDataPoint {
                date: day.date,
                total_flights: day.total_flights,
                on_time_percentage: day.on_time_percentage,
                average_delay: day.average_delay,
                delay_index: day.delay_index,
            })
            .collect();
        let insights = trend_insights(&data_points);

        TrendAnalysis {
            airport: range.airport,
            period,
            data_points,
            trends: range.trends,
            insights,
        }
    }

    pub async fn get_comparative_analysis(
        &self,
        airport_code: &str,
        comparison_type: ComparisonType,
    ) -> ComparativeAnalysis {
        let airport = airport_code.to_uppercase();
        let ((cur_from, cur_to), (prev_from, prev_to)) =
            comparison_periods(comparison_type, self.clock.today());

        let current = self.period_stats(&airport, cur_from, cur_to).await;
        let previous = self.period_stats(&airport, prev_from, prev_to).await;
        let changes = PeriodChanges {
            traffic_change: round1(percentage_change(
                previous.total_flights as f64,
                current.total_flights as f64,
            )),
            delay_change: round1(percentage_change(
                previous.average_delay as f64,
                current.average_delay as f64,
            )),
            on_time_change: round1(percentage_change(
                previous.on_time_percentage as f64,
                current.on_time_percentage as f64,
            )),
        };

        ComparativeAnalysis {
            airport,
            comparison_type,
            current_period: current,
            previous_period: previous,
            changes,
        }
    }

    async fn period_stats(&self, airport: &str, from: NaiveDate, to: NaiveDate) -> PeriodStats {
        let by_day = self.history.flights_by_day(airport, from, to).await;
        let summary = FlightSummary::of(by_day.values().flatten());
        PeriodStats {
            period: format!("{} to {}", from, to),
            from,
            to,
            total_flights: summary.total,
            on_time_percentage: summary.on_time_percentage(),
            average_delay: summary.average_delay,
            delay_index: summary.delay_index(),
        }
    }

    pub async fn get_peak_hours_analysis(
        &self,
        airport_code: &str,
        period: AnalysisPeriod,
    ) -> PeakHoursAnalysis {
        let airport = airport_code.to_uppercase();
        let (from, to) = self.window(period);
        let by_day = self.history.flights_by_day(&airport, from, to).await;
        let flights: Vec<&FlightRecord> = by_day.values().flatten().collect();
        peak_hours_analysis(&airport, period, &flights)
    }

    pub async fn get_airline_performance(
        &self,
        airport_code: &str,
        period: AnalysisPeriod,
    ) -> Vec<AirlinePerformance> {
        let airport = airport_code.to_uppercase();
        let (from, to) = self.window(period);
        let by_day = self.history.flights_by_day(&airport, from, to).await;
        airline_performance(&airport, period, from, &by_day)
    }
}

// =========================================================
// Pure derivations
// =========================================================

/// Counts and delay figures of a set of flights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightSummary {
    pub total: usize,
    pub on_time: usize,
    pub delayed: usize,
    pub cancelled: usize,
    /// Rounded mean of positive delays.
    pub average_delay: u32,
}

impl FlightSummary {
    pub fn of<'a, I>(flights: I) -> Self
    where
        I: IntoIterator<Item = &'a FlightRecord>,
    {
        let mut summary = FlightSummary::default();
        let mut delay_sum: u64 = 0;
        let mut delay_count: u64 = 0;
        for flight in flights {
            summary.total += 1;
            if flight.is_on_time() {
                summary.on_time += 1;
            }
            if flight.is_delayed() {
                summary.delayed += 1;
            }
            if flight.is_cancelled() {
                summary.cancelled += 1;
            }
            if flight.delay_minutes > 0 {
                delay_sum += u64::from(flight.delay_minutes);
                delay_count += 1;
            }
        }
        if delay_count > 0 {
            summary.average_delay = (delay_sum as f64 / delay_count as f64).round() as u32;
        }
        summary
    }

    pub fn on_time_percentage(&self) -> u32 {
        percentage(self.on_time, self.total)
    }

    pub fn delayed_share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.delayed as f64 / self.total as f64 * 100.0
        }
    }

    pub fn delay_index(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        delay_index(self.delayed_share(), f64::from(self.average_delay))
    }
}

/// Rounded `part / total` in percent; 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0).round() as u32
    }
}

/// `min(100, round(delayed% + (average delay / 60) * 10))`.
pub fn delay_index(delayed_percentage: f64, average_delay_minutes: f64) -> u32 {
    let raw = (delayed_percentage + average_delay_minutes / 60.0 * 10.0).round();
    raw.clamp(0.0, 100.0) as u32
}

/// Percent change from `previous` to `current`.
///
/// A zero `previous` maps to 0 when `current` is also zero, else to 100.
pub fn percentage_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn performance_grade(on_time_percentage: u32) -> PerformanceGrade {
    match on_time_percentage {
        90.. => PerformanceGrade::A,
        80..=89 => PerformanceGrade::B,
        70..=79 => PerformanceGrade::C,
        60..=69 => PerformanceGrade::D,
        _ => PerformanceGrade::F,
    }
}

pub fn traffic_intensity(average_flights: f64) -> TrafficIntensity {
    if average_flights < 2.0 {
        TrafficIntensity::Low
    } else if average_flights < 5.0 {
        TrafficIntensity::Medium
    } else if average_flights < 10.0 {
        TrafficIntensity::High
    } else {
        TrafficIntensity::Peak
    }
}

/// Up to four busiest hours of day, ascending. Ties go to the earlier hour.
pub fn peak_hours(flights: &[FlightRecord]) -> Vec<u32> {
    let mut counts = [0usize; 24];
    for flight in flights {
        counts[flight.scheduled_hour() as usize] += 1;
    }
    let mut hours: Vec<u32> = (0..24u32).filter(|h| counts[*h as usize] > 0).collect();
    hours.sort_by(|a, b| counts[*b as usize].cmp(&counts[*a as usize]));
    hours.truncate(PEAK_HOUR_COUNT);
    hours.sort_unstable();
    hours
}

/// Airlines ranked by flight count, ties in first-seen order, at most ten.
pub fn top_airlines(flights: &[FlightRecord]) -> Vec<AirlineStats> {
    let mut airlines: Vec<AirlineStats> = group_by_airline(flights.iter())
        .into_iter()
        .map(|(code, name, group)| {
            let summary = FlightSummary::of(group.iter().copied());
            AirlineStats {
                code,
                name,
                flights: summary.total,
                on_time_percentage: summary.on_time_percentage(),
                average_delay: summary.average_delay,
            }
        })
        .collect();
    airlines.sort_by(|a, b| b.flights.cmp(&a.flights));
    airlines.truncate(TOP_AIRLINE_COUNT);
    airlines
}

/// Group by airline code keeping first-seen order.
fn group_by_airline<'a, I>(flights: I) -> Vec<(String, String, Vec<&'a FlightRecord>)>
where
    I: IntoIterator<Item = &'a FlightRecord>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(String, String, Vec<&'a FlightRecord>)> = Vec::new();
    for flight in flights {
        match index.get(flight.airline_code.as_str()) {
            Some(&i) => groups[i].2.push(flight),
            None => {
                index.insert(flight.airline_code.as_str(), groups.len());
                let name = if flight.airline_name.is_empty() {
                    flight.airline_code.clone()
                } else {
                    flight.airline_name.clone()
                };
                groups.push((flight.airline_code.clone(), name, vec![flight]));
            }
        }
    }
    groups
}

/// Fixed 24-bucket histogram by scheduled hour.
pub fn hourly_distribution(flights: &[FlightRecord]) -> Vec<HourlyStats> {
    let mut buckets: Vec<Vec<&FlightRecord>> = vec![Vec::new(); 24];
    for flight in flights {
        buckets[flight.scheduled_hour() as usize].push(flight);
    }
    buckets
        .into_iter()
        .enumerate()
        .map(|(hour, group)| {
            let summary = FlightSummary::of(group);
            HourlyStats {
                hour: hour as u32,
                flights: summary.total,
                average_delay: summary.average_delay,
                on_time_percentage: summary.on_time_percentage(),
            }
        })
        .collect()
}

/// Statistics of one day's flights.
pub fn compute_daily_statistics(airport: &str, date: NaiveDate, flights: &[FlightRecord]) -> DailyStatistics {
    let summary = FlightSummary::of(flights);
    DailyStatistics {
        airport: airport.to_string(),
        date,
        total_flights: summary.total,
        on_time_flights: summary.on_time,
        delayed_flights: summary.delayed,
        cancelled_flights: summary.cancelled,
        average_delay: summary.average_delay,
        on_time_percentage: summary.on_time_percentage(),
        delay_index: summary.delay_index(),
        peak_hours: peak_hours(flights),
        top_airlines: top_airlines(flights),
        hourly_distribution: hourly_distribution(flights),
    }
}

/// Range statistics over `[from, to]` given each day's flights.
///
/// Days missing from `by_day` count as days without flights.
pub fn build_range_statistics(
    airport: &str,
    from: NaiveDate,
    to: NaiveDate,
    by_day: &BTreeMap<NaiveDate, Vec<FlightRecord>>,
) -> RangeStatistics {
    let daily_stats: Vec<DailyStatistics> = days_inclusive(from, to)
        .map(|date| {
            let flights = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            compute_daily_statistics(airport, date, flights)
        })
        .collect();

    let summary = FlightSummary::of(
        by_day
            .iter()
            .filter(|(d, _)| **d >= from && **d <= to)
            .flat_map(|(_, f)| f.iter()),
    );
    let total_days = days_in_range(from, to);

    let aggregated = RangeAggregate {
        total_flights: summary.total,
        average_flights_per_day: if total_days == 0 {
            0
        } else {
            (summary.total as f64 / total_days as f64).round() as u32
        },
        overall_on_time_percentage: summary.on_time_percentage(),
        overall_delayed_percentage: summary.delayed_share().round() as u32,
        overall_average_delay: summary.average_delay,
        best_day: pick_day(&daily_stats, |candidate, best| candidate > best),
        worst_day: pick_day(&daily_stats, |candidate, worst| candidate < worst),
    };

    RangeStatistics {
        airport: airport.to_string(),
        from_date: from,
        to_date: to,
        total_days,
        trends: classify_trends(&daily_stats),
        daily_stats,
        aggregated,
    }
}

/// Best or worst day by on-time percentage among days with flights; the
/// first occurrence wins ties. Falls back to the first day when no day has
/// flights.
fn pick_day<F>(days: &[DailyStatistics], better: F) -> Option<DayPerformance>
where
    F: Fn(u32, u32) -> bool,
{
    let mut with_flights = days.iter().filter(|d| d.total_flights > 0);
    let first = with_flights.next().or_else(|| days.first())?;
    let chosen = with_flights.fold(first, |best, day| {
        if better(day.on_time_percentage, best.on_time_percentage) {
            day
        } else {
            best
        }
    });
    Some(DayPerformance {
        date: chosen.date,
        on_time_percentage: chosen.on_time_percentage,
    })
}

/// Compare the mean traffic and delay of the first and second half of `days`.
pub fn classify_trends(days: &[DailyStatistics]) -> TrendSummary {
    if days.len() < 2 {
        return TrendSummary::default();
    }
    let (first, second) = days.split_at(days.len() / 2);
    let mean = |half: &[DailyStatistics], f: fn(&DailyStatistics) -> f64| {
        half.iter().map(f).sum::<f64>() / half.len() as f64
    };

    let traffic_change = percentage_change(
        mean(first, |d| d.total_flights as f64),
        mean(second, |d| d.total_flights as f64),
    );
    let delay_change = percentage_change(
        mean(first, |d| f64::from(d.average_delay)),
        mean(second, |d| f64::from(d.average_delay)),
    );

    TrendSummary {
        traffic_trend: if traffic_change > TREND_THRESHOLD {
            TrafficTrend::Increasing
        } else if traffic_change < -TREND_THRESHOLD {
            TrafficTrend::Decreasing
        } else {
            TrafficTrend::Stable
        },
        delay_trend: if delay_change > TREND_THRESHOLD {
            DelayTrend::Worsening
        } else if delay_change < -TREND_THRESHOLD {
            DelayTrend::Improving
        } else {
            DelayTrend::Stable
        },
        trend_percentage: traffic_change.round() as i64,
    }
}

/// First-versus-last-day changes, best and worst day, and recommendations.
pub fn trend_insights(points: &[TrendDataPoint]) -> TrendInsights {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return TrendInsights::default();
    };

    let traffic_change = percentage_change(first.total_flights as f64, last.total_flights as f64);
    let delay_change = percentage_change(f64::from(first.average_delay), f64::from(last.average_delay));

    let with_flights: Vec<&TrendDataPoint> = points.iter().filter(|p| p.total_flights > 0).collect();
    let best = with_flights.iter().copied().fold(None::<&TrendDataPoint>, |best, p| match best {
        Some(b) if p.on_time_percentage <= b.on_time_percentage => Some(b),
        _ => Some(p),
    });
    let worst = with_flights.iter().copied().fold(None::<&TrendDataPoint>, |worst, p| match worst {
        Some(w) if p.on_time_percentage >= w.on_time_percentage => Some(w),
        _ => Some(p),
    });

    let mut recommendations = Vec::new();
    if traffic_change > INSIGHT_THRESHOLD {
        recommendations.push("Traffic is increasing significantly. Consider capacity planning.".to_string());
    } else if traffic_change < -INSIGHT_THRESHOLD {
        recommendations.push("Traffic is decreasing. Investigate potential causes.".to_string());
    }
    if delay_change > INSIGHT_THRESHOLD {
        recommendations.push("Delays are increasing. Review operational procedures.".to_string());
    } else if delay_change < -INSIGHT_THRESHOLD {
        recommendations.push("Delays are improving. Continue current practices.".to_string());
    }
    if !with_flights.is_empty() {
        let average_on_time = with_flights
            .iter()
            .map(|p| f64::from(p.on_time_percentage))
            .sum::<f64>()
            / with_flights.len() as f64;
        if average_on_time < 70.0 {
            recommendations.push(
                "On-time performance is below industry standards. Focus on punctuality improvements."
                    .to_string(),
            );
        }
    }

    TrendInsights {
        traffic_change: traffic_change.round() as i64,
        delay_change: delay_change.round() as i64,
        best_performing_day: best.map(|p| p.date),
        worst_performing_day: worst.map(|p| p.date),
        recommendations,
    }
}

/// Current and previous `[from, to]` periods for a comparison, relative to `today`.
pub fn comparison_periods(
    comparison_type: ComparisonType,
    today: NaiveDate,
) -> ((NaiveDate, NaiveDate), (NaiveDate, NaiveDate)) {
    let day = Duration::days(1);
    match comparison_type {
        ComparisonType::DayOverDay => ((today, today), (today - day, today - day)),
        ComparisonType::WeekOverWeek => {
            let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
            let previous_start = week_start - Duration::days(7);
            (
                (week_start, week_start + Duration::days(6)),
                (previous_start, week_start - day),
            )
        }
        ComparisonType::MonthOverMonth => {
            let month_start = today.with_day(1).unwrap_or(today);
            let next_month = month_start
                .checked_add_months(chrono::Months::new(1))
                .unwrap_or(month_start + Duration::days(31));
            let previous_start = same_day_previous_month(month_start);
            (
                (month_start, next_month - day),
                (previous_start, month_start - day),
            )
        }
        ComparisonType::SameDayLastWeek => {
            let week_ago = today - Duration::days(7);
            ((today, today), (week_ago, week_ago))
        }
        ComparisonType::SameDayLastMonth => {
            let month_ago = same_day_previous_month(today);
            ((today, today), (month_ago, month_ago))
        }
    }
}

/// Per-hour traffic over a window of `period.days()` days.
pub fn peak_hours_analysis(
    airport: &str,
    period: AnalysisPeriod,
    flights: &[&FlightRecord],
) -> PeakHoursAnalysis {
    let days = period.days() as f64;
    let mut buckets: Vec<Vec<&FlightRecord>> = vec![Vec::new(); 24];
    for flight in flights.iter().copied() {
        buckets[flight.scheduled_hour() as usize].push(flight);
    }

    let hourly_data: Vec<HourlyTraffic> = buckets
        .iter()
        .enumerate()
        .map(|(hour, group)| {
            let average_flights = group.len() as f64 / days;
            HourlyTraffic {
                hour: hour as u32,
                average_flights: round1(average_flights),
                average_delay: FlightSummary::of(group.iter().copied()).average_delay,
                traffic_intensity: traffic_intensity(average_flights),
            }
        })
        .collect();

    let (peak_hours, quiet_hours, recommendations) = if flights.is_empty() {
        (Vec::new(), Vec::new(), Vec::new())
    } else {
        let mut by_traffic: Vec<&HourlyTraffic> = hourly_data.iter().collect();
        by_traffic.sort_by(|a, b| b.average_flights.total_cmp(&a.average_flights));

        let mut peak: Vec<u32> = by_traffic.iter().take(PEAK_HOUR_COUNT).map(|h| h.hour).collect();
        peak.sort_unstable();
        let mut quiet: Vec<u32> = by_traffic
            .iter()
            .skip(by_traffic.len().saturating_sub(PEAK_HOUR_COUNT))
            .map(|h| h.hour)
            .collect();
        quiet.sort_unstable();

        let recommendations = peak_hour_recommendations(&hourly_data, &peak, &quiet);
        (peak, quiet, recommendations)
    };

    PeakHoursAnalysis {
        airport: airport.to_string(),
        period,
        hourly_data,
        peak_hours,
        quiet_hours,
        recommendations,
    }
}

fn peak_hour_recommendations(hourly: &[HourlyTraffic], peak: &[u32], quiet: &[u32]) -> Vec<String> {
    let label = |hours: &[u32]| {
        hours
            .iter()
            .map(|h| format!("{}:00", h))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut recommendations = vec![
        format!("Peak traffic hours: {}", label(peak)),
        format!("Quietest hours: {}", label(quiet)),
    ];

    if !peak.is_empty() {
        let peak_delay = peak
            .iter()
            .map(|h| f64::from(hourly[*h as usize].average_delay))
            .sum::<f64>()
            / peak.len() as f64;
        if peak_delay > 20.0 {
            recommendations
                .push("Consider additional resources during peak hours to reduce delays.".to_string());
        }
    }
    recommendations
}

/// Per-airline performance over a window starting at `from`.
///
/// The trend compares the on-time percentage of the window's first half with
/// its second half; both halves need flights for a non-stable trend.
pub fn airline_performance(
    airport: &str,
    period: AnalysisPeriod,
    from: NaiveDate,
    by_day: &BTreeMap<NaiveDate, Vec<FlightRecord>>,
) -> Vec<AirlinePerformance> {
    let midpoint = from + Duration::days(period.days() / 2);

    let mut report: Vec<AirlinePerformance> = group_by_airline(by_day.values().flatten())
        .into_iter()
        .map(|(code, name, group)| {
            let summary = FlightSummary::of(group.iter().copied());
            let on_time_percentage = summary.on_time_percentage();
            let (early, late): (Vec<&FlightRecord>, Vec<&FlightRecord>) =
                group.iter().copied().partition(|f| f.scheduled_date() < midpoint);

            AirlinePerformance {
                airline_code: code,
                airline_name: name,
                airport: airport.to_string(),
                period,
                total_flights: summary.total,
                on_time_flights: summary.on_time,
                delayed_flights: summary.delayed,
                cancelled_flights: summary.cancelled,
                average_delay: summary.average_delay,
                on_time_percentage,
                performance_grade: performance_grade(on_time_percentage),
                trend: performance_trend(&early, &late),
            }
        })
        .collect();

    report.sort_by(|a, b| b.total_flights.cmp(&a.total_flights));
    report
}

fn performance_trend(early: &[&FlightRecord], late: &[&FlightRecord]) -> PerformanceTrend {
    if early.is_empty() || late.is_empty() {
        return PerformanceTrend::Stable;
    }
    let before = f64::from(FlightSummary::of(early.iter().copied()).on_time_percentage());
    let after = f64::from(FlightSummary::of(late.iter().copied()).on_time_percentage());
    let delta = after - before;
    if delta > TREND_THRESHOLD {
        PerformanceTrend::Improving
    } else if delta < -TREND_THRESHOLD {
        PerformanceTrend::Declining
    } else {
        PerformanceTrend::Stable
    }
}

#[cfg(test)]
#[path = "statistics_tests.rs"]
mod tests;
