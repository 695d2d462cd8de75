use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{CheatMeal, DailyLog, WeekSummary};
use crate::weeks::{self, WeekBucket};

pub fn summarize_week(bucket: &WeekBucket<&DailyLog>) -> WeekSummary {
    let logs = &bucket.records;

    let weights: Vec<f64> = logs.iter().filter_map(|log| log.weight).collect();
    let sleep: Vec<f64> = logs.iter().filter_map(|log| log.sleep_hours).collect();
    let calories: Vec<i64> = logs.iter().filter_map(|log| log.calories).map(i64::from).collect();

    // Buckets hold newest first. The change spans the week's first and last
    // logged days and is unknown if either of them has no weight.
    let weight_change = match (logs.last(), logs.first()) {
        (Some(oldest), Some(newest)) if logs.len() > 1 => {
            oldest.weight.zip(newest.weight).map(|(first, last)| last - first)
        }
        _ => None,
    };

    WeekSummary {
        week_number: bucket.info.week_number,
        week_start: bucket.info.week_start,
        week_end: bucket.info.week_end,
        entries: logs.len(),
        trained_days: logs.iter().filter(|log| log.training_done).count(),
        avg_weight: average(&weights),
        weight_change,
        avg_sleep_hours: average(&sleep),
        total_calories: (!calories.is_empty()).then(|| calories.iter().sum()),
    }
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Markdown report of the weeks on or after `since`. Week numbering stays
/// anchored at the earliest log even when older weeks are hidden.
pub fn build_report(
    logs: &[DailyLog],
    meals: &[CheatMeal],
    today: NaiveDate,
    since: Option<NaiveDate>,
) -> String {
    let reference = weeks::first_date(logs);
    let visible = |date: NaiveDate| since.map_or(true, |since| date >= since);
    let buckets = weeks::weekly_buckets(logs.iter().filter(|log| visible(log.date)), reference);
    let meals: Vec<&CheatMeal> = meals.iter().filter(|meal| visible(meal.date)).collect();

    let mut output = String::new();
    let _ = writeln!(output, "# Weekly Progress Report");

    match reference {
        Some(first) => {
            let _ = writeln!(
                output,
                "Tracking since {} (today is week {}, day {})",
                first,
                weeks::week_number(today, reference),
                weeks::day_in_week(today, reference)
            );
        }
        None => {
            let _ = writeln!(output, "No daily logs recorded yet.");
        }
    }

    for bucket in buckets.iter() {
        let summary = summarize_week(bucket);
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## Week {} ({} to {})",
            summary.week_number, summary.week_start, summary.week_end
        );
        let _ = write!(
            output,
            "{} entries, trained {} days",
            summary.entries, summary.trained_days
        );
        if let Some(calories) = summary.total_calories {
            let _ = write!(output, ", {} kcal", calories);
        }
        let _ = writeln!(output);
        if let Some(avg) = summary.avg_weight {
            let _ = write!(output, "Average weight {:.1} kg", avg);
            if let Some(change) = summary.weight_change {
                let _ = write!(output, " ({:+.1} kg)", change);
            }
            let _ = writeln!(output);
        }
        if let Some(sleep) = summary.avg_sleep_hours {
            let _ = writeln!(output, "Average sleep {:.1} h", sleep);
        }

        for log in bucket.records.iter() {
            let _ = writeln!(output, "- {}", describe_log(log, reference));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cheat Meals");

    if meals.is_empty() {
        let _ = writeln!(output, "No cheat meals recorded.");
    } else {
        // Meals share the daily-log week numbering.
        for bucket in weeks::weekly_buckets(meals, reference) {
            let _ = writeln!(
                output,
                "- Week {} ({} to {}): {} meals",
                bucket.info.week_number,
                bucket.info.week_start,
                bucket.info.week_end,
                bucket.records.len()
            );
            for meal in bucket.records {
                let _ = write!(output, "  - {}: {}", meal.date, meal.description);
                if let Some(impact) = &meal.estimated_impact {
                    let _ = write!(output, " (impact: {})", impact);
                }
                let _ = writeln!(output);
            }
        }
    }

    output
}

pub fn describe_log(log: &DailyLog, reference: Option<NaiveDate>) -> String {
    let mut line = format!(
        "Day {} ({})",
        weeks::day_in_week(log.date, reference),
        log.date
    );
    if let Some(weight) = log.weight {
        let _ = write!(line, " {:.1} kg", weight);
    }
    if let Some(sleep) = log.sleep_hours {
        let _ = write!(line, ", slept {:.1} h", sleep);
    }
    if log.training_done {
        line.push_str(", trained");
    }
    if let Some(calories) = log.calories {
        let _ = write!(line, ", {} kcal", calories);
    }
    if let Some(notes) = log.notes.as_deref().filter(|notes| !notes.is_empty()) {
        let _ = write!(line, ": {}", notes);
    }
    line
}
