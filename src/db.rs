use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CheatMeal, DailyLog};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let logs = vec![
        ("seed-log-001", "2026-01-05", Some(82.4), Some(7.0), true, Some(2250), "Full body session"),
        ("seed-log-002", "2026-01-07", Some(82.1), Some(6.5), false, Some(2100), "Rest day"),
        ("seed-log-003", "2026-01-10", Some(81.8), Some(8.0), true, Some(2300), "Long run"),
        ("seed-log-004", "2026-01-13", Some(81.5), Some(7.5), true, None, "Upper body"),
        ("seed-log-005", "2026-01-16", None, Some(6.0), false, Some(2600), "Travel"),
        ("seed-log-006", "2026-01-20", Some(81.0), Some(7.0), true, Some(2200), "Legs"),
    ];

    for (source_key, date, weight, sleep_hours, training_done, calories, notes) in logs {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").context("invalid seed date")?;
        insert_daily_log(
            pool,
            source_key,
            &DailyLog {
                id: Uuid::new_v4(),
                date,
                weight,
                sleep_hours,
                training_done,
                calories,
                notes: Some(notes.to_string()),
            },
        )
        .await?;
    }

    let meals = vec![
        ("seed-meal-001", "2026-01-09", "Pizza with friends", Some("moderate")),
        ("seed-meal-002", "2026-01-17", "Birthday cake", None),
    ];

    for (source_key, date, description, impact) in meals {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").context("invalid seed date")?;
        sqlx::query(
            r#"
            INSERT INTO fit_tracker.cheat_meals
            (id, meal_date, description, estimated_impact, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(date)
        .bind(description)
        .bind(impact)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    tracing::info!("seeded sample daily logs and cheat meals");
    Ok(())
}

async fn insert_daily_log(pool: &PgPool, source_key: &str, log: &DailyLog) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO fit_tracker.daily_logs
        (id, log_date, weight, sleep_hours, training_done, calories, notes, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(log.id)
    .bind(log.date)
    .bind(log.weight)
    .bind(log.sleep_hours)
    .bind(log.training_done)
    .bind(log.calories)
    .bind(&log.notes)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_daily_logs(pool: &PgPool) -> anyhow::Result<Vec<DailyLog>> {
    let rows = sqlx::query(
        "SELECT id, log_date, weight, sleep_hours, training_done, calories, notes \
         FROM fit_tracker.daily_logs \
         ORDER BY log_date",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch daily logs")?;

    let logs = rows
        .into_iter()
        .map(|row| DailyLog {
            id: row.get("id"),
            date: row.get("log_date"),
            weight: row.get("weight"),
            sleep_hours: row.get("sleep_hours"),
            training_done: row.get("training_done"),
            calories: row.get("calories"),
            notes: row.get("notes"),
        })
        .collect::<Vec<_>>();

    tracing::debug!(count = logs.len(), "fetched daily logs");
    Ok(logs)
}

pub async fn fetch_cheat_meals(pool: &PgPool) -> anyhow::Result<Vec<CheatMeal>> {
    let rows = sqlx::query(
        "SELECT id, meal_date, description, estimated_impact \
         FROM fit_tracker.cheat_meals \
         ORDER BY meal_date",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch cheat meals")?;

    let meals = rows
        .into_iter()
        .map(|row| CheatMeal {
            id: row.get("id"),
            date: row.get("meal_date"),
            description: row.get("description"),
            estimated_impact: row.get("estimated_impact"),
        })
        .collect::<Vec<_>>();

    tracing::debug!(count = meals.len(), "fetched cheat meals");
    Ok(meals)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(deserialize_with = "crate::models::calendar_date")]
        date: NaiveDate,
        weight: Option<f64>,
        sleep_hours: Option<f64>,
        #[serde(default)]
        training_done: bool,
        calories: Option<i32>,
        notes: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        // One log per calendar day unless the file says otherwise.
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("log-{}", row.date));

        let log = DailyLog {
            id: Uuid::new_v4(),
            date: row.date,
            weight: row.weight,
            sleep_hours: row.sleep_hours,
            training_done: row.training_done,
            calories: row.calories,
            notes: row.notes,
        };

        if insert_daily_log(pool, &source_key, &log).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "rows already imported under the same source_key");
    }
    tracing::info!(inserted, path = %csv_path.display(), "imported daily logs");
    Ok(inserted)
}
