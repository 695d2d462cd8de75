use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::weeks::{self, Dated};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub training_done: bool,
    pub calories: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheatMeal {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    pub description: String,
    pub estimated_impact: Option<String>,
}

impl Dated for DailyLog {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for CheatMeal {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub week_number: u32,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub entries: usize,
    pub trained_days: usize,
    pub avg_weight: Option<f64>,
    pub weight_change: Option<f64>,
    pub avg_sleep_hours: Option<f64>,
    pub total_calories: Option<i64>,
}

pub(crate) fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    weeks::parse_calendar_date(&raw).map_err(serde::de::Error::custom)
}
