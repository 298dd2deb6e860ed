#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::time_window::generate_slots;
use crate::domain::model::{ClassDefinition, TimeSlot};
use crate::utils::error::{BookingError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, Validate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub use toml_config::TomlConfig;

pub const DEFAULT_DAY_START_HOUR: u32 = 7;
pub const DEFAULT_DAY_END_HOUR: u32 = 18;
pub const DEFAULT_SLOT_MINUTES: u32 = 30;
pub const DEFAULT_GRACE_MINUTES: i64 = 10;

pub fn default_catalog() -> Vec<ClassDefinition> {
    vec![
        ClassDefinition::new("gim", "Gimnasio", 60),
        ClassDefinition::new("pis", "Piscina", 45),
        ClassDefinition::new("yog", "Yoga", 60),
        ClassDefinition::new("box", "Boxeo", 90),
    ]
}

/// Operating schedule for one deployment. Passed explicitly to the service so
/// several schedules can coexist in one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub slot_minutes: u32,
    pub grace_minutes: i64,
    /// IANA zone the daily schedule is expressed in.
    pub timezone: String,
    pub classes: Vec<ClassDefinition>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_start_hour: DEFAULT_DAY_START_HOUR,
            day_end_hour: DEFAULT_DAY_END_HOUR,
            slot_minutes: DEFAULT_SLOT_MINUTES,
            grace_minutes: DEFAULT_GRACE_MINUTES,
            timezone: "UTC".to_string(),
            classes: default_catalog(),
        }
    }
}

impl ScheduleConfig {
    pub fn day_start(&self) -> TimeSlot {
        TimeSlot::new(self.day_start_hour, 0)
    }

    pub fn day_end(&self) -> TimeSlot {
        TimeSlot::new(self.day_end_hour, 0)
    }

    pub fn slots(&self) -> Result<Vec<TimeSlot>> {
        generate_slots(self.day_start(), self.day_end(), self.slot_minutes)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| BookingError::InvalidConfig {
                field: "schedule.timezone".to_string(),
                value: self.timezone.clone(),
                reason: e.to_string(),
            })
    }

    pub fn find_class(&self, class_id: &str) -> Option<&ClassDefinition> {
        self.classes.iter().find(|c| c.id == class_id)
    }
}

impl Validate for ScheduleConfig {
    fn validate(&self) -> Result<()> {
        validate_range("schedule.day_start_hour", self.day_start_hour, 0, 23)?;
        validate_range("schedule.day_end_hour", self.day_end_hour, 0, 23)?;
        if self.day_start_hour >= self.day_end_hour {
            return Err(BookingError::InvalidConfig {
                field: "schedule.day_end_hour".to_string(),
                value: self.day_end_hour.to_string(),
                reason: format!("Must be after day_start_hour ({})", self.day_start_hour),
            });
        }
        validate_range("schedule.slot_minutes", self.slot_minutes, 1, 720)?;
        if self.grace_minutes < 0 {
            return Err(BookingError::InvalidGrace {
                minutes: self.grace_minutes,
            });
        }
        self.tz()?;

        let mut seen = HashSet::new();
        for class in &self.classes {
            validate_non_empty_string("classes.id", &class.id)?;
            if !seen.insert(class.id.as_str()) {
                return Err(BookingError::InvalidConfig {
                    field: "classes.id".to_string(),
                    value: class.id.clone(),
                    reason: "Class ids must be unique".to_string(),
                });
            }
            validate_non_empty_string("classes.name", &class.name)?;
            if class.duration_minutes == 0 {
                return Err(BookingError::InvalidDuration { minutes: 0 });
            }
        }
        Ok(())
    }
}

/// Timeouts and retries applied to store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    pub timeout: Duration,
    /// Extra attempts for primary-store reads after an `Unavailable` failure.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_attempts: 1,
            retry_delay: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let config = ScheduleConfig::default();

        assert_eq!(config.day_start().to_string(), "07:00");
        assert_eq!(config.day_end().to_string(), "18:00");
        assert_eq!(config.slot_minutes, 30);
        assert_eq!(config.grace_minutes, 10);
        assert_eq!(config.find_class("gim").unwrap().duration_minutes, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_schedules() {
        let mut config = ScheduleConfig {
            day_start_hour: 18,
            day_end_hour: 7,
            ..ScheduleConfig::default()
        };
        assert!(config.validate().is_err());

        config = ScheduleConfig {
            grace_minutes: -1,
            ..ScheduleConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "INVALID_GRACE");

        config = ScheduleConfig {
            timezone: "Mars/Olympus".to_string(),
            ..ScheduleConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_duplicate_class_ids_are_rejected() {
        let mut config = ScheduleConfig::default();
        config.classes.push(ClassDefinition::new("gim", "Gimnasio 2", 30));

        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("gim"));
    }

    #[test]
    fn test_named_timezone() {
        let config = ScheduleConfig {
            timezone: "America/Santiago".to_string(),
            ..ScheduleConfig::default()
        };
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Santiago);
    }
}
