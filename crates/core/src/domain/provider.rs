use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock working hours for one weekday, in the provider's own timezone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub display_name: String,
    /// IANA zone name, e.g. `America/New_York`.
    pub timezone: String,
    pub service_categories: Vec<String>,
    pub working_hours: Vec<WorkingWindow>,
}

impl Provider {
    pub fn tz(&self) -> Option<Tz> {
        self.timezone.parse::<Tz>().ok()
    }

    pub fn windows_for(&self, weekday: Weekday) -> impl Iterator<Item = &WorkingWindow> {
        self.working_hours
            .iter()
            .filter(move |window| window.weekday == weekday && window.start < window.end)
    }

    pub fn offers(&self, service_category: &str) -> bool {
        let wanted = service_category.trim();
        self.service_categories.iter().any(|category| category.eq_ignore_ascii_case(wanted))
    }
}

/// Weekdays are persisted as `0 = Monday .. 6 = Sunday`.
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_monday() as u8
}

pub fn weekday_from_index(index: i64) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Weekday};

    use super::{weekday_from_index, weekday_index, Provider, ProviderId, WorkingWindow};

    fn provider() -> Provider {
        Provider {
            id: ProviderId("prov-1".to_string()),
            display_name: "Dr. Ivanov".to_string(),
            timezone: "America/New_York".to_string(),
            service_categories: vec!["checkup".to_string(), "cleaning".to_string()],
            working_hours: vec![
                WorkingWindow {
                    weekday: Weekday::Mon,
                    start: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
                    end: NaiveTime::from_hms_opt(17, 0, 0).expect("time"),
                },
                WorkingWindow {
                    weekday: Weekday::Tue,
                    start: NaiveTime::from_hms_opt(12, 0, 0).expect("time"),
                    end: NaiveTime::from_hms_opt(12, 0, 0).expect("time"),
                },
            ],
        }
    }

    #[test]
    fn offers_matches_case_insensitively() {
        let provider = provider();
        assert!(provider.offers("Checkup"));
        assert!(provider.offers(" cleaning "));
        assert!(!provider.offers("whitening"));
    }

    #[test]
    fn degenerate_windows_are_ignored() {
        let provider = provider();
        assert_eq!(provider.windows_for(Weekday::Mon).count(), 1);
        assert_eq!(provider.windows_for(Weekday::Tue).count(), 0);
        assert_eq!(provider.windows_for(Weekday::Sun).count(), 0);
    }

    #[test]
    fn weekday_index_round_trips_through_storage_form() {
        for index in 0..7 {
            let weekday = weekday_from_index(index).expect("weekday");
            assert_eq!(i64::from(weekday_index(weekday)), index);
        }
        assert_eq!(weekday_from_index(7), None);
    }

    #[test]
    fn unknown_timezone_is_not_parsed() {
        let mut provider = provider();
        assert!(provider.tz().is_some());
        provider.timezone = "Mars/Olympus".to_string();
        assert!(provider.tz().is_none());
    }
}
