use chrono_tz::Tz;

use crate::domain::interval::TimeRange;

/// Short North American zone label, falling back to the IANA name.
pub fn zone_label(tz: Tz) -> String {
    let name = tz.name();
    let label = if name.contains("Los_Angeles") || name.contains("Pacific") {
        "PT"
    } else if name.contains("Denver") || name.contains("Mountain") {
        "MT"
    } else if name.contains("Chicago") || name.contains("Central") {
        "CT"
    } else if name.contains("New_York") || name.contains("Eastern") {
        "ET"
    } else {
        name
    };
    label.to_string()
}

/// Renders e.g. `Tue, Mar 3 10:00 AM – 10:30 AM (ET)`.
pub fn format_range(range: &TimeRange, tz: Tz) -> String {
    let start = range.start.with_timezone(&tz);
    let end = range.end.with_timezone(&tz);
    format!(
        "{} – {} ({})",
        start.format("%a, %b %-d %-I:%M %p"),
        end.format("%-I:%M %p"),
        zone_label(tz)
    )
}
