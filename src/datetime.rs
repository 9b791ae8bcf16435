use crate::Object;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day][hour][minute][second]");

impl From<OffsetDateTime> for Object {
    fn from(date: OffsetDateTime) -> Self {
        // Can only fail if DATE_FORMAT itself were invalid.
        let base = date.format(DATE_FORMAT).expect("date format");
        let offset = date.offset();
        let text = if offset.is_utc() {
            format!("D:{}Z", base)
        } else {
            let sign = if offset.is_negative() { '-' } else { '+' };
            format!(
                "D:{}{}{:02}'{:02}'",
                base,
                sign,
                offset.whole_hours().abs(),
                offset.minutes_past_hour().abs()
            )
        };
        Object::string_literal(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn utc_dates_use_z_suffix() {
        let object = Object::from(datetime!(2023-04-05 06:07:08 UTC));
        assert_eq!(object.as_str().unwrap(), b"D:20230405060708Z");
    }

    #[test]
    fn offsets_use_apostrophe_notation() {
        let object = Object::from(datetime!(2023-04-05 06:07:08 -5:30));
        assert_eq!(object.as_str().unwrap(), b"D:20230405060708-05'30'");
    }
}
