use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// `YYYY:MM:DD HH:MM:SS`, with `-` accepted in place of `:`.
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)[:-](\d+)[:-](\d+) (\d+)[:-](\d+)[:-](\d+)$").unwrap()
});

/// Capture time as written in the image metadata. No calendar validation is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Timestamp {
    /// Parse an EXIF date string. Returns `None` unless it has exactly a date part and a
    /// time part, each with three numeric components.
    pub fn parse(s: &str) -> Option<Self> {
        let cleaned = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        let caps = TIMESTAMP_RE.captures(cleaned)?;
        let field = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

        Some(Self {
            year: field(1)?,
            month: field(2)?,
            day: field(3)?,
            hour: field(4)?,
            minute: field(5)?,
            second: field(6)?,
        })
    }

    /// Filename stem: `YYYY-MM-DD_HH-MM-SS`, or `YYYY-MM-DD_HH-MM` without seconds.
    pub fn file_stem(&self, with_seconds: bool) -> String {
        let mut stem = format!(
            "{:04}-{:02}-{:02}_{:02}-{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        );
        if with_seconds {
            stem.push_str(&format!("-{:02}", self.second));
        }
        stem
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}:{:02}:{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exif_format() {
        let ts = Timestamp::parse("2020:01:02 03:04:05").unwrap();
        assert_eq!(
            ts,
            Timestamp { year: 2020, month: 1, day: 2, hour: 3, minute: 4, second: 5 }
        );
    }

    #[test]
    fn test_parse_dash_separators_and_padding() {
        assert!(Timestamp::parse("2020-01-02 03-04-05").is_some());
        assert!(Timestamp::parse("2020-01-02 03:04:05").is_some());
        assert!(Timestamp::parse("  2020:01:02 03:04:05\0").is_some());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Timestamp::parse("").is_none());
        assert!(Timestamp::parse("2020:01:02").is_none());
        assert!(Timestamp::parse("2020:01:02 03:04").is_none());
        assert!(Timestamp::parse("2020:01:02:07 03:04:05").is_none());
        assert!(Timestamp::parse("2020:01:02 03:04:05 extra").is_none());
        assert!(Timestamp::parse("2020:01:02  03:04:05").is_none());
        assert!(Timestamp::parse("    :  :     :  :  ").is_none());
        assert!(Timestamp::parse("2020:ab:02 03:04:05").is_none());
    }

    #[test]
    fn test_file_stem() {
        let ts = Timestamp::parse("2020:1:2 3:4:5").unwrap();
        assert_eq!(ts.file_stem(true), "2020-01-02_03-04-05");
        assert_eq!(ts.file_stem(false), "2020-01-02_03-04");
        assert_eq!(ts.to_string(), "2020:01:02 03:04:05");
    }
}
