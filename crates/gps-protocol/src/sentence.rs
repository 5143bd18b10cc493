//! GGA / RMC field extraction

use crate::checksum::{checksum, validate_checksum};
use crate::{LocalProjection, SentenceError};
use telemetry::{UtcDate, UtcTime};

/// Fields of a fix-quality (GGA) sentence with a valid fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GgaFix {
    pub time: UtcTime,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub quality: u8,
    pub satellites: u8,
    pub hdop: f32,
    pub altitude_m: f32,
    pub local_x: f32,
    pub local_y: f32,
}

/// Fields of a valid course/speed (RMC) sentence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmcCourse {
    pub ground_speed_knots: f32,
    pub ground_course_deg: f32,
    pub date: UtcDate,
    /// East positive, west negative
    pub magnetic_variation_deg: f32,
}

/// A checksummed sentence, by type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentence {
    Gga(GgaFix),
    Rmc(RmcCourse),
    /// Checksum passed but nobody consumes this type
    Unrecognized,
}

/// Validate and decode one framed line
pub fn parse(line: &[u8], projection: &LocalProjection) -> Result<Sentence, SentenceError> {
    if !validate_checksum(line) {
        return Err(SentenceError::Checksum);
    }
    let (_, star) = checksum(line).ok_or(SentenceError::Checksum)?;
    let body = &line[..star];
    // Field splitting slices at byte offsets.
    if !body.is_ascii() {
        return Err(SentenceError::NotAscii);
    }
    let body = std::str::from_utf8(body).map_err(|_| SentenceError::NotAscii)?;
    let fields = Fields(body.split(',').collect());

    match body.get(..6) {
        Some("$GPGGA") | Some("$GNGGA") => parse_gga(&fields, projection).map(Sentence::Gga),
        Some("$GPRMC") | Some("$GNRMC") => parse_rmc(&fields).map(Sentence::Rmc),
        _ => Ok(Sentence::Unrecognized),
    }
}

struct Fields<'a>(Vec<&'a str>);

impl<'a> Fields<'a> {
    fn optional(&self, index: usize) -> Option<&'a str> {
        self.0.get(index).copied().filter(|field| !field.is_empty())
    }

    fn required(&self, index: usize, name: &'static str) -> Result<&'a str, SentenceError> {
        self.optional(index).ok_or(SentenceError::MissingField(name))
    }
}

fn number<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, SentenceError> {
    value.parse().map_err(|_| SentenceError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// `[d]ddmm.mmmm` to decimal degrees: the two digits before `.` start the minutes
fn degrees_minutes(value: &str, field: &'static str) -> Result<f64, SentenceError> {
    let dot = value.find('.').unwrap_or(value.len());
    if dot < 2 {
        return Err(SentenceError::InvalidField { field, value: value.to_string() });
    }
    let (degrees, minutes) = value.split_at(dot - 2);
    let degrees: f64 = if degrees.is_empty() { 0.0 } else { number(degrees, field)? };
    let minutes: f64 = number(minutes, field)?;
    Ok(degrees + minutes / 60.0)
}

fn hemisphere(value: &str, positive: &str, negative: &str, field: &'static str) -> Result<f64, SentenceError> {
    match value {
        v if v == positive => Ok(1.0),
        v if v == negative => Ok(-1.0),
        _ => Err(SentenceError::InvalidField { field, value: value.to_string() }),
    }
}

fn two_digits(value: &str, range: std::ops::Range<usize>, field: &'static str) -> Result<u8, SentenceError> {
    let digits = value
        .get(range)
        .ok_or_else(|| SentenceError::InvalidField { field, value: value.to_string() })?;
    number(digits, field)
}

fn utc_time(value: Option<&str>) -> Result<UtcTime, SentenceError> {
    let Some(value) = value else {
        return Ok(UtcTime::default());
    };
    Ok(UtcTime {
        hours: two_digits(value, 0..2, "time")?,
        minutes: two_digits(value, 2..4, "time")?,
        seconds: number(value.get(4..).unwrap_or_default(), "time")?,
    })
}

fn parse_gga(fields: &Fields<'_>, projection: &LocalProjection) -> Result<GgaFix, SentenceError> {
    let quality: u8 = number(fields.required(6, "fix quality")?, "fix quality")?;
    if quality == 0 {
        return Err(SentenceError::NoFix);
    }

    let latitude_deg = degrees_minutes(fields.required(2, "latitude")?, "latitude")?
        * hemisphere(fields.required(3, "N/S")?, "N", "S", "N/S")?;
    let longitude_deg = degrees_minutes(fields.required(4, "longitude")?, "longitude")?
        * hemisphere(fields.required(5, "E/W")?, "E", "W", "E/W")?;
    let satellites = match fields.optional(7) {
        Some(sats) => number(sats, "satellites")?,
        None => 0,
    };
    let hdop = number(fields.required(8, "hdop")?, "hdop")?;
    let altitude_m = number(fields.required(9, "altitude")?, "altitude")?;
    let (local_x, local_y) = projection.project(latitude_deg, longitude_deg);

    Ok(GgaFix {
        time: utc_time(fields.optional(1))?,
        latitude_deg,
        longitude_deg,
        quality,
        satellites,
        hdop,
        altitude_m,
        local_x,
        local_y,
    })
}

fn parse_rmc(fields: &Fields<'_>) -> Result<RmcCourse, SentenceError> {
    if fields.optional(2) != Some("A") {
        return Err(SentenceError::VoidStatus);
    }

    let ground_speed_knots = match fields.optional(7) {
        Some(speed) => number(speed, "speed")?,
        None => 0.0,
    };
    let ground_course_deg = match fields.optional(8) {
        Some(course) => number(course, "course")?,
        None => 0.0,
    };
    let date = fields.required(9, "date")?;
    let date = UtcDate {
        day: two_digits(date, 0..2, "date")?,
        month: two_digits(date, 2..4, "date")?,
        year: two_digits(date, 4..6, "date")?,
    };
    let variation: f32 = match fields.optional(10) {
        Some(variation) => number(variation, "magnetic variation")?,
        None => 0.0,
    };
    let magnetic_variation_deg = match fields.optional(11) {
        Some("W") => -variation,
        _ => variation,
    };

    Ok(RmcCourse {
        ground_speed_knots,
        ground_course_deg,
        date,
        magnetic_variation_deg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,*1F\r\n";
    const RMC: &[u8] = b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

    fn gga() -> GgaFix {
        match parse(GGA, &LocalProjection::default()).unwrap() {
            Sentence::Gga(fix) => fix,
            other => panic!("expected GGA, got {other:?}"),
        }
    }

    #[test]
    fn test_gga_position() {
        let fix = gga();
        assert!((fix.latitude_deg - 48.1173).abs() < 1e-9);
        assert!((fix.longitude_deg - 11.516_666_666).abs() < 1e-8);
        assert_eq!(fix.hdop, 0.9);
        assert_eq!(fix.altitude_m, 545.4);
        assert_eq!(fix.satellites, 8);
        assert_eq!(fix.quality, 1);
    }

    #[test]
    fn test_gga_time() {
        let fix = gga();
        assert_eq!(fix.time, UtcTime { hours: 12, minutes: 35, seconds: 19.0 });
    }

    #[test]
    fn test_gga_southern_western() {
        let line = b"$GPGGA,000001,3959.700,S,10514.000,W,1,05,1.2,1609.3,M,,,,*24\r\n";
        match parse(line, &LocalProjection::default()).unwrap() {
            Sentence::Gga(fix) => {
                assert!((fix.latitude_deg + 39.995).abs() < 1e-9);
                assert!((fix.longitude_deg + 105.233_333_333).abs() < 1e-8);
            }
            other => panic!("expected GGA, got {other:?}"),
        }
    }

    #[test]
    fn test_gga_no_fix_rejected() {
        let line = b"$GPGGA,123519,4807.038,N,01131.000,E,0,08,0.9,545.4,M,,,,*1E\r\n";
        assert_eq!(parse(line, &LocalProjection::default()), Err(SentenceError::NoFix));
    }

    #[test]
    fn test_gga_bad_hemisphere() {
        let line = b"$GPGGA,123519,4807.038,X,01131.000,E,1,08,0.9,545.4,M,,,,*09\r\n";
        assert!(matches!(
            parse(line, &LocalProjection::default()),
            Err(SentenceError::InvalidField { field: "N/S", .. })
        ));
    }

    #[test]
    fn test_rmc_fields() {
        match parse(RMC, &LocalProjection::default()).unwrap() {
            Sentence::Rmc(course) => {
                assert_eq!(course.ground_speed_knots, 22.4);
                assert_eq!(course.ground_course_deg, 84.4);
                assert_eq!(course.date, UtcDate { day: 23, month: 3, year: 94 });
                assert_eq!(course.magnetic_variation_deg, -3.1);
            }
            other => panic!("expected RMC, got {other:?}"),
        }
    }

    #[test]
    fn test_rmc_void_rejected() {
        let line = b"$GPRMC,123519,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*7D\r\n";
        assert_eq!(parse(line, &LocalProjection::default()), Err(SentenceError::VoidStatus));
    }

    #[test]
    fn test_unrecognized_type_ignored() {
        let line = b"$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74\r\n";
        assert_eq!(parse(line, &LocalProjection::default()), Ok(Sentence::Unrecognized));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let line = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,*47\r\n";
        assert_eq!(parse(line, &LocalProjection::default()), Err(SentenceError::Checksum));
    }

    fn with_checksum(body: &str) -> Vec<u8> {
        let mut line = body.as_bytes().to_vec();
        line.push(b'*');
        let (sum, _) = checksum(&line).unwrap();
        line.extend_from_slice(format!("{sum:02X}\r\n").as_bytes());
        line
    }

    #[test]
    fn test_multibyte_field_rejected() {
        let line = with_checksum("$GPGGA,123519,\u{e9}0.5,N,01131.000,E,1,08,0.9,545.4,M,,,,");
        assert!(validate_checksum(&line));
        assert_eq!(parse(&line, &LocalProjection::default()), Err(SentenceError::NotAscii));

        let line = with_checksum("$GPRMC,123519,A,4807.038,N,0113\u{2019}.000,E,022.4,084.4,230394,003.1,W");
        assert_eq!(parse(&line, &LocalProjection::default()), Err(SentenceError::NotAscii));
    }

    #[test]
    fn test_degrees_minutes_short_field() {
        assert!(degrees_minutes("7.5", "latitude").is_err());
        assert!((degrees_minutes("07.5", "latitude").unwrap() - 0.125).abs() < 1e-12);
    }
}
