//! EXIF capture time and GPS extraction for photos and RAW files

use crate::error::{Error, Result};
use crate::media::GpsCoord;
use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// EXIF tags to try for date extraction, in priority order
const DATE_TAGS: &[Tag] = &[
    Tag::DateTimeOriginal,    // When the original image was taken
    Tag::DateTimeDigitized,   // When the image was digitized
    Tag::DateTime,            // File modification date/time
];

/// Values read from a file's EXIF block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    pub timestamp: Option<NaiveDateTime>,
    pub gps: Option<GpsCoord>,
}

/// Read capture time and GPS position from EXIF metadata
pub fn read_exif(path: &Path) -> Result<ExifData> {
    let file = File::open(path).map_err(|e| Error::ExifRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let timestamp = DATE_TAGS.iter().find_map(|tag| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        let datetime = parse_exif_datetime(&field.display_value().to_string())?;
        trace!(?path, ?tag, "Found EXIF date");
        Some(datetime)
    });

    Ok(ExifData {
        timestamp,
        gps: parse_exif_gps(&exif),
    })
}

/// Parse EXIF datetime string format: "YYYY:MM:DD HH:MM:SS"
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    // EXIF format: "2024:01:15 14:30:00" or with quotes
    let s = s.trim().trim_matches('"');

    let formats = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

/// Degrees/minutes/seconds rationals to decimal degrees
fn dms_to_degrees(field: &Field) -> Option<f64> {
    match &field.value {
        Value::Rational(v) if v.len() >= 3 => {
            Some(v[0].to_f64() + v[1].to_f64() / 60.0 + v[2].to_f64() / 3600.0)
        }
        Value::Rational(v) if !v.is_empty() => Some(v[0].to_f64()),
        _ => None,
    }
}

fn is_negative_ref(field: Option<&Field>, negative: char) -> bool {
    field
        .map(|f| f.display_value().to_string().contains(negative))
        .unwrap_or(false)
}

fn parse_exif_gps(exif: &Exif) -> Option<GpsCoord> {
    let lat = exif.get_field(Tag::GPSLatitude, In::PRIMARY)?;
    let lon = exif.get_field(Tag::GPSLongitude, In::PRIMARY)?;

    let mut latitude = dms_to_degrees(lat)?;
    let mut longitude = dms_to_degrees(lon)?;

    if is_negative_ref(exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY), 'S') {
        latitude = -latitude;
    }
    if is_negative_ref(exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY), 'W') {
        longitude = -longitude;
    }

    GpsCoord::new(latitude, longitude)
}

/// Build a minimal JPEG carrying the given EXIF fields
#[cfg(test)]
pub(crate) fn jpeg_with_exif(fields: &[Field]) -> Vec<u8> {
    let mut writer = exif::experimental::Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = std::io::Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    let len = (2 + 6 + tiff.len()) as u16;
    jpeg.extend_from_slice(&len.to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
