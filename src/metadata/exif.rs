use std::{fs::File, io::BufReader, path::Path};

use crate::metadata::ExifSummary;

pub struct ExifExtractor;

impl ExifExtractor {
    /// Returns `None` when the container carries no readable EXIF block.
    pub fn extract<P: AsRef<Path>>(path: P) -> Option<ExifSummary> {
        let file = File::open(&path).ok()?;
        let mut reader = BufReader::new(file);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif_data) => Some(Self::summarize(&exif_data)),
            Err(err) => {
                log::debug!("no EXIF data in {}: {}", path.as_ref().display(), err);
                None
            }
        }
    }

    fn summarize(exif: &exif::Exif) -> ExifSummary {
        let field = |tag: exif::Tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string())
        };

        let software = field(exif::Tag::Software);
        let date_time = field(exif::Tag::DateTime);
        let datetime_original = field(exif::Tag::DateTimeOriginal);
        let datetime_digitized = field(exif::Tag::DateTimeDigitized);

        let mut suspicious_indicators = Vec::new();

        if let Some(ref sw) = software {
            if is_editing_software(sw) {
                suspicious_indicators.push(format!("Edited with: {}", sw));
            }
        }

        if datetime_original.is_none() && date_time.is_some() {
            suspicious_indicators.push("Original datetime missing (may be stripped)".into());
        }

        if let (Some(orig), Some(digi)) = (&datetime_original, &datetime_digitized) {
            if orig != digi {
                suspicious_indicators.push("Inconsistent date time values".into());
            }
        }

        ExifSummary {
            camera_make: field(exif::Tag::Make),
            camera_model: field(exif::Tag::Model),
            software,
            date_time,
            suspicious_indicators,
        }
    }
}

fn is_editing_software(software: &str) -> bool {
    let lower = software.to_lowercase();
    ["photoshop", "paint", "gimp", "lightroom", "affinity"]
        .iter()
        .any(|name| lower.contains(name))
}
