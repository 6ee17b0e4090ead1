use std::path::Path;

use crate::library::TrackRecord;

/// Write the unmatched tracks to a CSV report, one row per record with a
/// blank year cell when the export carried none.
pub fn write_not_found(path: &Path, misses: &[TrackRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["name", "artist", "year"])?;
    for miss in misses {
        let year = miss.year.map(|y| y.to_string()).unwrap_or_default();
        writer.write_record([miss.title.as_str(), miss.artist.as_str(), year.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
