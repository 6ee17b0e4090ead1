use std::collections::{HashMap, HashSet};
use std::path::Path;

use plist::{Dictionary, Value};

/// A normalized track pulled out of the Apple Music/iTunes export.
///
/// Title and artist are HTML-unescaped and trimmed; the year is kept only
/// when the export carries it as a plist integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub title: String,
    pub artist: String,
    pub year: Option<i64>,
}

impl TrackRecord {
    /// Case-insensitive identity key used for deduplication.
    pub fn dedup_key(&self) -> (String, String) {
        (self.title.to_lowercase(), self.artist.to_lowercase())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("failed to parse library export: {0}")]
    Malformed(#[from] plist::Error),
    #[error("library export is not a property-list dictionary")]
    NotADictionary,
}

/// Read the Apple Music XML export at `path`.
///
/// When `preferred_playlist` names a playlist present in the export
/// (case-insensitive exact match), only that playlist's items are used, in
/// listed order. Otherwise every entry of the `Tracks` table is used, in
/// table order. The result is deduplicated by case-insensitive
/// (title, artist), keeping the first occurrence; entries missing a title
/// or artist are dropped.
pub fn load_library(
    path: &Path,
    preferred_playlist: Option<&str>,
) -> Result<Vec<TrackRecord>, LibraryError> {
    let root = Value::from_file(path)?;
    read_library(&root, preferred_playlist)
}

fn read_library(
    root: &Value,
    preferred_playlist: Option<&str>,
) -> Result<Vec<TrackRecord>, LibraryError> {
    let root = root.as_dictionary().ok_or(LibraryError::NotADictionary)?;

    // Map track id -> attributes. plist dictionaries preserve document
    // order, which is what "table order" means for the no-playlist path.
    let mut by_id: HashMap<i64, &Dictionary> = HashMap::new();
    let mut table_order: Vec<i64> = Vec::new();
    if let Some(tracks) = root.get("Tracks").and_then(Value::as_dictionary) {
        for (key, value) in tracks.iter() {
            let Some(attrs) = value.as_dictionary() else {
                continue;
            };
            let id = attrs
                .get("Track ID")
                .and_then(Value::as_signed_integer)
                .or_else(|| key.parse().ok());
            let Some(id) = id else { continue };
            if !by_id.contains_key(&id) {
                table_order.push(id);
            }
            by_id.insert(id, attrs);
        }
    }

    let selected = preferred_playlist.and_then(|wanted| find_playlist(root, wanted));

    let mut records = Vec::new();
    match selected {
        Some(playlist) => {
            let items = playlist
                .get("Playlist Items")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            for item in items {
                let id = item
                    .as_dictionary()
                    .and_then(|item| item.get("Track ID"))
                    .and_then(Value::as_signed_integer);
                // Items pointing at unknown track ids are skipped.
                if let Some(attrs) = id.and_then(|id| by_id.get(&id)) {
                    records.push(normalize_track(attrs));
                }
            }
        }
        None => {
            for id in &table_order {
                records.push(normalize_track(by_id[id]));
            }
        }
    }

    let mut seen = HashSet::new();
    records.retain(|record| {
        !record.title.is_empty() && !record.artist.is_empty() && seen.insert(record.dedup_key())
    });

    Ok(records)
}

fn find_playlist<'a>(root: &'a Dictionary, wanted: &str) -> Option<&'a Dictionary> {
    let wanted = wanted.trim().to_lowercase();
    root.get("Playlists")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_dictionary)
        .find(|playlist| {
            playlist
                .get("Name")
                .and_then(Value::as_string)
                .is_some_and(|name| name.trim().to_lowercase() == wanted)
        })
}

fn normalize_track(attrs: &Dictionary) -> TrackRecord {
    let field = |name: &str| {
        let raw = attrs.get(name).and_then(Value::as_string).unwrap_or("");
        html_escape::decode_html_entities(raw).trim().to_string()
    };
    TrackRecord {
        title: field("Name"),
        artist: field("Artist"),
        year: attrs.get("Year").and_then(Value::as_signed_integer),
    }
}
