use std::time::Duration;

use crate::library::TrackRecord;
use crate::ports::{ApiTrack, SpotifyApi};
use crate::spotify::client::SpotifyError;

/// Candidates requested per search attempt.
const SEARCH_LIMIT: u32 = 3;

/// Backoff when the service rate limits without naming an interval.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Find the Spotify track id for one record, or `None` when no query
/// returns a candidate.
///
/// Up to three search attempts run in order of decreasing strictness:
/// title+artist+year (when a year is known), title+artist, then the two
/// fields as free text for tracks whose artist field breaks field search
/// (features, collaborations). Within an attempt an exact case-insensitive
/// title/artist match wins; otherwise the attempt's first candidate is
/// taken. Only an attempt with zero candidates escalates to the next
/// query.
pub async fn match_track(
    api: &dyn SpotifyApi,
    record: &TrackRecord,
) -> Result<Option<String>, SpotifyError> {
    for query in build_queries(record) {
        let candidates = search_with_retry(api, &query, SEARCH_LIMIT).await?;
        if let Some(id) = pick_candidate(record, &candidates) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

fn build_queries(record: &TrackRecord) -> Vec<String> {
    let mut queries = Vec::new();
    if let Some(year) = record.year {
        queries.push(format!(
            r#"track:"{}" artist:"{}" year:{year}"#,
            record.title, record.artist
        ));
    }
    queries.push(format!(
        r#"track:"{}" artist:"{}""#,
        record.title, record.artist
    ));
    queries.push(format!("{} {}", record.title, record.artist));
    queries
}

fn pick_candidate(record: &TrackRecord, candidates: &[ApiTrack]) -> Option<String> {
    let title = record.title.trim().to_lowercase();
    let artist = record.artist.trim().to_lowercase();
    for candidate in candidates {
        let title_matches = candidate.name.trim().to_lowercase() == title;
        let artist_matches = candidate
            .artists
            .iter()
            .any(|name| name.trim().to_lowercase() == artist);
        if title_matches && artist_matches {
            return Some(candidate.id.clone());
        }
    }
    // No exact match: take the best guess from this query rather than
    // escalating to a looser one.
    candidates.first().map(|candidate| candidate.id.clone())
}

/// Issue one search query, retrying exactly once when the service rate
/// limits, after the interval it asked for plus one second.
pub(crate) async fn search_with_retry(
    api: &dyn SpotifyApi,
    query: &str,
    limit: u32,
) -> Result<Vec<ApiTrack>, SpotifyError> {
    match api.search_tracks(query, limit).await {
        Err(SpotifyError::RateLimited { retry_after }) => {
            let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS) + 1;
            log::debug!("rate limited, retrying in {wait}s: {query}");
            tokio::time::sleep(Duration::from_secs(wait)).await;
            api.search_tracks(query, limit).await
        }
        result => result,
    }
}
