use std::path::Path;

use clap::ValueEnum;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;

use crate::library::TrackRecord;
use crate::ports::SpotifyApi;
use crate::sync::SyncError;
use crate::{matcher, report, sync};

/// How to modify a reused playlist.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Leave existing contents untouched and add after them
    Append,
    /// Remove all existing items before adding
    Replace,
}

/// The destination playlist, as picked on the command line.
#[derive(Debug, Clone)]
pub enum Target {
    /// Create a fresh playlist with the given name.
    Create { name: String, public: bool },
    /// Reuse an existing playlist located by name.
    Reuse { name: String, mode: Mode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub missing: usize,
}

/// Run the import: resolve the target playlist, match every record in
/// order, append what was found, and report the rest.
pub async fn run(
    api: &dyn SpotifyApi,
    records: &[TrackRecord],
    target: &Target,
    not_found_path: &Path,
) -> Result<ImportSummary> {
    let (playlist_id, playlist_name) = resolve_target(api, target).await?;

    let mut found_ids = Vec::new();
    let mut misses: Vec<TrackRecord> = Vec::new();
    for record in records {
        match matcher::match_track(api, record).await? {
            Some(id) => {
                println!("✓ {} — {}", record.title, record.artist);
                found_ids.push(id);
            }
            None => {
                println!("✗ NOT FOUND: {} — {}", record.title, record.artist);
                misses.push(record.clone());
            }
        }
    }

    if !found_ids.is_empty() {
        sync::add_tracks_in_batches(api, &playlist_id, &found_ids)
            .await
            .wrap_err("Failed to add tracks to the playlist")?;
    }

    println!();
    println!(
        "Done. Added {} tracks to '{}'.",
        found_ids.len(),
        playlist_name
    );
    if !misses.is_empty() {
        report::write_not_found(not_found_path, &misses).wrap_err_with(|| {
            format!(
                "Failed to write not-found report to {}",
                not_found_path.display()
            )
        })?;
        println!(
            "{} not found → logged to {}",
            misses.len(),
            not_found_path.display()
        );
    }

    Ok(ImportSummary {
        added: found_ids.len(),
        missing: misses.len(),
    })
}

async fn resolve_target(api: &dyn SpotifyApi, target: &Target) -> Result<(String, String)> {
    match target {
        Target::Reuse { name, mode } => {
            let id = sync::find_user_playlist_by_name(api, name)
                .await
                .map_err(SyncError::from)?
                .ok_or_else(|| SyncError::PlaylistNotFound { name: name.clone() })?;
            println!("Using existing playlist: {name}");
            if *mode == Mode::Replace {
                println!("Clearing existing playlist contents...");
                sync::clear_playlist(api, &id)
                    .await
                    .wrap_err("Failed to clear the existing playlist")?;
            }
            Ok((id, name.clone()))
        }
        Target::Create { name, public } => {
            let id = sync::create_import_playlist(api, name, *public)
                .await
                .wrap_err("Failed to create the playlist")?;
            println!("Created new playlist: {name}");
            Ok((id, name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ApiTrack, MockSpotifyApi, PlaylistPage};

    fn record(title: &str, artist: &str) -> TrackRecord {
        TrackRecord {
            title: title.to_string(),
            artist: artist.to_string(),
            year: None,
        }
    }

    #[tokio::test]
    async fn missing_reuse_target_fails_before_any_write() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user_id()
            .returning(|| Ok("me".to_string()));
        api.expect_current_user_playlists()
            .returning(|_, _| Ok(PlaylistPage { items: vec![] }));
        api.expect_search_tracks().times(0);
        api.expect_add_playlist_items().times(0);
        api.expect_remove_playlist_items().times(0);

        let dir = tempfile::tempdir().unwrap();
        let target = Target::Reuse {
            name: "Missing".to_string(),
            mode: Mode::Append,
        };
        let result = run(
            &api,
            &[record("Song", "Artist")],
            &target,
            &dir.path().join("not_found.csv"),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::PlaylistNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn all_misses_still_writes_full_report_and_adds_nothing() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user_id()
            .returning(|| Ok("me".to_string()));
        api.expect_create_playlist()
            .returning(|_, _, _, _| Ok("pl".to_string()));
        api.expect_search_tracks().returning(|_, _| Ok(vec![]));
        api.expect_add_playlist_items().times(0);

        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("not_found.csv");
        let target = Target::Create {
            name: "Imported".to_string(),
            public: false,
        };
        let records = [
            record("One", "A"),
            record("Two", "B"),
            record("Three", "C"),
        ];

        let summary = run(&api, &records, &target, &report_path).await.unwrap();

        assert_eq!(summary, ImportSummary { added: 0, missing: 3 });
        let contents = std::fs::read_to_string(&report_path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }

    #[tokio::test]
    async fn matched_ids_are_appended_in_record_order() {
        let mut api = MockSpotifyApi::new();
        api.expect_current_user_id()
            .returning(|| Ok("me".to_string()));
        api.expect_create_playlist()
            .returning(|_, _, _, _| Ok("pl".to_string()));
        api.expect_search_tracks().returning(|query, _| {
            let id = if query.contains("One") { "id-one" } else { "id-two" };
            Ok(vec![ApiTrack {
                id: id.to_string(),
                name: "x".to_string(),
                artists: vec![],
            }])
        });
        api.expect_add_playlist_items()
            .withf(|_, uris| {
                uris.iter()
                    .map(String::as_str)
                    .eq(["spotify:track:id-one", "spotify:track:id-two"])
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let dir = tempfile::tempdir().unwrap();
        let target = Target::Create {
            name: "Imported".to_string(),
            public: false,
        };
        let summary = run(
            &api,
            &[record("One", "A"), record("Two", "B")],
            &target,
            &dir.path().join("not_found.csv"),
        )
        .await
        .unwrap();

        assert_eq!(summary.added, 2);
        assert!(!dir.path().join("not_found.csv").exists());
    }

    #[tokio::test]
    async fn replace_mode_clears_before_matching() {
        let mut api = MockSpotifyApi::new();
        let mut sequence = mockall::Sequence::new();
        api.expect_current_user_id()
            .returning(|| Ok("me".to_string()));
        api.expect_current_user_playlists()
            .times(1)
            .returning(|_, _| {
                Ok(PlaylistPage {
                    items: vec![crate::ports::ApiPlaylist {
                        id: "pl".to_string(),
                        name: "Mix".to_string(),
                        owner_id: "me".to_string(),
                    }],
                })
            });
        api.expect_playlist_items()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| {
                Ok(crate::ports::PlaylistItemsPage {
                    track_uris: vec!["spotify:track:old".to_string()],
                    next: None,
                })
            });
        api.expect_remove_playlist_items()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        api.expect_search_tracks()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(vec![]));

        let dir = tempfile::tempdir().unwrap();
        let target = Target::Reuse {
            name: "Mix".to_string(),
            mode: Mode::Replace,
        };
        let summary = run(
            &api,
            &[record("Gone", "Nobody")],
            &target,
            &dir.path().join("not_found.csv"),
        )
        .await
        .unwrap();

        assert_eq!(summary, ImportSummary { added: 0, missing: 1 });
    }
}
