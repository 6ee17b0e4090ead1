use crate::ports::SpotifyApi;
use crate::spotify::client::SpotifyError;

/// Page size for listing the user's playlists.
const PLAYLIST_PAGE_SIZE: u32 = 50;
/// Page size for listing a playlist's items.
const ITEMS_PAGE_SIZE: u32 = 100;
/// Per-call cap on add/remove, enforced by the service.
const WRITE_BATCH_SIZE: usize = 100;

/// Description set on playlists created by the importer.
pub const IMPORT_DESCRIPTION: &str = "Imported from Apple Music XML";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("playlist '{name}' not found in your account")]
    PlaylistNotFound { name: String },
    #[error(transparent)]
    Spotify(#[from] SpotifyError),
}

/// Create a new playlist owned by the current user, returning its id.
pub async fn create_import_playlist(
    api: &dyn SpotifyApi,
    name: &str,
    public: bool,
) -> Result<String, SpotifyError> {
    let user_id = api.current_user_id().await?;
    api.create_playlist(&user_id, name, public, IMPORT_DESCRIPTION)
        .await
}

/// Find a playlist by exact name (case-insensitive) in the current user's
/// library, preferring one the user owns over one merely visible to them.
pub async fn find_user_playlist_by_name(
    api: &dyn SpotifyApi,
    name: &str,
) -> Result<Option<String>, SpotifyError> {
    let wanted = name.trim().to_lowercase();
    let user_id = api.current_user_id().await?;

    let mut offset = 0;
    let mut fallback = None;
    loop {
        let page = api.current_user_playlists(PLAYLIST_PAGE_SIZE, offset).await?;
        if page.items.is_empty() {
            break;
        }
        for playlist in &page.items {
            if playlist.name.trim().to_lowercase() == wanted {
                if playlist.owner_id == user_id {
                    return Ok(Some(playlist.id.clone()));
                }
                if fallback.is_none() {
                    fallback = Some(playlist.id.clone());
                }
            }
        }
        let returned = page.items.len() as u32;
        offset += returned;
        if returned < PLAYLIST_PAGE_SIZE {
            break;
        }
    }
    Ok(fallback)
}

/// Remove all items from a playlist. The service has no single "clear"
/// call, so this lists every item and removes them in batches.
pub async fn clear_playlist(api: &dyn SpotifyApi, playlist_id: &str) -> Result<(), SpotifyError> {
    let mut uris = Vec::new();
    let mut offset = 0;
    loop {
        let page = api
            .playlist_items(playlist_id, ITEMS_PAGE_SIZE, offset)
            .await?;
        uris.extend(page.track_uris);
        if page.next.is_none() {
            break;
        }
        offset += ITEMS_PAGE_SIZE;
    }

    for chunk in uris.chunks(WRITE_BATCH_SIZE) {
        api.remove_playlist_items(playlist_id, chunk).await?;
    }
    Ok(())
}

/// Append matched track ids to the playlist in order, batched to the
/// service's per-call cap.
pub async fn add_tracks_in_batches(
    api: &dyn SpotifyApi,
    playlist_id: &str,
    track_ids: &[String],
) -> Result<(), SpotifyError> {
    let uris: Vec<String> = track_ids
        .iter()
        .map(|id| format!("spotify:track:{id}"))
        .collect();
    for chunk in uris.chunks(WRITE_BATCH_SIZE) {
        api.add_playlist_items(playlist_id, chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ApiPlaylist, MockSpotifyApi, PlaylistItemsPage, PlaylistPage};

    fn playlist(id: &str, name: &str, owner_id: &str) -> ApiPlaylist {
        ApiPlaylist {
            id: id.to_string(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
        }
    }

    fn expect_user(api: &mut MockSpotifyApi, id: &str) {
        let id = id.to_string();
        api.expect_current_user_id()
            .returning(move || Ok(id.clone()));
    }

    #[tokio::test]
    async fn prefers_owned_playlist_over_visible_one() {
        let mut api = MockSpotifyApi::new();
        expect_user(&mut api, "me");
        api.expect_current_user_playlists()
            .times(1)
            .returning(|_, _| {
                Ok(PlaylistPage {
                    items: vec![
                        playlist("theirs", "Road Trip", "someone-else"),
                        playlist("mine", "road trip", "me"),
                    ],
                })
            });

        let found = find_user_playlist_by_name(&api, "Road Trip").await.unwrap();
        assert_eq!(found.as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn falls_back_to_visible_playlist_after_all_pages() {
        let mut api = MockSpotifyApi::new();
        expect_user(&mut api, "me");
        api.expect_current_user_playlists()
            .withf(|_, offset| *offset == 0)
            .times(1)
            .returning(|limit, _| {
                Ok(PlaylistPage {
                    items: (0..limit)
                        .map(|i| playlist(&format!("p{i}"), "Filler", "me"))
                        .collect(),
                })
            });
        api.expect_current_user_playlists()
            .withf(|_, offset| *offset == 50)
            .times(1)
            .returning(|_, _| {
                Ok(PlaylistPage {
                    items: vec![playlist("theirs", "Road Trip", "other")],
                })
            });

        let found = find_user_playlist_by_name(&api, "road trip").await.unwrap();
        assert_eq!(found.as_deref(), Some("theirs"));
    }

    #[tokio::test]
    async fn missing_playlist_yields_none() {
        let mut api = MockSpotifyApi::new();
        expect_user(&mut api, "me");
        api.expect_current_user_playlists()
            .times(1)
            .returning(|_, _| Ok(PlaylistPage { items: vec![] }));

        let found = find_user_playlist_by_name(&api, "Nope").await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn clearing_removes_all_items_in_capped_batches() {
        let mut api = MockSpotifyApi::new();
        api.expect_playlist_items()
            .withf(|id, limit, offset| id == "pl" && *limit == 100 && *offset == 0)
            .times(1)
            .returning(|_, _, _| {
                Ok(PlaylistItemsPage {
                    track_uris: (0..100).map(|i| format!("spotify:track:a{i}")).collect(),
                    next: Some("cursor".to_string()),
                })
            });
        api.expect_playlist_items()
            .withf(|_, _, offset| *offset == 100)
            .times(1)
            .returning(|_, _, _| {
                Ok(PlaylistItemsPage {
                    track_uris: (0..50).map(|i| format!("spotify:track:b{i}")).collect(),
                    next: None,
                })
            });
        // 150 items -> ceil(150/100) = 2 removal calls
        api.expect_remove_playlist_items()
            .withf(|id, uris| id == "pl" && uris.len() == 100 && uris[0] == "spotify:track:a0")
            .times(1)
            .returning(|_, _| Ok(()));
        api.expect_remove_playlist_items()
            .withf(|_, uris| uris.len() == 50 && uris[0] == "spotify:track:b0")
            .times(1)
            .returning(|_, _| Ok(()));

        clear_playlist(&api, "pl").await.unwrap();
    }

    #[tokio::test]
    async fn clearing_an_empty_playlist_issues_no_removals() {
        let mut api = MockSpotifyApi::new();
        api.expect_playlist_items().times(1).returning(|_, _, _| {
            Ok(PlaylistItemsPage {
                track_uris: vec![],
                next: None,
            })
        });
        api.expect_remove_playlist_items().times(0);

        clear_playlist(&api, "pl").await.unwrap();
    }

    #[tokio::test]
    async fn adds_preserve_order_across_batch_boundaries() {
        let ids: Vec<String> = (0..250).map(|i| format!("id{i}")).collect();

        let mut api = MockSpotifyApi::new();
        let mut sequence = mockall::Sequence::new();
        for (start, len) in [(0, 100), (100, 100), (200, 50)] {
            api.expect_add_playlist_items()
                .withf(move |id, uris| {
                    id == "pl"
                        && uris.len() == len
                        && uris[0] == format!("spotify:track:id{start}")
                        && uris[len - 1] == format!("spotify:track:id{}", start + len - 1)
                })
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_, _| Ok(()));
        }

        add_tracks_in_batches(&api, "pl", &ids).await.unwrap();
    }

    #[tokio::test]
    async fn create_uses_current_user_and_import_description() {
        let mut api = MockSpotifyApi::new();
        expect_user(&mut api, "me");
        api.expect_create_playlist()
            .withf(|user_id, name, public, description| {
                user_id == "me"
                    && name == "Imported"
                    && !*public
                    && description == IMPORT_DESCRIPTION
            })
            .times(1)
            .returning(|_, _, _, _| Ok("new-id".to_string()));

        let id = create_import_playlist(&api, "Imported", false).await.unwrap();
        assert_eq!(id, "new-id");
    }
}
