use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::ports::{ApiPlaylist, ApiTrack, PlaylistItemsPage, PlaylistPage, SpotifyApi};
use crate::spotify::types::{
    CreatedPlaylist, PlaylistItemsResponse, PlaylistsResponse, SearchResponse, SpotifyUser,
};

const API_BASE: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SpotifyError {
    /// The service asked us to back off; `retry_after` is the
    /// `Retry-After` header in seconds when the service supplied one.
    #[error("rate limited by the Spotify API")]
    RateLimited { retry_after: Option<u64> },
    #[error("Spotify API returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("failed to send http request: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Spotify Web API client
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// Map rate limiting and non-success statuses to typed errors.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SpotifyError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(SpotifyError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpotifyError::Api { status, body });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SpotifyError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait::async_trait]
impl SpotifyApi for SpotifyClient {
    async fn current_user_id(&self) -> Result<String, SpotifyError> {
        let user: SpotifyUser = self.get_json(&format!("{API_BASE}/me")).await?;
        Ok(user.id)
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<ApiTrack>, SpotifyError> {
        let url = format!(
            "{API_BASE}/search?q={}&type=track&limit={limit}",
            urlencoding::encode(query)
        );
        log::debug!("searching: {query}");
        let response: SearchResponse = self.get_json(&url).await?;
        let items = response.tracks.map(|tracks| tracks.items).unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|track| ApiTrack {
                id: track.id,
                name: track.name,
                artists: track.artists.into_iter().map(|artist| artist.name).collect(),
            })
            .collect())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, SpotifyError> {
        let response = self
            .client
            .post(format!("{API_BASE}/users/{user_id}/playlists"))
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({
                "name": name,
                "public": public,
                "description": description,
            }))
            .send()
            .await?;
        let playlist: CreatedPlaylist = Self::check(response).await?.json().await?;
        Ok(playlist.id)
    }

    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, SpotifyError> {
        let url = format!("{API_BASE}/me/playlists?limit={limit}&offset={offset}");
        let response: PlaylistsResponse = self.get_json(&url).await?;
        Ok(PlaylistPage {
            items: response
                .items
                .into_iter()
                .map(|playlist| ApiPlaylist {
                    id: playlist.id,
                    name: playlist.name,
                    owner_id: playlist.owner.id,
                })
                .collect(),
        })
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistItemsPage, SpotifyError> {
        let url = format!(
            "{API_BASE}/playlists/{playlist_id}/tracks?fields=items(track(uri)),next&limit={limit}&offset={offset}"
        );
        let response: PlaylistItemsResponse = self.get_json(&url).await?;
        let track_uris = response
            .items
            .into_iter()
            .filter_map(|item| item.track.and_then(|track| track.uri))
            .collect();
        Ok(PlaylistItemsPage {
            track_uris,
            next: response.next,
        })
    }

    async fn add_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let response = self
            .client
            .post(format!("{API_BASE}/playlists/{playlist_id}/tracks"))
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "uris": uris }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn remove_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let tracks: Vec<_> = uris.iter().map(|uri| json!({ "uri": uri })).collect();
        let response = self
            .client
            .delete(format!("{API_BASE}/playlists/{playlist_id}/tracks"))
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "tracks": tracks }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
