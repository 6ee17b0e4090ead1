use crate::spotify::client::SpotifyError;

/// Decoupled representation of a track returned by catalog search.
#[derive(Debug, Clone)]
pub struct ApiTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
}

/// Decoupled representation of a playlist from the API.
#[derive(Debug, Clone)]
pub struct ApiPlaylist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// One page of the current user's playlists.
#[derive(Debug, Clone)]
pub struct PlaylistPage {
    pub items: Vec<ApiPlaylist>,
}

/// One page of a playlist's items; `next` is the service's continuation
/// cursor, `None` on the last page.
#[derive(Debug, Clone)]
pub struct PlaylistItemsPage {
    pub track_uris: Vec<String>,
    pub next: Option<String>,
}

/// Port trait wrapping the Spotify Web API capabilities used by the
/// matcher and synchronizer.
///
/// The production implementation lives in `spotify::client`; tests inject
/// mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Id of the authenticated user.
    async fn current_user_id(&self) -> Result<String, SpotifyError>;

    /// Catalog track search returning at most `limit` candidates.
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<ApiTrack>, SpotifyError>;

    /// Create a playlist owned by `user_id`, returning its id.
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<String, SpotifyError>;

    /// One page of the current user's playlists at the given offset.
    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistPage, SpotifyError>;

    /// One page of a playlist's items at the given offset.
    async fn playlist_items(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistItemsPage, SpotifyError>;

    /// Append track URIs to a playlist. Callers must respect the service's
    /// 100-item cap per call.
    async fn add_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError>;

    /// Remove track URIs from a playlist, same 100-item cap.
    async fn remove_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError>;
}
