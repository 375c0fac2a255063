pub mod auth;
pub mod client;
pub mod models;
pub mod player;
pub mod playlists;

mod tracks;
mod user;

use self::player::RemotePlayer;
use self::playlists::{CatalogSource, PlaylistEditor};

/// Everything the app needs from the remote service.
pub trait SpotifyApi: RemotePlayer + CatalogSource + PlaylistEditor + 'static {}

impl<T> SpotifyApi for T where T: RemotePlayer + CatalogSource + PlaylistEditor + 'static {}
