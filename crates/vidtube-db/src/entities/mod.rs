pub mod comments;
pub mod likes;
pub mod playlist_videos;
pub mod playlists;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;
pub mod watch_history;
