//! Source characteristics and domain constants
//!
//! Values the harvest pipeline treats as fixed properties of the upstream
//! chart APIs and of the canonical record shape.

/// Canonical record shape constants
pub mod record {
    /// Separator used when joining attribution names (artists / actors)
    pub const ATTRIBUTION_SEPARATOR: &str = "/";

    /// Placeholder title for songs without a name
    pub const UNKNOWN_SONG_TITLE: &str = "未知歌曲";

    /// Placeholder title for movies without a title
    pub const UNKNOWN_MOVIE_TITLE: &str = "未知电影";

    /// Durations above this value are taken to be milliseconds.
    ///
    /// Heuristic kept for parity with the upstream data: a genuine duration
    /// over 1000 seconds is still divided by 1000.
    pub const DURATION_MILLIS_THRESHOLD: i64 = 1000;

    /// Douban actor lists are noisy; only the first few are kept
    pub const MOVIE_ACTOR_CAP: usize = 5;
}

/// Netease Cloud Music playlist chart API
pub mod netease {
    /// Playlist detail endpoint, queried with `?id={playlist_id}`
    pub const PLAYLIST_DETAIL_URL: &str = "https://music.163.com/api/playlist/detail";

    /// Referer expected by the API
    pub const REFERER: &str = "https://music.163.com/";

    /// Content negotiation sent with every request
    pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

    pub const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";

    /// `code` value of a successful API response
    pub const SUCCESS_CODE: i64 = 200;
}

/// Douban movie type-ranking API
pub mod douban {
    /// Top list endpoint, queried with type / interval_id / start / limit
    pub const TOP_LIST_URL: &str = "https://movie.douban.com/j/chart/top_list";

    pub const REFERER: &str = "https://movie.douban.com/typerank";

    pub const ACCEPT: &str = "application/json, text/plain, */*";

    pub const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

    /// Rating-percentile window requested from the ranking
    pub const DEFAULT_INTERVAL_ID: &str = "100:90";

    /// Records per page; a shorter page means the ranking is exhausted
    pub const PAGE_SIZE: usize = 50;
}

/// Storage naming per source
pub mod storage {
    pub const SONGS_TABLE: &str = "songs";
    pub const MOVIES_TABLE: &str = "movies";

    /// Backup file names, written under the data directory
    pub const SONGS_BACKUP_FILE: &str = "songs.json";
    pub const MOVIES_BACKUP_FILE: &str = "movies.json";
}
