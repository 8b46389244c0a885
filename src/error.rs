pub type TrailResult<T> = Result<T, TrailError>;

#[derive(thiserror::Error, Debug)]
pub enum TrailError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("tile fetch error: error reading tile {tile}: {reason}")]
    TileFetch { tile: String, reason: String },

    #[error("frame write error: error writing frame to {target}: {reason}")]
    FrameWrite { target: String, reason: String },

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrailError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn tile_fetch(tile: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::TileFetch {
            tile: tile.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn frame_write(target: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::FrameWrite {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}
