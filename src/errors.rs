use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapFixError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Matcher error: {0}")]
    Matcher(String),

    #[error("Batch error: {0}")]
    Batch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl serde::Serialize for MapFixError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type MapFixResult<T> = Result<T, MapFixError>;
