//! JSON file persistence for the card collection.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::cards::{Card, CardCollection};
use crate::error::StoreError;

const TMP_SUFFIX: &str = "tmp";

pub struct CardStore {
    path: PathBuf,
}

impl CardStore {
    /// Default location: `<data dir>/rechargecard/cards.json`
    fn default_path() -> Result<PathBuf, StoreError> {
        let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(data_dir.join("rechargecard").join("cards.json"))
    }

    /// Open the store at the configured override, or the default location.
    pub fn open(data_file: Option<PathBuf>) -> Result<Self, StoreError> {
        let path = match data_file {
            Some(path) => path,
            None => Self::default_path()?,
        };
        Ok(Self::at(path))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored card. `None` means nothing was ever saved.
    pub async fn load_all(&self) -> Result<Option<Vec<Card>>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let cards = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(cards))
    }

    /// Replace the stored cards. Writes a temp file first and renames it over
    /// the old one.
    pub async fn save_all(&self, cards: &[Card]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(cards)?;
        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        tracing::debug!("Saved {} cards to {}", cards.len(), self.path.display());
        Ok(())
    }

    /// Load the collection. On first run, optionally seed and save the
    /// example card.
    pub async fn load_or_seed(&self, seed_example: bool) -> Result<CardCollection, StoreError> {
        match self.load_all().await? {
            Some(cards) => Ok(CardCollection::new(cards)),
            None if seed_example => {
                tracing::info!("No card file at {}, seeding example card", self.path.display());
                let cards = vec![Card::example()];
                self.save_all(&cards).await?;
                Ok(CardCollection::new(cards))
            }
            None => Ok(CardCollection::default()),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}
