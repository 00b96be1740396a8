//! Character catalog and texture resolution

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where an avatar's real look comes from
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// A random character from the theme
    Character { theme: String },
    /// One specific character by id
    Named(String),
    /// Platform emote image
    Emote { id: u64 },
}

/// Item as listed in the catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub theme: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub path: String,
    #[serde(default)]
    pub hidden: bool,
}

/// A playable character and the sprite the overlay draws for it
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterAsset {
    pub id: String,
    pub name: String,
    pub theme: String,
    /// Relative to the asset root
    pub front_sprite: String,
}

/// Characters whose sprite folder or file prefix differ from the catalog path
const SPRITE_OVERRIDES: &[(&str, &str, &str)] = &[
    ("girlbear", "girlbear", "beargirl"),
    ("evilbear", "evilbear", "evil_bear"),
    ("boybear", "boybear", "bear"),
    ("instafluff", "instafluff", "insta"),
    ("kiro", "kiro", "fairy_boy"),
    ("koral", "koral", "fairy_girl"),
    ("lotus", "lotus", "mushroom_man_pink"),
    ("nova", "nova", "mushroom_man_purple"),
    ("tori", "tori", "mushroom_man_green"),
    ("avellana", "avellana", "avelana"),
];

impl CharacterAsset {
    fn from_item(item: &CatalogItem) -> Self {
        let (folder, file) = SPRITE_OVERRIDES
            .iter()
            .find(|(id, _, _)| *id == item.id)
            .map(|(_, folder, file)| (folder.to_string(), file.to_string()))
            .unwrap_or_else(|| (item.path.clone(), item.path.clone()));

        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            theme: item.theme.clone(),
            front_sprite: format!("characters/{folder}/{file}_front/{file}_front1.png"),
        }
    }
}

/// Emote image URL for a platform emote id
pub fn emote_url(id: u64) -> String {
    format!("https://files.kick.com/emotes/{id}/fullsize")
}

/// Asset lookups the round needs
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Random character id for a theme, or any character if the theme has none
    fn select_character(&self, theme: &str) -> Option<String>;

    /// Texture reference for a character, checked to exist
    async fn resolve_texture(&self, character_id: &str) -> Result<String, AssetError>;
}

/// Turn a texture request into something the overlay can draw
pub async fn resolve_source(
    catalog: &dyn AssetCatalog,
    source: &TextureSource,
) -> Result<String, AssetError> {
    match source {
        TextureSource::Character { theme } => {
            let id = catalog
                .select_character(theme)
                .ok_or_else(|| AssetError::NoCharacters(theme.clone()))?;
            catalog.resolve_texture(&id).await
        }
        TextureSource::Named(id) => catalog.resolve_texture(id).await,
        TextureSource::Emote { id } => Ok(emote_url(*id)),
    }
}

/// Catalog backed by a JSON item list and a sprite directory
pub struct FileCatalog {
    asset_root: PathBuf,
    characters: Vec<CharacterAsset>,
}

impl FileCatalog {
    pub fn from_items(asset_root: impl Into<PathBuf>, items: &[CatalogItem]) -> Self {
        let mut characters: Vec<CharacterAsset> = items
            .iter()
            .filter(|item| item.item_type == "character" && !item.hidden)
            .map(CharacterAsset::from_item)
            .collect();
        characters.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            asset_root: asset_root.into(),
            characters,
        }
    }

    /// Load the catalog file. A missing or unreadable catalog leaves the
    /// game running with placeholder sprites only.
    pub async fn load(asset_root: impl Into<PathBuf>, catalog_path: &Path) -> Self {
        let asset_root = asset_root.into();

        match Self::read_items(catalog_path).await {
            Ok(items) => {
                let catalog = Self::from_items(asset_root, &items);
                info!(
                    items = items.len(),
                    characters = catalog.characters.len(),
                    "Asset catalog loaded"
                );
                catalog
            }
            Err(e) => {
                warn!(path = %catalog_path.display(), error = %e, "Asset catalog unavailable, using placeholders only");
                Self::from_items(asset_root, &[])
            }
        }
    }

    async fn read_items(path: &Path) -> Result<Vec<CatalogItem>, AssetError> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn characters(&self) -> &[CharacterAsset] {
        &self.characters
    }

    pub fn characters_by_theme(&self, theme: &str) -> Vec<&CharacterAsset> {
        self.characters
            .iter()
            .filter(|c| c.theme.eq_ignore_ascii_case(theme))
            .collect()
    }

    pub fn character(&self, id: &str) -> Option<&CharacterAsset> {
        self.characters.iter().find(|c| c.id == id)
    }
}

#[async_trait]
impl AssetCatalog for FileCatalog {
    fn select_character(&self, theme: &str) -> Option<String> {
        let mut rng = rand::thread_rng();
        let themed = self.characters_by_theme(theme);
        let picked = if themed.is_empty() {
            self.characters.choose(&mut rng)
        } else {
            themed.choose(&mut rng).copied()
        };
        picked.map(|c| c.id.clone())
    }

    async fn resolve_texture(&self, character_id: &str) -> Result<String, AssetError> {
        let character = self
            .character(character_id)
            .ok_or_else(|| AssetError::UnknownCharacter(character_id.to_string()))?;

        let full = self.asset_root.join(&character.front_sprite);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => {
                debug!(character = %character.id, sprite = %character.front_sprite, "Character texture resolved");
                Ok(character.front_sprite.clone())
            }
            Ok(_) => Err(AssetError::Missing(full)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssetError::Missing(full)),
            Err(e) => Err(AssetError::Io(e)),
        }
    }
}

/// Asset lookup errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("No characters available for theme: {0}")]
    NoCharacters(String),

    #[error("Sprite not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Asset I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
