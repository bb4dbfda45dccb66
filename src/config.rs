use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

/// Pipeline configuration, loadable from `Grouprs.toml` and `GROUPRS_*`
/// environment variables. CLI flags override the input/output paths and the
/// distance threshold after loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input_dir: String,
    pub output_dir: String,
    /// Side length of the square perceptual hash; 8 gives a 64-bit hash.
    pub hash_size: u32,
    /// Maximum Hamming distance for two images to land in the same group.
    pub hash_threshold: u32,
    /// Minimum classifier confidence for an image to be retained.
    pub classifier_threshold: f32,
    /// Member-name suffixes treated as images (lowercase, without dot).
    pub image_suffixes: Vec<String>,
    /// File suffixes treated as archives (lowercase, without dot).
    pub archive_suffixes: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: ".".to_string(),
            output_dir: "similar_photos".to_string(),
            hash_size: 8,
            hash_threshold: 5,
            classifier_threshold: 0.5,
            image_suffixes: ["png", "jpg", "jpeg", "bmp", "tiff", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            archive_suffixes: vec!["zip".to_string()],
        }
    }
}

impl AppConfig {
    pub fn is_image_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.image_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&format!(".{suffix}")))
    }

    pub fn is_archive_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.archive_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&format!(".{suffix}")))
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Grouprs").required(false))
        .add_source(Environment::with_prefix("GROUPRS"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_suffixes_match_case_insensitively() {
        let config = AppConfig::default();
        assert!(config.is_image_name("photo.JPG"));
        assert!(config.is_image_name("scan.tiff"));
        assert!(!config.is_image_name("notes.txt"));
        assert!(config.is_archive_name("case.ZIP"));
        assert!(!config.is_archive_name("case.rar"));
    }

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.hash_size, 8);
        assert_eq!(config.hash_threshold, 5);
        assert_eq!(config.image_suffixes.len(), 6);
    }
}
