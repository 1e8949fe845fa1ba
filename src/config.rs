#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub syntage_api_key: String,
    pub syntage_base_url: String,
    pub firebase_project_id: String,
    pub allowed_origins: Vec<String>,
    pub cache_file: String,
    pub cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            syntage_api_key: std::env::var("SYNTAGE_API_KEY")
                .map_err(|_| anyhow::anyhow!("SYNTAGE_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("SYNTAGE_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            syntage_base_url: {
                let url = std::env::var("SYNTAGE_BASE_URL")
                    .unwrap_or_else(|_| "https://api.sandbox.syntage.com".to_string());
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("SYNTAGE_BASE_URL must start with http:// or https://");
                }
                url.trim_end_matches('/').to_string()
            },
            firebase_project_id: std::env::var("FIREBASE_PROJECT_ID")
                .map_err(|_| anyhow::anyhow!("FIREBASE_PROJECT_ID environment variable required"))
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("FIREBASE_PROJECT_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            cache_file: std::env::var("CACHE_FILE")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .unwrap_or_else(|| "cache.json".to_string()),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CACHE_TTL_SECS must be a number of seconds"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Syntage Base URL: {}", config.syntage_base_url);
        tracing::debug!("Firebase Project ID: {}", config.firebase_project_id);
        tracing::debug!(
            "Cache file: {} (default TTL {}s)",
            config.cache_file,
            config.cache_ttl_secs
        );
        if !config.allowed_origins.is_empty() {
            tracing::info!("CORS origins configured: {:?}", config.allowed_origins);
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
