/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    /// Base URL used when minting download links; derived from host/port when unset
    pub public_url: Option<String>,
    pub max_upload_size: usize, // in bytes
}

impl Config {
    /// Base URL that download links are rooted at, without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: std::env::var("BUCKETDESK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("BUCKETDESK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3210),
            data_dir: std::env::var("BUCKETDESK_DATA_DIR")
                .unwrap_or_else(|_| "./bucketdesk_data".to_string()),
            public_url: std::env::var("BUCKETDESK_PUBLIC_URL").ok(),
            max_upload_size: 500 * 1024 * 1024, // 500MB default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_falls_back_to_bind_address() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: "./data".to_string(),
            public_url: None,
            max_upload_size: 1024,
        };
        assert_eq!(config.base_url(), "http://0.0.0.0:8080");
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3210,
            data_dir: "./data".to_string(),
            public_url: Some("https://files.example.com/".to_string()),
            max_upload_size: 1024,
        };
        assert_eq!(config.base_url(), "https://files.example.com");
    }
}
