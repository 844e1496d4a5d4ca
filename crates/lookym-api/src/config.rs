//! Environment-driven provider configuration.

use envconfig::Envconfig;

/// Endpoints and keys for the hosted backend and the media CDN.
///
/// Populated from the environment at startup; the defaults point at a local
/// development stack.
#[derive(Envconfig, Debug, Clone)]
pub struct BackendConfig {
    #[envconfig(from = "LOOKYM_API_URL", default = "http://localhost:54321")]
    pub api_url: String,

    /// Public (anonymous) API key sent with every request.
    #[envconfig(from = "LOOKYM_ANON_KEY", default = "dev-anon-key")]
    pub anon_key: String,

    #[envconfig(from = "LOOKYM_CDN_URL", default = "https://api.cloudinary.com/v1_1/lookym")]
    pub cdn_url: String,

    /// Unsigned upload preset accepted by the CDN.
    #[envconfig(from = "LOOKYM_CDN_UPLOAD_PRESET", default = "lookym_unsigned")]
    pub cdn_upload_preset: String,
}
