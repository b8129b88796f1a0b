pub use gateway_config::{
    CookieConfig,
    CorsConfig,
    Environment,
    GateConfig,
    GatewayConfig,
    ProviderConfig,
    ServerConfig,
    UpstreamConfig,
};
pub use provider_env::ProviderEnv;

mod gateway_config;
mod provider_env;
