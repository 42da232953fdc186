use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Interval between expired-token sweep runs, in seconds.
    /// Set via FILLGATE_SWEEP_INTERVAL_SECS. Default: 3600.
    pub sweep_interval_secs: u64,
    /// Allowed dashboard origin for CORS. Default: http://localhost:3000.
    pub dashboard_origin: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/fillgate".into());

    Ok(Config {
        port: std::env::var("FILLGATE_PORT")
            .unwrap_or_else(|_| "8443".into())
            .parse()
            .unwrap_or(8443),
        database_url,
        sweep_interval_secs: std::env::var("FILLGATE_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600),
        dashboard_origin: std::env::var("FILLGATE_DASHBOARD_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".into()),
    })
}
