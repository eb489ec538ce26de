use super::types::VersionCatalog;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;

const CATALOG_URL: &str = "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Shared HTTP client for catalog and document fetches.
/// Callers performing bulk downloads should clone this rather than build
/// their own so connection pools are reused.
pub fn http_client() -> &'static Client {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client")
    });
    &CLIENT
}

/// Fetch the remote version catalog with retry and exponential backoff
pub async fn fetch_catalog(client: &Client) -> Result<VersionCatalog> {
    fetch_catalog_from(client, CATALOG_URL).await
}

/// Fetch a version catalog from an explicit URL (injectable for tests)
pub async fn fetch_catalog_from(client: &Client, url: &str) -> Result<VersionCatalog> {
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
            log::info!(
                "Retrying catalog fetch (attempt {}/{}) after {}ms...",
                attempt + 1,
                MAX_RETRIES,
                backoff
            );
            tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    let error_msg = format!("HTTP {} from catalog URL", status);
                    log::warn!("{}", error_msg);
                    last_error = Some(anyhow::anyhow!(error_msg));
                    continue;
                }

                match response.json::<VersionCatalog>().await {
                    Ok(catalog) => {
                        log::info!("Fetched {} catalog entries", catalog.versions.len());
                        return Ok(catalog);
                    }
                    Err(e) => {
                        let error_msg = format!("Failed to parse catalog JSON: {}", e);
                        log::warn!("{}", error_msg);
                        last_error = Some(anyhow::anyhow!(error_msg));
                        continue;
                    }
                }
            }
            Err(e) => {
                let error_msg = format!("Failed to GET catalog: {}", e);
                log::warn!("{}", error_msg);
                last_error = Some(anyhow::anyhow!(error_msg));
                continue;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        anyhow::anyhow!("Failed to fetch catalog after {} retries", MAX_RETRIES)
    }))
    .context("Version catalog fetch failed")
}
