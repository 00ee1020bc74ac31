//! Contextual statistics from the public meteor network.
//!
//! Scraping a third-party page is fragile, so everything here is optional:
//! the fetch returns `None` on any failure and the result only ever feeds
//! the dashboard's context line, never the core endpoints.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

const STATUS_URL: &str = "https://globalmeteornetwork.org/weblog/";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Whatever the network page currently reports; both fields are optional
/// because the page layout is not under our control.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    /// Cameras currently reporting to the network.
    pub cameras: Option<u32>,
    /// Zenithal hourly rate of the currently active shower, if listed.
    pub zhr: Option<f64>,
}

type Cached = Option<(Instant, Option<NetworkStats>)>;

/// Fetches network statistics at most once per [`CACHE_TTL`]; all requests
/// in between share the cached answer (including a cached failure).
#[derive(Clone)]
pub struct NetworkClient {
    cache: Arc<Mutex<Cached>>,
}

impl NetworkClient {
    pub fn new() -> Self {
        NetworkClient {
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn stats(&self) -> Option<NetworkStats> {
        {
            let guard = self.cache.lock().unwrap();
            if let Some((fetched_at, value)) = guard.as_ref() {
                if fetched_at.elapsed() < CACHE_TTL {
                    return value.clone();
                }
            }
        }

        let result = fetch_stats().await;

        let mut guard = self.cache.lock().unwrap();
        *guard = Some((Instant::now(), result.clone()));
        result
    }
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_stats() -> Option<NetworkStats> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .ok()?;
    let body = match client.get(STATUS_URL).send().await {
        Ok(resp) => resp.text().await.ok()?,
        Err(e) => {
            debug!("Network stats fetch failed: {e}");
            return None;
        }
    };
    parse_stats(&body)
}

/// Pull the camera count and shower ZHR out of the page text.  Returns
/// `None` only when neither number is present.
fn parse_stats(body: &str) -> Option<NetworkStats> {
    let cameras = Regex::new(r"(\d[\d,]*)\s+(?:active\s+)?(?:cameras|stations)")
        .ok()?
        .captures(body)
        .and_then(|c| c[1].replace(',', "").parse().ok());
    let zhr = Regex::new(r"ZHR\s*[:=]?\s*(\d+(?:\.\d+)?)")
        .ok()?
        .captures(body)
        .and_then(|c| c[1].parse().ok());

    if cameras.is_none() && zhr.is_none() {
        return None;
    }
    Some(NetworkStats { cameras, zhr })
}
