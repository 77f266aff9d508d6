//! HTTP client settings applied to every curl handle (HEAD probes and GETs).

use std::collections::BTreeMap;
use std::time::Duration;

use curl::easy::{Easy2, Handler, List};

use crate::config::EngineConfig;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: u32 = 10;

/// Connection settings derived from `EngineConfig`, shared by all transfers.
#[derive(Debug, Clone)]
pub struct Transport {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    /// A transfer with no bytes for this long is aborted.
    pub stall_timeout: Duration,
    pub buffer_size: usize,
}

impl Transport {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            proxy: cfg.proxy_url.clone().filter(|p| !p.is_empty()),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
            stall_timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
            buffer_size: cfg.buffer_size.max(1024),
        }
    }

    /// Point `easy` at `url` with redirects, timeouts, proxy, headers and cookies.
    pub fn configure<H: Handler>(
        &self,
        easy: &mut Easy2<H>,
        url: &str,
        headers: &BTreeMap<String, String>,
        cookies: &[String],
    ) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(self.connect_timeout)?;
        // Stall detection instead of a wall-clock cap, so large chunks on slow
        // links are not killed while still making progress.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(self.stall_timeout)?;
        easy.buffer_size(self.buffer_size)?;
        if let Some(proxy) = &self.proxy {
            easy.proxy(proxy)?;
        }
        if !headers.is_empty() {
            let mut list = List::new();
            for (k, v) in headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        if !cookies.is_empty() {
            easy.cookie(&cookies.join("; "))?;
        }
        // Lets the handler's progress() callback abort on cancellation.
        easy.progress(true)?;
        Ok(())
    }
}

/// Parse the status code from a status line (`HTTP/1.1 206 Partial Content`).
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 200"), Some(200));
        assert_eq!(parse_status_line("Content-Length: 5"), None);
        assert_eq!(parse_status_line("HTTP/1.1"), None);
    }

    #[test]
    fn from_config_drops_empty_proxy() {
        let mut cfg = EngineConfig::default();
        cfg.proxy_url = Some(String::new());
        cfg.timeout_secs = 7;
        let t = Transport::from_config(&cfg);
        assert!(t.proxy.is_none());
        assert_eq!(t.stall_timeout, Duration::from_secs(7));
        assert_eq!(t.buffer_size, 32 * 1024);
    }

    #[test]
    fn zero_timeouts_fall_back_to_one_second() {
        let mut cfg = EngineConfig::default();
        cfg.timeout_secs = 0;
        cfg.connect_timeout_secs = 0;
        let t = Transport::from_config(&cfg);
        assert_eq!(t.stall_timeout, Duration::from_secs(1));
        assert_eq!(t.connect_timeout, Duration::from_secs(1));
    }
}
