//! Remote participant lookups.

use async_trait::async_trait;
use reqwest::Client;

use super::types::{Participant, ParticipantsResponse};
use crate::config::DirectoryConfig;
use crate::error::{Error, Result};

/// Source of participant entries for the directory cache
///
/// Implementations must be safe to call concurrently for different peers.
#[async_trait]
pub trait DirectoryFetcher: Send + Sync {
    /// Fetch the authoritative entry for `peer_id`
    ///
    /// Fails with `Directory` when the peer is unknown or the directory is
    /// unreachable, and `Format` when the response cannot be decoded.
    async fn fetch_participant(&self, peer_id: &str) -> Result<Participant>;
}

/// Directory client speaking the OData-style participants endpoint
pub struct HttpDirectoryFetcher {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpDirectoryFetcher {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Use an existing client (shared connection pool)
    pub fn with_client(client: Client, config: &DirectoryConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    /// `GET {base}/Participants?$filter=IataCode eq '{peer_id}'`, pre-encoded
    ///
    /// Callers validate `peer_id` first, so it needs no escaping.
    pub(crate) fn participants_url(&self, peer_id: &str) -> String {
        format!(
            "{}/Participants?%24filter=IataCode%20eq%20'{}'",
            self.base_url, peer_id
        )
    }
}

#[async_trait]
impl DirectoryFetcher for HttpDirectoryFetcher {
    async fn fetch_participant(&self, peer_id: &str) -> Result<Participant> {
        let url = self.participants_url(peer_id);
        tracing::debug!(peer_id = %peer_id, url = %url, "Fetching participant");

        let mut request = self.client.get(&url);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let unreachable = |e: reqwest::Error| Error::Directory {
            peer_id: peer_id.to_string(),
            reason: e.to_string(),
        };

        let body = request
            .send()
            .await
            .map_err(unreachable)?
            .error_for_status()
            .map_err(unreachable)?
            .text()
            .await
            .map_err(unreachable)?;

        parse_participants(peer_id, &body)
    }
}

/// Pick the entry for `peer_id` out of a participants response body
pub fn parse_participants(peer_id: &str, body: &str) -> Result<Participant> {
    let response: ParticipantsResponse = serde_json::from_str(body)
        .map_err(|e| Error::Format(format!("Invalid participants response: {}", e)))?;

    if response.participants.is_empty() {
        return Err(Error::Directory {
            peer_id: peer_id.to_string(),
            reason: "empty participant list".into(),
        });
    }

    response
        .participants
        .into_iter()
        .find(|p| p.iata_code == peer_id)
        .ok_or_else(|| Error::Directory {
            peer_id: peer_id.to_string(),
            reason: "no participant with a matching IATA code".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participants_url() {
        let config = DirectoryConfig {
            base_url: "https://directory.example/api/".into(),
            ..DirectoryConfig::default()
        };
        let fetcher = HttpDirectoryFetcher::new(&config);

        assert_eq!(
            fetcher.participants_url("C1"),
            "https://directory.example/api/Participants?%24filter=IataCode%20eq%20'C1'"
        );
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let body = r#"{"value": [
            {"IataCode": "QRX", "Name": "wrong"},
            {"IataCode": "QR", "Name": "first"},
            {"IataCode": "QR", "Name": "second"}
        ]}"#;
        let p = parse_participants("QR", body).unwrap();
        assert_eq!(p.name.as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_list_is_directory_error() {
        let err = parse_participants("C1", r#"{"value": []}"#).unwrap_err();
        assert!(matches!(err, Error::Directory { ref peer_id, .. } if peer_id == "C1"));
    }

    #[test]
    fn test_no_match_is_directory_error() {
        let err = parse_participants("C1", r#"{"value": [{"IataCode": "C2"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Directory { .. }));
    }

    #[test]
    fn test_malformed_body_is_format_error() {
        let err = parse_participants("C1", "<html>502</html>").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
