//! Tracking API: bulk listing of received trackings, then one price lookup
//! per tracking, issued concurrently.

use std::collections::BTreeSet;

use futures::future::join_all;
use serde_json::Value;
use shiprecon_config::Credentials;
use shiprecon_recon::{CostMaps, TrackingKey};

use crate::client::{get_json_once, money_field, text_field, FetchClient, USER_AGENT};
use crate::error::FetchError;

const PAGE_LIMIT: u64 = 100;

/// A listed tracking with the purchase it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    tracking_number: String,
    purchase_id: String,
    purchase_cents: i64,
}

pub struct TrackingApiSource {
    client: FetchClient,
    base_url: String,
    credentials: Credentials,
}

impl TrackingApiSource {
    pub fn new(client: FetchClient, base_url: &str, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn login(&self) -> Result<String, FetchError> {
        let url = format!("{}/buyers/login", self.base_url);
        let form = [
            ("credentials", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];
        let body = self.client.request_json(|http| http.post(&url).form(&form))?;
        body["data"]["token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                FetchError::upstream(self.client.source_name(), "login response missing 'data.token'")
            })
    }

    fn list_entries(&self, token: &str) -> Result<Vec<Entry>, FetchError> {
        let source = self.client.source_name();
        let url = format!("{}/buyers/trackings", self.base_url);
        let mut entries = Vec::new();
        let mut start = 0u64;

        loop {
            let params = [
                ("limit", PAGE_LIMIT.to_string()),
                ("start", start.to_string()),
                ("receiving_status_id", "1".to_string()),
            ];
            let body = self
                .client
                .request_json(|http| http.get(&url).bearer_auth(token).query(&params))?;

            let total = body["totals"]["items"]
                .as_u64()
                .ok_or_else(|| FetchError::upstream(source, "listing missing 'totals.items'"))?;
            let data = body["data"]
                .as_array()
                .ok_or_else(|| FetchError::upstream(source, "listing missing 'data' array"))?;

            for item in data {
                let tracking_number = text_field(&item["tracking_number"]);
                if tracking_number.is_empty() {
                    continue;
                }
                entries.push(Entry {
                    tracking_number,
                    purchase_id: text_field(&item["purchase_id"]),
                    purchase_cents: money_field(source, &item["purchase"]["amount"], "purchase.amount")?,
                });
            }
            tracing::debug!(start, total, listed = entries.len(), "fetched tracking listing page");

            start += PAGE_LIMIT;
            if start >= total {
                break;
            }
        }
        Ok(entries)
    }

    /// Purchase costs for every listed tracking plus a box price for each
    /// tracking not in `known`.
    ///
    /// Lookups that fail are logged and left out of the result. There is no
    /// incremental shortcut, so `full` changes nothing here.
    pub fn fetch_costs(
        &self,
        known: &BTreeSet<TrackingKey>,
        _full: bool,
    ) -> Result<CostMaps, FetchError> {
        let token = self.login()?;
        let entries = self.list_entries(&token)?;

        let mut maps = CostMaps::default();
        let mut unknown: Vec<String> = Vec::new();
        for entry in &entries {
            if !entry.purchase_id.is_empty() {
                maps.po_costs
                    .insert(entry.purchase_id.clone(), entry.purchase_cents);
            }
            let Some(key) = TrackingKey::single(&entry.tracking_number) else {
                continue;
            };
            maps.link_po(&key, &entry.purchase_id);
            if !known.contains(&key) && !unknown.contains(&entry.tracking_number) {
                unknown.push(entry.tracking_number.clone());
            }
        }

        let priced = self.price_all(&token, &unknown)?;
        let mut failed = 0usize;
        for (number, result) in unknown.iter().zip(priced) {
            match result {
                Ok(cents) => {
                    if let Some(key) = TrackingKey::single(number) {
                        maps.tracking_costs.insert(key, cents);
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(tracking = %number, error = %e, "price lookup failed, skipping");
                }
            }
        }

        tracing::info!(
            listed = entries.len(),
            looked_up = unknown.len(),
            priced = maps.tracking_costs.len(),
            failed,
            "priced trackings",
        );
        Ok(maps)
    }

    /// One result per number, in input order.
    fn price_all(
        &self,
        token: &str,
        numbers: &[String],
    ) -> Result<Vec<Result<i64, FetchError>>, FetchError> {
        if numbers.is_empty() {
            return Ok(Vec::new());
        }
        let http = reqwest::Client::builder()
            .timeout(self.client.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Setup {
                what: "async HTTP client".into(),
                message: e.to_string(),
            })?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| FetchError::Setup {
                what: "async runtime".into(),
                message: e.to_string(),
            })?;

        let source = self.client.source_name();
        let lookups = numbers
            .iter()
            .map(|number| price_one(&http, source, &self.base_url, token, number));
        Ok(runtime.block_on(join_all(lookups)))
    }
}

async fn price_one(
    http: &reqwest::Client,
    source: &str,
    base_url: &str,
    token: &str,
    number: &str,
) -> Result<i64, FetchError> {
    let url = price_url(base_url, number)
        .ok_or_else(|| FetchError::upstream(source, format!("bad base url '{base_url}'")))?;
    let body: Value = get_json_once(http, source, url.as_str(), token).await?;
    let price = &body["data"]["box"]["total_price"];
    if price.is_null() {
        return Err(FetchError::upstream(source, format!("{number}: missing data.box.total_price")));
    }
    money_field(source, price, "total_price")
}

/// `{base_url}/buyers/trackings/{number}` with the number as one
/// percent-encoded path segment.
fn price_url(base_url: &str, number: &str) -> Option<reqwest::Url> {
    let mut url = reqwest::Url::parse(base_url).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["buyers", "trackings", number]);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use shiprecon_config::CredentialSource;
    use std::time::Duration;

    fn source(server: &MockServer) -> TrackingApiSource {
        let client = FetchClient::new("usa", Duration::from_secs(5))
            .unwrap()
            .with_retries(0);
        let credentials = Credentials {
            username: "buyer@example.com".into(),
            password: "pw".into(),
            source: CredentialSource::Inline,
        };
        TrackingApiSource::new(client, &server.base_url(), credentials)
    }

    fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/buyers/login")
                .form_urlencoded_tuple("credentials", "buyer@example.com")
                .form_urlencoded_tuple("password", "pw");
            then.status(200).json_body(json!({"data": {"token": "tok"}}));
        })
    }

    fn listing<'a>(server: &'a MockServer, numbers: &[&str]) -> httpmock::Mock<'a> {
        let data: Vec<Value> = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| {
                json!({
                    "tracking_number": n,
                    "purchase_id": 100 + i,
                    "purchase": {"amount": "12.00"}
                })
            })
            .collect();
        let total = numbers.len();
        server.mock(move |when, then| {
            when.method(GET)
                .path("/buyers/trackings")
                .query_param("start", "0")
                .query_param("limit", "100")
                .query_param("receiving_status_id", "1");
            then.status(200)
                .json_body(json!({"data": data, "totals": {"items": total}}));
        })
    }

    fn price<'a>(server: &'a MockServer, number: &str, total: &str) -> httpmock::Mock<'a> {
        let path = format!("/buyers/trackings/{number}");
        let total = total.to_string();
        server.mock(move |when, then| {
            when.method(GET).path(path).header("authorization", "Bearer tok");
            then.status(200)
                .json_body(json!({"data": {"box": {"total_price": total}}}));
        })
    }

    fn key(t: &str) -> TrackingKey {
        TrackingKey::single(t).unwrap()
    }

    #[test]
    fn test_price_url_encodes_tracking_number() {
        let url = price_url("http://host:8080", "A/B?x#y").unwrap();
        assert_eq!(url.as_str(), "http://host:8080/buyers/trackings/A%2FB%3Fx%23y");
        assert_eq!(url.path_segments().unwrap().count(), 3);

        let url = price_url("http://host/api", "1Z999").unwrap();
        assert_eq!(url.as_str(), "http://host/api/buyers/trackings/1Z999");

        assert!(price_url("not a url", "1Z999").is_none());
    }

    #[test]
    fn test_prices_unknown_trackings_only() {
        let server = MockServer::start();
        mock_login(&server);
        listing(&server, &["A", "B"]);
        let a = price(&server, "A", "5.25");
        let b = price(&server, "B", "7.00");

        let known = BTreeSet::from([key("B")]);
        let maps = source(&server).fetch_costs(&known, false).unwrap();

        a.assert_hits(1);
        b.assert_hits(0);
        assert_eq!(maps.tracking_costs.len(), 1);
        assert_eq!(maps.tracking_costs[&key("A")], 525);
        assert_eq!(maps.po_costs["100"], 1200);
        assert_eq!(maps.po_costs["101"], 1200);
        assert!(maps.tracking_pos["B"].contains("101"));
    }

    #[test]
    fn test_partial_fan_out_keeps_successes() {
        let server = MockServer::start();
        mock_login(&server);
        listing(&server, &["K1", "K2", "K3"]);
        price(&server, "K1", "1.00");
        let broken = server.mock(|when, then| {
            when.method(GET).path("/buyers/trackings/K2");
            then.status(500);
        });
        price(&server, "K3", "3.00");

        let maps = source(&server).fetch_costs(&BTreeSet::new(), false).unwrap();

        broken.assert_hits(1);
        assert_eq!(maps.tracking_costs.len(), 2);
        assert_eq!(maps.tracking_costs[&key("K1")], 100);
        assert_eq!(maps.tracking_costs[&key("K3")], 300);
        assert!(!maps.tracking_costs.contains_key(&key("K2")));
    }

    #[test]
    fn test_listing_pages_until_total() {
        let server = MockServer::start();
        mock_login(&server);
        let page1: Vec<Value> = (0..100)
            .map(|i| json!({"tracking_number": format!("T{i:03}"), "purchase_id": "P", "purchase": {"amount": 1}}))
            .collect();
        let first = server.mock(move |when, then| {
            when.method(GET).path("/buyers/trackings").query_param("start", "0");
            then.status(200)
                .json_body(json!({"data": page1, "totals": {"items": 101}}));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/buyers/trackings").query_param("start", "100");
            then.status(200).json_body(json!({
                "data": [{"tracking_number": "LAST", "purchase_id": "Q", "purchase": {"amount": 2}}],
                "totals": {"items": 101}
            }));
        });

        let s = source(&server);
        let entries = s.list_entries("tok").unwrap();
        first.assert();
        second.assert();
        assert_eq!(entries.len(), 101);
        assert_eq!(entries[100].tracking_number, "LAST");
        assert_eq!(entries[100].purchase_cents, 200);
    }

    #[test]
    fn test_listing_failure_is_an_error() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET).path("/buyers/trackings");
            then.status(502);
        });

        let err = source(&server).fetch_costs(&BTreeSet::new(), false).unwrap_err();
        assert!(matches!(err, FetchError::Upstream { .. }), "{err}");
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/buyers/login");
            then.status(200).json_body(json!({"data": {}}));
        });

        let err = source(&server).fetch_costs(&BTreeSet::new(), false).unwrap_err();
        assert!(err.to_string().contains("data.token"), "{err}");
    }
}
