use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::GoogleOAuthConfig;

use super::{
    CellRow, Credentials, GatewayError, GatewayErrorKind, SheetRange, SheetsConnector,
    SpreadsheetGateway,
};

pub struct GoogleSheetsConnector {
    client: Client,
    base_url: String,
    oauth: Option<GoogleOAuthConfig>,
}

impl GoogleSheetsConnector {
    pub fn new(base_url: &str, oauth: Option<GoogleOAuthConfig>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            oauth,
        })
    }
}

impl SheetsConnector for GoogleSheetsConnector {
    fn connect(&self, credentials: Credentials) -> Arc<dyn SpreadsheetGateway> {
        Arc::new(GoogleSheets {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            oauth: self.oauth.clone(),
            credentials: Mutex::new(credentials),
        })
    }
}

/// Sheets v4 REST client bound to one user's tokens. A refreshed access token
/// lives only as long as this instance.
pub struct GoogleSheets {
    client: Client,
    base_url: String,
    oauth: Option<GoogleOAuthConfig>,
    credentials: Mutex<Credentials>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GoogleSheets {
    fn spreadsheet_url(&self, spreadsheet_id: &str, tail: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::new(GatewayErrorKind::Api, format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::new(GatewayErrorKind::Api, "Base URL cannot have paths"))?
            .push("spreadsheets")
            .push(spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    fn values_url(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
        action: &str,
    ) -> Result<Url, GatewayError> {
        let segment = format!("{}{action}", range.to_a1());
        self.spreadsheet_url(spreadsheet_id, &["values", &segment])
    }

    /// Send the request built by `build`, refreshing the access token once on 401.
    async fn send<F>(&self, build: F) -> Result<Value, GatewayError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.credentials.lock().await.access_token.clone();
        let resp = build(&self.client)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport_error)?;

        let resp = if resp.status() == StatusCode::UNAUTHORIZED {
            match self.refresh_access_token().await? {
                Some(fresh) => build(&self.client)
                    .bearer_auth(&fresh)
                    .send()
                    .await
                    .map_err(transport_error)?,
                None => resp,
            }
        } else {
            resp
        };

        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(body);
        }

        let message = body["error"]["message"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("HTTP {status}"));

        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayErrorKind::Unauthorized,
            StatusCode::NOT_FOUND => GatewayErrorKind::RangeNotFound,
            StatusCode::BAD_REQUEST if message.contains("Unable to parse range") => {
                GatewayErrorKind::RangeNotFound
            }
            _ => GatewayErrorKind::Api,
        };

        Err(GatewayError::new(kind, message))
    }

    async fn refresh_access_token(&self) -> Result<Option<String>, GatewayError> {
        let Some(oauth) = &self.oauth else {
            return Ok(None);
        };

        let mut credentials = self.credentials.lock().await;
        let Some(refresh_token) = credentials.refresh_token.clone() else {
            return Ok(None);
        };

        let resp = self
            .client
            .post(&oauth.token_url)
            .form(&[
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            tracing::warn!("Access token refresh rejected with {}", resp.status());
            return Ok(None);
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            GatewayError::new(GatewayErrorKind::Api, format!("Invalid token response: {e}"))
        })?;

        tracing::debug!("Refreshed Google access token");
        credentials.access_token = token.access_token.clone();
        Ok(Some(token.access_token))
    }
}

#[async_trait]
impl SpreadsheetGateway for GoogleSheets {
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<String>, GatewayError> {
        let url = self.spreadsheet_url(spreadsheet_id, &[])?;
        let body = self
            .send(|client| {
                client
                    .get(url.clone())
                    .query(&[("fields", "sheets.properties.title")])
            })
            .await?;

        let meta: SpreadsheetMeta = serde_json::from_value(body).map_err(|e| {
            GatewayError::new(GatewayErrorKind::Api, format!("Unexpected spreadsheet metadata: {e}"))
        })?;

        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
    ) -> Result<Vec<CellRow>, GatewayError> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        let body = self
            .send(|client| {
                client.get(url.clone()).query(&[
                    ("majorDimension", "ROWS"),
                    ("valueRenderOption", "FORMATTED_VALUE"),
                ])
            })
            .await?;

        let values: ValueRange = serde_json::from_value(body).map_err(|e| {
            GatewayError::new(GatewayErrorKind::Api, format!("Unexpected value range: {e}"))
        })?;

        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        row: &[String],
    ) -> Result<(), GatewayError> {
        let url = self.values_url(spreadsheet_id, &SheetRange::whole(sheet), ":append")?;
        let body = json!({ "values": [row] });
        self.send(|client| {
            client
                .post(url.clone())
                .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                .json(&body)
        })
        .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
        row: &[Option<String>],
    ) -> Result<(), GatewayError> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        // The API skips null cells, which is what keeps omitted fields untouched.
        let body = json!({
            "range": range.to_a1(),
            "majorDimension": "ROWS",
            "values": [row],
        });
        self.send(|client| {
            client
                .put(url.clone())
                .query(&[("valueInputOption", "RAW")])
                .json(&body)
        })
        .await?;
        Ok(())
    }

    async fn clear_range(
        &self,
        spreadsheet_id: &str,
        range: &SheetRange,
    ) -> Result<(), GatewayError> {
        let url = self.values_url(spreadsheet_id, range, ":clear")?;
        self.send(|client| client.post(url.clone()).json(&json!({})))
            .await?;
        Ok(())
    }
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::new(GatewayErrorKind::Transport, err.to_string())
}
