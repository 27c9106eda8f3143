use serde::de::DeserializeOwned;
use vitals_common::{
    ApiResponse, PerformanceReport, Result, VitalsError, WindowData, PERFORMANCE_PATH,
};

/// Vitals client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the telemetry server.
    pub base_addr: String,
}

/// Vitals Client
pub struct Client {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http_client: reqwest::Client::new() }
    }

    /// Build the URL of the telemetry endpoint.
    pub fn build_url(&self) -> String {
        format!("http://{}{}", self.config.base_addr, PERFORMANCE_PATH)
    }

    /// Submit one report. The server discards the report's `timestamp` and stamps its own.
    pub async fn submit(&self, report: &PerformanceReport) -> Result<()> {
        let response = self
            .http_client
            .post(self.build_url())
            .json(report)
            .send()
            .await
            .map_err(|e| VitalsError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        let ack: ApiResponse<serde::de::IgnoredAny> = read_envelope(response).await?;
        if !ack.success {
            return Err(VitalsError::MalformedResponse(
                "2xx response without success flag".to_string(),
            ));
        }
        Ok(())
    }

    /// Fetch the most recent reports (optionally filtered by URL substring) with their summary.
    pub async fn fetch(&self, limit: Option<usize>, url: Option<&str>) -> Result<WindowData> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(url) = url {
            query.push(("url", url.to_string()));
        }

        let mut request = self.http_client.get(self.build_url());
        if !query.is_empty() {
            request = request.query(&query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VitalsError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        let envelope: ApiResponse<WindowData> = read_envelope(response).await?;
        envelope
            .data
            .filter(|_| envelope.success)
            .ok_or_else(|| VitalsError::MalformedResponse("2xx response without data".to_string()))
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiResponse<T>> {
    response.json::<ApiResponse<T>>().await.map_err(|e| {
        if e.is_decode() {
            VitalsError::MalformedResponse(e.to_string())
        } else {
            VitalsError::NetworkError(e.to_string())
        }
    })
}

async fn parse_error_response(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> VitalsError {
    if status == reqwest::StatusCode::BAD_REQUEST {
        return VitalsError::InvalidReport;
    }

    let error_msg = response
        .json::<ApiResponse<serde::de::IgnoredAny>>()
        .await
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| format!("Server returned status: {}", status));

    VitalsError::HttpError(status.as_u16(), error_msg)
}
