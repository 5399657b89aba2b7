use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use super::ConnectorError;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, ConnectorError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConnectorError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Percent-encode an identifier so it occupies exactly one path segment.
pub(crate) fn path_segment(value: &str) -> Result<String, ConnectorError> {
    if value == "." || value == ".." {
        return Err(ConnectorError::InvalidRequest(format!(
            "'{}' is not a valid identifier",
            value
        )));
    }
    Ok(urlencoding::encode(value).into_owned())
}

/// Turn a non-2xx response into the matching connector error.
pub(crate) async fn ensure_success(
    response: Response,
    context: &str,
) -> Result<Response, ConnectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ConnectorError::Authentication(
            format!("{} rejected credentials ({})", context, status),
        )),
        _ => Err(ConnectorError::Api {
            status: status.as_u16(),
            message: format!("{}: {}", context, body),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segment_escapes_separators() {
        assert_eq!(
            path_segment("00u1/lifecycle/deactivate?x=").unwrap(),
            "00u1%2Flifecycle%2Fdeactivate%3Fx%3D"
        );
        assert_eq!(path_segment("jane@x.com").unwrap(), "jane%40x.com");
        assert_eq!(path_segment("00u1janedoe").unwrap(), "00u1janedoe");
    }

    #[test]
    fn path_segment_rejects_dot_segments() {
        assert!(path_segment("..").is_err());
        assert!(path_segment(".").is_err());
        assert!(path_segment("a..b").is_ok());
    }
}
