//! Request extractors

use super::AppState;
use crate::core::{MediaFormat, Quality};
use crate::error::ServiceError;
use crate::utils::parse_media_url;
use axum::extract::{ConnectInfo, Form, FromRequest, FromRequestParts, Json, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use url::Url;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Body accepted either as JSON or as a urlencoded form
#[derive(Debug)]
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// Rate-limiting identity of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.options.trust_forwarded {
            let forwarded = parts
                .headers
                .get(FORWARDED_FOR)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty());

            if let Some(hop) = forwarded {
                return Ok(Self(hop.to_string()));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(peer))
    }
}

/// Body of a preview request
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub url: String,
}

impl PreviewRequest {
    pub fn url(&self) -> Result<Url, ServiceError> {
        parse_media_url(&self.url)
    }
}

/// Body of a download request
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl DownloadRequest {
    /// Validate the request, applying the `mp4`/`medium` defaults
    pub fn parse(&self) -> Result<(Url, MediaFormat, Quality), ServiceError> {
        let url = parse_media_url(&self.url)?;

        let format = match self.format.as_deref().map(str::trim) {
            None | Some("") => MediaFormat::default(),
            Some(raw) => raw.parse()?,
        };
        let quality = match self.quality.as_deref().map(str::trim) {
            None | Some("") => Quality::default(),
            Some(raw) => raw.parse()?,
        };

        Ok((url, format, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, format: Option<&str>, quality: Option<&str>) -> DownloadRequest {
        DownloadRequest {
            url: url.to_string(),
            format: format.map(str::to_string),
            quality: quality.map(str::to_string),
        }
    }

    #[test]
    fn test_download_request_defaults() {
        let (url, format, quality) = request("https://youtu.be/abc", None, Some(""))
            .parse()
            .unwrap();
        assert_eq!(url.as_str(), "https://youtu.be/abc");
        assert_eq!(format, MediaFormat::Video);
        assert_eq!(quality, Quality::Medium);
    }

    #[test]
    fn test_download_request_rejects_unknown_values() {
        assert!(matches!(
            request("https://youtu.be/abc", Some("flac"), None).parse(),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            request("https://youtu.be/abc", None, Some("4k")).parse(),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            request("", None, None).parse(),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_preview_request_url() {
        let ok = PreviewRequest {
            url: "  https://youtu.be/abc ".into(),
        };
        assert!(ok.url().is_ok());

        let bad = PreviewRequest {
            url: "ftp://example.com/file".into(),
        };
        assert!(bad.url().is_err());
    }
}
