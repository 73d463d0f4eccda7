//! iCalendar document source
//!
//! The locator is either a local file path or an `http(s)://` / `webcal://`
//! URL. The whole document is read on every fetch; wrap the source in a
//! `CachedSource` to avoid hammering remote servers.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::{CalendarError, Result};
use crate::ics::parse_events;
use crate::models::CalendarEvent;
use crate::source::CalendarSource;

/// Where the iCalendar document lives
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Remote(Url),
}

/// Calendar backed by a single iCalendar document
pub struct IcalSource {
    location: Location,
    client: Client,
}

impl IcalSource {
    /// Create a source for a file path or URL
    pub fn new(locator: &str) -> Result<Self> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(CalendarError::Configuration("empty iCalendar location".to_string()));
        }

        let location = match locator.split_once("://") {
            Some(("webcal", rest)) => Location::Remote(parse_url(&format!("https://{}", rest))?),
            Some(("http", _)) | Some(("https", _)) => Location::Remote(parse_url(locator)?),
            Some(("file", path)) => Location::File(PathBuf::from(path)),
            Some((scheme, _)) => {
                return Err(CalendarError::Configuration(format!(
                    "unsupported iCalendar scheme: {}",
                    scheme
                )));
            }
            None => Location::File(PathBuf::from(locator)),
        };

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CalendarError::Configuration(e.to_string()))?;

        Ok(Self { location, client })
    }

    async fn fetch_document(&self) -> Result<String> {
        match &self.location {
            Location::File(path) => {
                debug!("Reading iCalendar file: {}", path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
            Location::Remote(url) => {
                debug!("Downloading iCalendar document: {}", url);
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| CalendarError::Connection(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(CalendarError::HttpError(format!("{} returned {}", url, status)));
                }

                response.text().await.map_err(|e| CalendarError::HttpError(e.to_string()))
            }
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| CalendarError::Configuration(format!("invalid URL {}: {}", raw, e)))
}

#[async_trait]
impl CalendarSource for IcalSource {
    async fn events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Arc<CalendarEvent>>> {
        let document = self.fetch_document().await?;

        let events: Vec<Arc<CalendarEvent>> = parse_events(&document)?
            .into_iter()
            .filter(|e| e.overlaps(from, to))
            .map(Arc::new)
            .collect();

        debug!("iCalendar document yielded {} events in range", events.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC: &str = "BEGIN:VCALENDAR\n\
BEGIN:VEVENT\n\
DTSTART:20240501T090000Z\n\
DTEND:20240501T100000Z\n\
SUMMARY:inside\n\
END:VEVENT\n\
BEGIN:VEVENT\n\
DTSTART:20240601T090000Z\n\
DTEND:20240601T100000Z\n\
SUMMARY:outside\n\
END:VEVENT\n\
END:VCALENDAR\n";

    fn may() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_file_source_filters_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();

        let source = IcalSource::new(file.path().to_str().unwrap()).unwrap();
        let (from, to) = may();
        let events = source.events(from, to).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "inside");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = IcalSource::new("/nonexistent/calendar.ics").unwrap();
        let (from, to) = may();
        assert!(matches!(source.events(from, to).await, Err(CalendarError::Io(_))));
    }

    #[tokio::test]
    async fn test_remote_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/team.ics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOC))
            .mount(&server)
            .await;

        let source = IcalSource::new(&format!("{}/team.ics", server.uri())).unwrap();
        let (from, to) = may();
        let events = source.events(from, to).await.unwrap();

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = IcalSource::new(&format!("{}/gone.ics", server.uri())).unwrap();
        let (from, to) = may();
        assert!(matches!(source.events(from, to).await, Err(CalendarError::HttpError(_))));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(IcalSource::new("ftp://example.org/cal.ics").is_err());
        assert!(IcalSource::new("").is_err());
    }
}
