use crate::app::ports::{HttpClientPort, SourcePort};
use crate::common::constants::GITHUB_BASE_URL;
use crate::common::error::{PipelineError, Result};
use crate::domain::RawRecord;
use crate::pipeline::processing::quality_gate::coerce::coerce_count;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Selectors for one trending page row
struct RowSelectors {
    row: Selector,
    title_link: Selector,
    description: Selector,
    language: Selector,
    stars: Selector,
    forks: Selector,
    period_stars: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            row: selector("article.Box-row")?,
            title_link: selector("h2 a")?,
            description: selector("p")?,
            language: selector("[itemprop=\"programmingLanguage\"]")?,
            stars: selector("a[href$=\"/stargazers\"]")?,
            forks: selector("a[href$=\"/forks\"]")?,
            period_stars: selector("span.float-sm-right")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| PipelineError::Fetch {
        message: format!("invalid selector {:?}: {:?}", css, e),
    })
}

/// Collapse all whitespace runs inside an element's text to single spaces
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn optional_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Extract raw records from a GitHub trending page.
///
/// Fields that are missing in the markup are left absent for the quality gate
/// to deal with. A growth figure that cannot be read becomes `0.0`. An empty
/// page is an error, since it means the layout no longer matches.
pub fn parse_trending_html(html: &str, scraped_at: DateTime<Utc>) -> Result<Vec<RawRecord>> {
    let selectors = RowSelectors::new()?;
    let document = Html::parse_document(html);

    let mut records = Vec::new();
    for row in document.select(&selectors.row) {
        let link = row.select(&selectors.title_link).next();
        let href = link
            .and_then(|a| a.value().attr("href"))
            .map(|h| h.trim().trim_matches('/').to_string());

        // Prefer the href; fall back to the visible "owner / repo" text
        let name = match &href {
            Some(h) if !h.is_empty() => h.clone(),
            _ => link.map(element_text).unwrap_or_default().replace(' ', ""),
        };
        let url = href
            .filter(|h| !h.is_empty())
            .map(|h| format!("{}/{}", GITHUB_BASE_URL, h))
            .unwrap_or_default();

        let trending_metric = optional_text(row, &selectors.period_stars)
            .and_then(|t| coerce_count(&t).ok())
            .map(|n| n as f64)
            .unwrap_or(0.0);

        let record = RawRecord {
            name,
            url,
            description: optional_text(row, &selectors.description),
            language: optional_text(row, &selectors.language),
            stars_raw: optional_text(row, &selectors.stars),
            forks_raw: optional_text(row, &selectors.forks),
            trending_metric,
            scraped_at,
        };
        debug!(name = %record.name, stars = ?record.stars_raw, "Parsed trending row");
        records.push(record);
    }

    if records.is_empty() {
        return Err(PipelineError::Fetch {
            message: "no trending rows found in document; page layout may have changed".to_string(),
        });
    }
    Ok(records)
}

/// Fetches and parses the live trending page.
pub struct HttpTrendingSource {
    url: String,
    http: Box<dyn HttpClientPort>,
}

impl HttpTrendingSource {
    pub fn new(url: impl Into<String>, http: Box<dyn HttpClientPort>) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }
}

#[async_trait]
impl SourcePort for HttpTrendingSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let response = self.http.get(&self.url).await?;
        if !(200..300).contains(&response.status) {
            warn!(status = response.status, "Trending page returned an error status");
            return Err(PipelineError::Fetch {
                message: format!("{} returned HTTP {}", self.url, response.status),
            });
        }
        if !response.content_type.contains("html") {
            debug!(content_type = %response.content_type, "Unexpected content type; parsing anyway");
        }

        let records = parse_trending_html(&response.body, Utc::now())?;
        info!("Found {} trending repositories", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use chrono::TimeZone;

    const PAGE: &str = r#"
    <html><body>
    <article class="Box-row">
      <h2 class="h3 lh-condensed">
        <a href="/tokio-rs/tokio"><span class="text-normal">tokio-rs /</span> tokio</a>
      </h2>
      <p class="col-9 color-fg-muted my-1 pr-4">
        A runtime for writing reliable asynchronous applications
      </p>
      <div class="f6 color-fg-muted mt-2">
        <span class="d-inline-block ml-0 mr-3">
          <span itemprop="programmingLanguage">Rust</span>
        </span>
        <a class="Link Link--muted d-inline-block mr-3" href="/tokio-rs/tokio/stargazers"> 27,012 </a>
        <a class="Link Link--muted d-inline-block mr-3" href="/tokio-rs/tokio/forks"> 2,489 </a>
        <span class="d-inline-block float-sm-right"> 1,021 stars today </span>
      </div>
    </article>
    <article class="Box-row">
      <h2 class="h3 lh-condensed"><a href="/someone/dotfiles">someone / dotfiles</a></h2>
      <div class="f6 color-fg-muted mt-2">
        <a class="Link Link--muted d-inline-block mr-3" href="/someone/dotfiles/stargazers"> 500 </a>
      </div>
    </article>
    </body></html>
    "#;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_parses_complete_row() {
        let records = parse_trending_html(PAGE, at()).unwrap();
        assert_eq!(records.len(), 2);

        let tokio = &records[0];
        assert_eq!(tokio.name, "tokio-rs/tokio");
        assert_eq!(tokio.url, "https://github.com/tokio-rs/tokio");
        assert_eq!(
            tokio.description.as_deref(),
            Some("A runtime for writing reliable asynchronous applications")
        );
        assert_eq!(tokio.language.as_deref(), Some("Rust"));
        assert_eq!(tokio.stars_raw.as_deref(), Some("27,012"));
        assert_eq!(tokio.forks_raw.as_deref(), Some("2,489"));
        assert_eq!(tokio.trending_metric, 1021.0);
        assert_eq!(tokio.scraped_at, at());
    }

    #[test]
    fn test_sparse_row_leaves_fields_absent() {
        let records = parse_trending_html(PAGE, at()).unwrap();
        let sparse = &records[1];
        assert_eq!(sparse.name, "someone/dotfiles");
        assert_eq!(sparse.description, None);
        assert_eq!(sparse.language, None);
        assert_eq!(sparse.forks_raw, None);
        assert_eq!(sparse.stars_raw.as_deref(), Some("500"));
        assert_eq!(sparse.trending_metric, 0.0);
    }

    #[test]
    fn test_empty_page_is_fetch_error() {
        let err = parse_trending_html("<html><body>nothing</body></html>", at()).unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }

    struct FakeHttp {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClientPort for FakeHttp {
        async fn get(&self, _url: &str) -> Result<HttpGetResult> {
            Ok(HttpGetResult {
                status: self.status,
                body: self.body.to_string(),
                content_type: "text/html; charset=utf-8".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_http_source_parses_body() {
        let source = HttpTrendingSource::new(
            "https://github.com/trending",
            Box::new(FakeHttp { status: 200, body: PAGE }),
        );
        let records = source.fetch().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_http_source_rejects_error_status() {
        let source = HttpTrendingSource::new(
            "https://github.com/trending",
            Box::new(FakeHttp { status: 503, body: PAGE }),
        );
        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }
}
