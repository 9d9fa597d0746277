//! Site-wide language catalog.
//!
//! The catalog page lists every language talks are translated into, with the
//! number of talks available in each.

use crate::error::{CrawlError, Result};
use crate::extract::Extractor;
use crate::fetch::Fetch;
use crate::models::LanguageInfo;
use tracing::{info, instrument};
use url::Url;

/// Fetch the catalog page and list its languages in page order.
#[instrument(level = "info", skip(fetcher, extractor))]
pub async fn fetch_languages<F: Fetch>(
    fetcher: &F,
    extractor: &Extractor,
    catalog_url: &str,
) -> Result<Vec<LanguageInfo>> {
    let base = Url::parse(catalog_url)
        .map_err(|e| CrawlError::Config(format!("bad URL {catalog_url}: {e}")))?;
    let doc = fetcher.fetch(catalog_url).await?;
    let languages = extractor.catalog(&doc, &base);
    info!(count = languages.len(), "Indexed language catalog");
    Ok(languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlConfig, SelectorTable};
    use crate::fetch::HttpFetcher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_languages_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/participate/translate/our-languages"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="languages__list">
  <div class="languages__list__language"><a href="/talks?language=ar">Arabic</a> 2,781 talks</div>
  <div class="languages__list__language"><a href="/talks?language=ja">Japanese</a> 3,412 talks</div>
</div>"#,
            ))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&CrawlConfig::default()).unwrap();
        let extractor = Extractor::new(&SelectorTable::default()).unwrap();
        let url = format!("{}/participate/translate/our-languages", server.uri());
        let languages = fetch_languages(&fetcher, &extractor, &url).await.unwrap();

        let codes: Vec<&str> = languages.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["ar", "ja"]);
        assert_eq!(languages[0].talk_count, Some(2781));
    }
}
