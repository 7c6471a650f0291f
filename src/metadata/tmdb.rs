//! TMDb (The Movie Database) v3 client.
//!
//! Only the three calls the encoder needs: movie search, TV search and
//! episode details. Requests are rate-limited.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;

use wm_core::config::MetadataConfig;

use super::choose::{Candidate, Chooser};
use super::{EpisodeInfo, MetadataLookup, MovieInfo, Show};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbClient {
    pub fn new(config: &MetadataConfig, api_key: impl Into<String>) -> wm_core::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| wm_core::Error::Metadata(format!("HTTP client: {e}")))?;
        let quota = Quota::per_second(NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN));
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            language: config.language.clone(),
            limiter: RateLimiter::direct(quota),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra_params: &[(&str, &str)],
    ) -> wm_core::Result<T> {
        self.limiter.until_ready().await;

        let url = format!("{}{path}", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        params.extend_from_slice(extra_params);
        tracing::debug!("TMDb GET {path} {extra_params:?}");

        let resp = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| wm_core::Error::Metadata(format!("TMDb request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(wm_core::Error::Metadata(format!("TMDb {status}: {body}")));
        }

        resp.json::<T>()
            .await
            .map_err(|e| wm_core::Error::Metadata(format!("TMDb parse error: {e}")))
    }

    pub async fn search_movie(&self, query: &str) -> wm_core::Result<Vec<SearchResult>> {
        let resp: SearchResponse = self.get("/search/movie", &[("query", query)]).await?;
        Ok(resp.results)
    }

    pub async fn search_tv(&self, query: &str) -> wm_core::Result<Vec<SearchResult>> {
        let resp: SearchResponse = self.get("/search/tv", &[("query", query)]).await?;
        Ok(resp.results)
    }

    pub async fn episode(&self, tv_id: u64, season: u32, episode: u32) -> wm_core::Result<Episode> {
        self.get(&format!("/tv/{tv_id}/season/{season}/episode/{episode}"), &[])
            .await
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: u64,
    /// Movie title or TV show name.
    #[serde(alias = "name")]
    pub title: Option<String>,
    #[serde(alias = "first_air_date")]
    pub release_date: Option<String>,
    pub overview: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    pub season_number: u32,
    pub episode_number: u32,
    pub name: Option<String>,
    pub air_date: Option<String>,
    pub overview: Option<String>,
}

// ---------------------------------------------------------------------------
// Lookup backend
// ---------------------------------------------------------------------------

/// [`MetadataLookup`] over TMDb, asking a [`Chooser`] when a search is
/// ambiguous.
pub struct TmdbLookup {
    client: TmdbClient,
    chooser: Box<dyn Chooser>,
}

impl TmdbLookup {
    pub fn new(client: TmdbClient, chooser: Box<dyn Chooser>) -> Self {
        Self { client, chooser }
    }

    fn pick(
        &self,
        query: &str,
        mut results: Vec<SearchResult>,
        kind: &'static str,
    ) -> wm_core::Result<SearchResult> {
        let index = match results.len() {
            0 => {
                return Err(wm_core::Error::Metadata(format!(
                    "no {kind} match for '{query}'; try --title"
                )))
            }
            1 => 0,
            _ => {
                let candidates: Vec<Candidate> = results
                    .iter()
                    .map(|r| Candidate {
                        id: r.id,
                        name: r.title.clone().unwrap_or_default(),
                        year: r
                            .release_date
                            .as_deref()
                            .unwrap_or_default()
                            .chars()
                            .take(4)
                            .collect(),
                        kind,
                    })
                    .collect();
                self.chooser.choose(&candidates)?
            }
        };
        Ok(results.swap_remove(index))
    }
}

#[async_trait]
impl MetadataLookup for TmdbLookup {
    async fn movie(&self, title: &str) -> wm_core::Result<MovieInfo> {
        let results = self.client.search_movie(title).await?;
        let hit = self.pick(title, results, "movie")?;
        tracing::info!(
            "movie: {} (https://www.themoviedb.org/movie/{})",
            hit.title.as_deref().unwrap_or(title),
            hit.id
        );
        Ok(MovieInfo {
            title: hit.title.unwrap_or_else(|| title.to_string()),
            release_date: hit.release_date.unwrap_or_default(),
            overview: hit.overview.unwrap_or_default(),
        })
    }

    async fn show(&self, title: &str) -> wm_core::Result<Show> {
        let results = self.client.search_tv(title).await?;
        let hit = self.pick(title, results, "tv")?;
        Ok(Show {
            id: Some(hit.id),
            name: hit.title.unwrap_or_else(|| title.to_string()),
        })
    }

    async fn episode(&self, show: &Show, season: u32, episode: u32) -> wm_core::Result<EpisodeInfo> {
        let id = show.id.ok_or_else(|| {
            wm_core::Error::Metadata(format!("show '{}' has no TMDb id", show.name))
        })?;
        let ep = self.client.episode(id, season, episode).await?;
        tracing::info!(
            "episode: https://www.themoviedb.org/tv/{id}/season/{}/episode/{}",
            ep.season_number,
            ep.episode_number
        );
        Ok(EpisodeInfo {
            season: ep.season_number,
            episode: ep.episode_number,
            name: ep.name.unwrap_or_default(),
            air_date: ep.air_date.unwrap_or_default(),
            overview: ep.overview.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FirstMatch;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(server: &MockServer) -> TmdbLookup {
        let config = MetadataConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        let client = TmdbClient::new(&config, "test-key").unwrap();
        TmdbLookup::new(client, Box::new(FirstMatch))
    }

    #[tokio::test]
    async fn show_and_episode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .and(query_param("query", "show"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_results": 1,
                "results": [{"id": 42, "name": "The Show", "first_air_date": "2019-04-01"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tv/42/season/1/episode/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "season_number": 1,
                "episode_number": 2,
                "name": "Pilot",
                "air_date": "2019-04-08",
                "overview": "Things happen."
            })))
            .mount(&server)
            .await;

        let tmdb = lookup(&server);
        let show = tmdb.show("show").await.unwrap();
        assert_eq!(show.name, "The Show");
        let ep = tmdb.episode(&show, 1, 2).await.unwrap();
        let titles = ep.titles(&show);
        assert_eq!(titles.title, "The Show - S01E02 - Pilot");
        assert_eq!(titles.summary, "Things happen.");
    }

    #[tokio::test]
    async fn ambiguous_movie_uses_chooser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_results": 2,
                "results": [
                    {"id": 949, "title": "Heat", "release_date": "1995-12-15", "overview": "LA crews."},
                    {"id": 11, "title": "Heat", "release_date": "1986-03-14", "overview": "Vegas."}
                ]
            })))
            .mount(&server)
            .await;

        let movie = lookup(&server).movie("heat").await.unwrap();
        assert_eq!(movie.title, "Heat");
        assert_eq!(movie.release_date, "1995-12-15");
        assert_eq!(movie.overview, "LA crews.");
    }

    #[tokio::test]
    async fn no_results_is_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"total_results": 0, "results": []})),
            )
            .mount(&server)
            .await;

        let err = lookup(&server).movie("zzz").await.unwrap_err();
        assert!(matches!(err, wm_core::Error::Metadata(_)));
        assert!(err.to_string().contains("zzz"));
    }

    #[tokio::test]
    async fn http_error_is_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = lookup(&server).show("show").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
