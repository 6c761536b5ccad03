//! Search request and response data models

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Type of search to perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Web,
    News,
    Images,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::News => write!(f, "news"),
            Self::Images => write!(f, "images"),
        }
    }
}

impl FromStr for SearchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "news" => Ok(Self::News),
            "images" => Ok(Self::Images),
            other => Err(Error::invalid_request(format!(
                "search_type must be one of: web, news, images (got '{}')",
                other
            ))),
        }
    }
}

/// Safe search filtering level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    #[default]
    Moderate,
    Strict,
    Off,
}

impl fmt::Display for SafeSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moderate => write!(f, "moderate"),
            Self::Strict => write!(f, "strict"),
            Self::Off => write!(f, "off"),
        }
    }
}

impl FromStr for SafeSearch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moderate" => Ok(Self::Moderate),
            "strict" => Ok(Self::Strict),
            "off" => Ok(Self::Off),
            other => Err(Error::invalid_request(format!(
                "safe_search must be one of: moderate, strict, off (got '{}')",
                other
            ))),
        }
    }
}

/// Complete search request with all parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The search query string
    pub query: String,
    /// Number of results to return (1-20)
    pub num_results: u32,
    /// Domains to restrict results to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    /// Domains to exclude from results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<Vec<String>>,
    /// Type of search
    pub search_type: SearchType,
    /// Language code in ISO 639-1 format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Region code in ISO 3166-1 format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Safe search level
    pub safe_search: SafeSearch,
}

impl SearchRequest {
    /// Create a request for a query with default parameters
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: 10,
            include_domains: None,
            exclude_domains: None,
            search_type: SearchType::Web,
            language: None,
            region: None,
            safe_search: SafeSearch::Moderate,
        }
    }

    /// Set the number of results to return
    pub fn with_num_results(mut self, num_results: u32) -> Self {
        self.num_results = num_results;
        self
    }

    /// Restrict results to the given domains
    pub fn with_include_domains(mut self, domains: Vec<String>) -> Self {
        self.include_domains = Some(domains);
        self
    }

    /// Exclude the given domains from results
    pub fn with_exclude_domains(mut self, domains: Vec<String>) -> Self {
        self.exclude_domains = Some(domains);
        self
    }

    /// Set the search type
    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    /// Set the language code
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the region code
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the safe search level
    pub fn with_safe_search(mut self, level: SafeSearch) -> Self {
        self.safe_search = level;
        self
    }

    /// Validate the request against recognized bounds.
    ///
    /// Violations are caller-fixable and never reach the network.
    pub fn validate(&self) -> Result<(), Error> {
        if self.query.trim().is_empty() {
            return Err(Error::invalid_request("query cannot be empty"));
        }
        if self.num_results < 1 || self.num_results > 20 {
            return Err(Error::invalid_request(format!(
                "num_results must be between 1 and 20 (got {})",
                self.num_results
            )));
        }
        if let Some(ref language) = self.language {
            if language.len() != 2 {
                return Err(Error::invalid_request(
                    "language code must be in ISO 639-1 format (2 characters)",
                ));
            }
        }
        if let Some(ref region) = self.region {
            if region.len() != 2 {
                return Err(Error::invalid_request(
                    "region code must be in ISO 3166-1 format (2 characters)",
                ));
            }
        }
        Ok(())
    }
}

/// An individual search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Title of the result
    pub title: String,
    /// URL of the result
    pub url: String,
    /// Snippet or description
    pub snippet: String,
    /// Position within the result list (1-indexed)
    pub position: u32,
    /// Domain the result came from
    pub domain: String,
    /// Publication date (news results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// Thumbnail image URL (image results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Complete response for one search call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The original query
    pub query: String,
    /// Type of search performed
    pub search_type: SearchType,
    /// Total results available upstream
    pub total_results: u64,
    /// The returned results
    pub results: Vec<SearchResult>,
    /// Upstream search time in seconds
    pub search_time: f64,
    /// Whether more results are available
    pub has_more: bool,
    /// Token for the next page of results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Raw result entry as returned by the API, before transformation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Raw wire payload as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub results: Vec<ApiResult>,
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub search_time: f64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl ApiResponse {
    /// Transform the raw payload into a `SearchResponse` for the request
    /// that produced it, filling in fields the API omits.
    pub fn into_response(self, request: &SearchRequest) -> SearchResponse {
        let result_count = self.results.len() as u64;

        let results = self
            .results
            .into_iter()
            .map(|raw| {
                let domain = raw
                    .domain
                    .filter(|d| !d.is_empty())
                    .or_else(|| host_of(&raw.url))
                    .unwrap_or_default();

                SearchResult {
                    title: raw.title,
                    url: raw.url,
                    snippet: raw.snippet,
                    position: raw.position,
                    domain,
                    published_date: raw.published_date,
                    thumbnail_url: raw.thumbnail_url,
                }
            })
            .collect();

        SearchResponse {
            query: request.query.clone(),
            search_type: request.search_type,
            total_results: self.total_results.unwrap_or(result_count),
            results,
            search_time: self.search_time,
            has_more: self.has_more,
            next_page_token: self.next_page_token,
        }
    }
}

/// Extract the hostname from a result URL
fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}
