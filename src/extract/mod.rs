use std::time::Duration;

use anyhow::Context as _;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use scraper::Html;
use url::Url;

use crate::error::{ExtractError, FailureKind};
use crate::formats::{RecipeImage, RecipeRecord};

mod html;
mod json_ld;
mod normalize;

pub const UNTITLED_RECIPE: &str = "Untitled Recipe";

const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Turns one recipe URL into a [`RecipeRecord`].
///
/// Implementations hide every site variant behind this call; the retry loop only
/// looks at the returned error's kind.
pub trait Extract {
    fn extract(&self, url: &str) -> Result<RecipeRecord, ExtractError>;
}

/// Recipe fields as found on the page, before validation.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ParsedRecipe {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) ingredients: Vec<String>,
    pub(crate) instructions: Vec<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) prep_time: Option<String>,
    pub(crate) cook_time: Option<String>,
    pub(crate) total_time: Option<String>,
    pub(crate) servings: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub fetch_images: bool,
    pub max_image_bytes: usize,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            fetch_images: true,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Blocking HTTP extractor: JSON-LD first, HTML selectors second.
pub struct RecipeExtractor {
    client: reqwest::blocking::Client,
    options: ExtractorOptions,
}

impl RecipeExtractor {
    pub fn new(options: ExtractorOptions) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(PAGE_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(options.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("build recipe http client")?;

        Ok(Self { client, options })
    }

    fn fetch_page(&self, url: &Url) -> Result<(String, Url), ExtractError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| transport_error(&err))?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if let Some(err) = status_error(response.status(), retry_after.as_deref()) {
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        if !is_html_content_type(content_type) {
            return Err(ExtractError::unsupported(format!(
                "not an html page (content-type {})",
                content_type.unwrap_or_default()
            )));
        }

        let final_url = response.url().clone();
        let body = response.text().map_err(|err| transport_error(&err))?;
        Ok((body, final_url))
    }

    fn fetch_image(&self, image_url: &str) -> anyhow::Result<RecipeImage> {
        let response = self
            .client
            .get(image_url)
            .header(ACCEPT, "image/*")
            .send()
            .with_context(|| format!("GET {image_url}"))?
            .error_for_status()
            .with_context(|| format!("GET {image_url}"))?;

        if let Some(len) = response.content_length()
            && len > self.options.max_image_bytes as u64
        {
            anyhow::bail!("image too large: {len} bytes");
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .with_context(|| format!("read image body {image_url}"))?
            .to_vec();
        if bytes.is_empty() {
            anyhow::bail!("empty image body");
        }
        if bytes.len() > self.options.max_image_bytes {
            anyhow::bail!("image too large: {} bytes", bytes.len());
        }

        let mut image = RecipeImage {
            media_type: header_type.unwrap_or_default(),
            bytes,
        };
        if image.extension().is_none() {
            let Some(sniffed) = RecipeImage::sniff_media_type(&image.bytes) else {
                anyhow::bail!("unrecognized image type {:?}", image.media_type);
            };
            image.media_type = sniffed.to_owned();
        }
        Ok(image)
    }
}

impl Extract for RecipeExtractor {
    fn extract(&self, url: &str) -> Result<RecipeRecord, ExtractError> {
        let target = validate_url(url)?;
        let (body, page_url) = self.fetch_page(&target)?;
        let parsed = parse_page(&body, &page_url)?;
        let mut record = normalize(parsed, url.trim(), &page_url)?;

        if self.options.fetch_images
            && let Some(image_url) = record.image_url.as_deref()
        {
            match self.fetch_image(image_url) {
                Ok(image) => record.image = Some(image),
                Err(err) => {
                    tracing::warn!(
                        url = %target,
                        image_url,
                        kind = %FailureKind::ImageFetchFailed,
                        "continuing without image: {err:#}"
                    );
                    record.image_error = Some(format!("{err:#}"));
                }
            }
        }

        tracing::debug!(
            url = %target,
            title = %record.title,
            ingredients = record.ingredients.len(),
            instructions = record.instructions.len(),
            "extracted recipe"
        );
        Ok(record)
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, ExtractError> {
    let malformed = |reason: &str| ExtractError::MalformedUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty url"));
    }
    let url = Url::parse(trimmed).map_err(|err| malformed(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(malformed("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(malformed("missing host"));
    }
    Ok(url)
}

/// Find recipe data in a fetched page: structured data first, selectors second.
pub(crate) fn parse_page(body: &str, page_url: &Url) -> Result<ParsedRecipe, ExtractError> {
    let document = Html::parse_document(body);

    let Some(mut recipe) = json_ld::find_recipe(&document) else {
        return html::find_recipe(&document, page_url)
            .ok_or_else(|| ExtractError::unsupported("no recipe data found on page"));
    };

    if (recipe.title.is_none() || recipe.ingredients.is_empty() || recipe.instructions.is_empty())
        && let Some(fallback) = html::find_recipe(&document, page_url)
    {
        tracing::debug!(url = %page_url, "filling gaps in structured data from page markup");
        recipe.title = recipe.title.or(fallback.title);
        if recipe.ingredients.is_empty() {
            recipe.ingredients = fallback.ingredients;
        }
        if recipe.instructions.is_empty() {
            recipe.instructions = fallback.instructions;
        }
        recipe.image_url = recipe.image_url.or(fallback.image_url);
    }
    Ok(recipe)
}

/// Validate parsed fields and build the immutable record.
pub(crate) fn normalize(
    parsed: ParsedRecipe,
    source_url: &str,
    page_url: &Url,
) -> Result<RecipeRecord, ExtractError> {
    if parsed.instructions.is_empty() {
        return Err(ExtractError::Incomplete {
            reason: "no instructions found".to_owned(),
        });
    }

    let title = parsed
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED_RECIPE.to_owned());
    let image_url = parsed
        .image_url
        .and_then(|raw| page_url.join(raw.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from);

    Ok(RecipeRecord {
        title,
        ingredients: parsed.ingredients,
        instructions: parsed.instructions,
        image_url,
        source_url: source_url.to_owned(),
        description: parsed.description.filter(|d| !d.is_empty()),
        prep_time: parsed.prep_time,
        cook_time: parsed.cook_time,
        total_time: parsed.total_time,
        servings: parsed.servings,
        image: None,
        image_error: None,
    })
}

fn transport_error(err: &reqwest::Error) -> ExtractError {
    let reason = if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    ExtractError::network(reason)
}

/// Map a non-success HTTP status onto the failure taxonomy.
fn status_error(status: StatusCode, retry_after: Option<&str>) -> Option<ExtractError> {
    if status.is_success() {
        return None;
    }
    let err = match status {
        StatusCode::TOO_MANY_REQUESTS => ExtractError::RateLimited {
            retry_after: retry_after.and_then(parse_retry_after),
        },
        StatusCode::FORBIDDEN => ExtractError::unsupported("site refused access (HTTP 403)"),
        StatusCode::REQUEST_TIMEOUT => ExtractError::network("HTTP 408 request timeout"),
        s if s.is_server_error() => ExtractError::network(format!("HTTP {}", s.as_u16())),
        s => ExtractError::HttpStatus { status: s.as_u16() },
    };
    Some(err)
}

/// `Retry-After` as delta-seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// A missing content type is given the benefit of the doubt.
fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let content_type = content_type.trim().to_ascii_lowercase();
    content_type.is_empty()
        || content_type.starts_with("text/html")
        || content_type.starts_with("application/xhtml+xml")
}
