//! Read-only resource surface.
//!
//! Two URI schemes: `cookie-session://<profile>` serves live cookie profiles
//! through the TTL cache, `prompt://<guide>?format=json|yaml|markdown`
//! serves guidance documents.

use std::sync::Arc;

use rmcp::ErrorData;
use rmcp::model::{AnnotateAble, RawResource, Resource, ResourceContents};
use serde_json::json;

use stg_domain::error::Error;
use stg_domain::ports::CookieProfileSource;
use stg_infrastructure::prompts::{PromptFormat, PromptLibrary};

pub const COOKIE_SCHEME: &str = "cookie-session://";
pub const PROMPT_SCHEME: &str = "prompt://";

/// Profile names are restricted to `[A-Za-z0-9_-]+`.
#[must_use]
pub fn valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn resource(uri: String, name: String, description: Option<String>) -> Resource {
    let mut raw = RawResource::new(uri, name);
    raw.description = description;
    raw.mime_type = Some("application/json".to_owned());
    raw.no_annotation()
}

/// Both schemes' declared contents.
pub async fn list(
    cookie_profiles: Option<&Arc<dyn CookieProfileSource>>,
    prompts: &PromptLibrary,
) -> Result<Vec<Resource>, ErrorData> {
    let mut resources = Vec::new();

    if let Some(source) = cookie_profiles {
        let infos = source
            .list()
            .await
            .map_err(|e| ErrorData::internal_error(format!("profile listing failed: {e}"), None))?;
        for info in infos {
            resources.push(resource(
                format!("{COOKIE_SCHEME}{}", info.name),
                format!("Cookie profile: {}", info.name),
                info.description,
            ));
        }
    }

    for name in prompts.list() {
        let mut raw = RawResource::new(format!("{PROMPT_SCHEME}{name}"), format!("Guide: {name}"));
        raw.mime_type = Some("text/markdown".to_owned());
        resources.push(raw.no_annotation());
    }

    Ok(resources)
}

/// Resolve one resource URI to its contents.
pub async fn read(
    cookie_profiles: Option<&Arc<dyn CookieProfileSource>>,
    prompts: &PromptLibrary,
    uri: &str,
) -> Result<ResourceContents, ErrorData> {
    if let Some(name) = uri.strip_prefix(COOKIE_SCHEME) {
        return read_cookie_profile(cookie_profiles, name, uri).await;
    }
    if let Some(rest) = uri.strip_prefix(PROMPT_SCHEME) {
        return read_prompt(prompts, rest, uri);
    }
    Err(ErrorData::resource_not_found(
        format!("unknown resource scheme in '{uri}'"),
        None,
    ))
}

async fn read_cookie_profile(
    cookie_profiles: Option<&Arc<dyn CookieProfileSource>>,
    name: &str,
    uri: &str,
) -> Result<ResourceContents, ErrorData> {
    if !valid_profile_name(name) {
        return Err(ErrorData::invalid_params(
            format!("invalid profile name '{name}'"),
            None,
        ));
    }
    let source = cookie_profiles.ok_or_else(|| {
        ErrorData::resource_not_found("no cookie profile source configured".to_owned(), None)
    })?;

    let profile = source.get(name).await.map_err(|e| match &e {
        Error::NotFound { .. } => ErrorData::resource_not_found(e.to_string(), None),
        _ => ErrorData::internal_error(
            format!("profile load failed ({}): {e}", e.kind()),
            None,
        ),
    })?;

    let payload = json!({
        "cookies": profile.cookies,
        "last_updated": profile.last_updated,
        "metadata": profile.metadata,
    });
    Ok(ResourceContents::text(payload.to_string(), uri))
}

fn read_prompt(
    prompts: &PromptLibrary,
    rest: &str,
    uri: &str,
) -> Result<ResourceContents, ErrorData> {
    let (name, format) = match rest.split_once('?') {
        None => (rest, PromptFormat::Markdown),
        Some((name, query)) => {
            let format = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("format="))
                .map_or(Ok(PromptFormat::Markdown), str::parse)
                .map_err(|e| ErrorData::invalid_params(e, None))?;
            (name, format)
        }
    };

    let content = prompts.get(name, format).map_err(|e| match &e {
        Error::NotFound { .. } => ErrorData::resource_not_found(e.to_string(), None),
        _ => ErrorData::internal_error(e.to_string(), None),
    })?;
    Ok(ResourceContents::text(content, uri))
}
