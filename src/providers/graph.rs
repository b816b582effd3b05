//! Microsoft Graph helpers shared by Outlook and Teams

use super::{RunContext, build_url};
use crate::error::Result;
use crate::pagination::{Page, PageBatch, paginate};
use futures::Stream;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub(super) const V1: &str = "v1.0";
pub(super) const BETA: &str = "beta";

/// A Graph collection page
#[derive(Debug, Deserialize)]
pub(super) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Me {
    user_principal_name: String,
}

/// Object with only an id (`$select=id`)
#[derive(Debug, Deserialize)]
pub(super) struct IdOnly {
    pub id: String,
}

/// URL of a Graph resource with optional `$select` and `$top`
pub(super) fn resource_url(
    ctx: &RunContext,
    version: &str,
    path: &str,
    select: &[&str],
) -> Result<String> {
    let mut query = Vec::new();
    if !select.is_empty() {
        query.push(("$select", select.join(",")));
    }
    if let Some(top) = ctx.config.fetch.graph_page_size {
        query.push(("$top", top.to_string()));
    }
    build_url(
        &ctx.config.endpoints.graph_api,
        &format!("{}/{}", version, path),
        &query,
    )
}

/// Address of the signed-in user
pub(super) async fn whoami(ctx: &RunContext) -> Result<String> {
    let url = build_url(
        &ctx.config.endpoints.graph_api,
        &format!("{}/me", V1),
        &[("$select", "userPrincipalName".to_string())],
    )?;
    let me: Me = ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await?;
    Ok(me.user_principal_name)
}

/// Lazily page a collection, following `@odata.nextLink`
pub(super) fn pages<'a, T>(
    ctx: &'a RunContext,
    first: String,
) -> impl Stream<Item = Result<PageBatch<T>>> + Send + 'a
where
    T: DeserializeOwned + Send + 'a,
{
    paginate(first, ctx.cancel.clone(), move |url| fetch_page(ctx, url))
}

async fn fetch_page<T>(ctx: &RunContext, url: String) -> Result<Page<T, String>>
where
    T: DeserializeOwned,
{
    let collection: Collection<T> = ctx.api.get_json(&url, ctx.token(), &ctx.cancel).await?;
    let next = collection.next_link.filter(|link| !link.is_empty());
    Ok(Page::new(collection.value, next))
}
