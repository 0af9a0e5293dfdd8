use crate::models::{
    Campaign, CreateCampaignRequest, CreateDomainRequest, CreateLinkRequest, Domain, Link,
    NewVisit, Template, TrafficParameter, UpdateCampaignRequest, UpdateDomainRequest, VisitEvent,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} '{1}' not found")]
    NotFound(&'static str, String),
    #[error("slug already exists")]
    Conflict,
    #[error("{0}")]
    Invalid(String),
    #[error("storage backend error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Repository for the campaign dashboard.
///
/// Readers always receive owned snapshots; nothing handed out aliases the
/// stored records.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_domain(&self, request: CreateDomainRequest) -> StorageResult<Domain>;

    async fn get_domain(&self, id: &str) -> StorageResult<Option<Domain>>;

    async fn list_domains(&self) -> StorageResult<Vec<Domain>>;

    /// Returns None if the domain does not exist. Setting `is_default` clears the
    /// flag on every other domain.
    async fn update_domain(
        &self,
        id: &str,
        request: UpdateDomainRequest,
    ) -> StorageResult<Option<Domain>>;

    /// Deleting the default domain hands the flag to another global domain
    async fn delete_domain(&self, id: &str) -> StorageResult<bool>;

    async fn default_domain(&self) -> StorageResult<Option<Domain>> {
        Ok(self.list_domains().await?.into_iter().find(|d| d.is_default))
    }

    async fn global_domains(&self) -> StorageResult<Vec<Domain>> {
        Ok(self
            .list_domains()
            .await?
            .into_iter()
            .filter(|d| d.is_global)
            .collect())
    }

    async fn insert_template(&self, template: Template) -> StorageResult<()>;

    async fn get_template(&self, id: &str) -> StorageResult<Option<Template>>;

    async fn list_templates(&self) -> StorageResult<Vec<Template>>;

    async fn create_campaign(&self, request: CreateCampaignRequest) -> StorageResult<Campaign>;

    async fn get_campaign(&self, id: &str) -> StorageResult<Option<Campaign>>;

    async fn list_campaigns(&self) -> StorageResult<Vec<Campaign>>;

    async fn update_campaign(
        &self,
        id: &str,
        request: UpdateCampaignRequest,
    ) -> StorageResult<Option<Campaign>>;

    /// Replace the campaign's traffic parameters and copy them onto every link of
    /// the campaign. Returns false if the campaign does not exist.
    async fn update_traffic_parameters(
        &self,
        campaign_id: &str,
        parameters: Vec<TrafficParameter>,
    ) -> StorageResult<bool>;

    /// Create a link under a campaign, generating a slug when none is given
    async fn create_link(
        &self,
        campaign_id: &str,
        request: CreateLinkRequest,
    ) -> StorageResult<Link>;

    async fn get_link(&self, id: &str) -> StorageResult<Option<Link>>;

    async fn get_link_by_slug(&self, slug: &str) -> StorageResult<Option<Link>>;

    async fn list_links(&self, campaign_id: Option<&str>) -> StorageResult<Vec<Link>>;

    /// Append a visit, stamping its id and timestamp
    async fn record_visit(&self, visit: NewVisit) -> StorageResult<VisitEvent>;

    /// Snapshot of recorded visits in chronological order, optionally scoped to
    /// one link
    async fn get_visits(&self, link_id: Option<&str>) -> StorageResult<Vec<VisitEvent>>;
}
