use crate::models::{
    Campaign, CreateCampaignRequest, CreateDomainRequest, CreateLinkRequest, Domain, Link,
    NewVisit, Template, TrafficParameter, UpdateCampaignRequest, UpdateDomainRequest, VisitEvent,
};
use crate::slug::{generate_unique_hash, is_valid_slug};
use crate::storage::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Attempts at generating a free slug before giving up
const MAX_SLUG_ATTEMPTS: usize = 10;

const DEFAULT_OWNER: &str = "system";

/// Monotonic id source for one table (`d1`, `d2`, ...)
struct IdSequence {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdSequence {
    const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Keep generated ids clear of an id inserted verbatim
    fn observe(&self, id: &str) {
        if let Some(n) = id
            .strip_prefix(self.prefix)
            .and_then(|rest| rest.parse::<u64>().ok())
        {
            self.next.fetch_max(n + 1, Ordering::Relaxed);
        }
    }
}

/// Sort by the numeric part of sequence ids so `c10` follows `c9`
fn sort_by_id<T>(items: &mut [T], id: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        let (a, b) = (id(a), id(b));
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    });
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// In-memory repository backed by concurrent maps
pub struct MemoryStorage {
    domains: DashMap<String, Domain>,
    templates: DashMap<String, Template>,
    campaigns: DashMap<String, Campaign>,
    links: DashMap<String, Link>,
    /// slug -> link id
    slugs: DashMap<String, String>,
    /// link id -> visits in arrival order
    visits: DashMap<String, Vec<VisitEvent>>,
    domain_ids: IdSequence,
    campaign_ids: IdSequence,
    link_ids: IdSequence,
    visit_ids: IdSequence,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            domains: DashMap::new(),
            templates: DashMap::new(),
            campaigns: DashMap::new(),
            links: DashMap::new(),
            slugs: DashMap::new(),
            visits: DashMap::new(),
            domain_ids: IdSequence::new("d"),
            campaign_ids: IdSequence::new("c"),
            link_ids: IdSequence::new("l"),
            visit_ids: IdSequence::new("v"),
        }
    }

    fn clear_default_except(&self, keep: &str) {
        for mut domain in self.domains.iter_mut() {
            if domain.id != keep {
                domain.is_default = false;
            }
        }
    }

    /// Claim `slug` for `link_id`, failing if another link holds it
    fn claim_slug(&self, slug: &str, link_id: &str) -> StorageResult<()> {
        match self.slugs.entry(slug.to_string()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(entry) => {
                entry.insert(link_id.to_string());
                Ok(())
            }
        }
    }

    /// Insert a domain with a fixed id (demo seed)
    pub fn insert_domain(&self, domain: Domain) {
        self.domain_ids.observe(&domain.id);
        if domain.is_default {
            self.clear_default_except(&domain.id);
        }
        self.domains.insert(domain.id.clone(), domain);
    }

    /// Insert a campaign with a fixed id and creation time (demo seed)
    pub fn insert_campaign(&self, campaign: Campaign) {
        self.campaign_ids.observe(&campaign.id);
        self.campaigns.insert(campaign.id.clone(), campaign);
    }

    /// Insert a link with a fixed id and slug (demo seed)
    pub fn insert_link(&self, link: Link) -> StorageResult<()> {
        self.claim_slug(&link.slug, &link.id)?;
        self.link_ids.observe(&link.id);
        self.links.insert(link.id.clone(), link);
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_domain(&self, request: CreateDomainRequest) -> StorageResult<Domain> {
        if request.host.trim().is_empty() {
            return Err(StorageError::Invalid("domain host cannot be empty".to_string()));
        }

        let domain = Domain {
            id: self.domain_ids.next_id(),
            host: request.host,
            verified: request.verified,
            is_global: request.is_global,
            is_default: request.is_default,
            user_id: request.user_id,
        };

        if domain.is_default {
            self.clear_default_except(&domain.id);
        }
        self.domains.insert(domain.id.clone(), domain.clone());

        tracing::debug!(domain_id = %domain.id, host = %domain.host, "created domain");
        Ok(domain)
    }

    async fn get_domain(&self, id: &str) -> StorageResult<Option<Domain>> {
        Ok(self.domains.get(id).map(|d| d.value().clone()))
    }

    async fn list_domains(&self) -> StorageResult<Vec<Domain>> {
        let mut domains: Vec<Domain> = self.domains.iter().map(|d| d.value().clone()).collect();
        sort_by_id(&mut domains, |d| &d.id);
        Ok(domains)
    }

    async fn update_domain(
        &self,
        id: &str,
        request: UpdateDomainRequest,
    ) -> StorageResult<Option<Domain>> {
        if !self.domains.contains_key(id) {
            return Ok(None);
        }

        if request.is_default == Some(true) {
            self.clear_default_except(id);
        }

        let Some(mut domain) = self.domains.get_mut(id) else {
            return Ok(None);
        };
        if let Some(host) = request.host {
            domain.host = host;
        }
        if let Some(verified) = request.verified {
            domain.verified = verified;
        }
        if let Some(is_global) = request.is_global {
            domain.is_global = is_global;
        }
        if let Some(is_default) = request.is_default {
            domain.is_default = is_default;
        }

        Ok(Some(domain.clone()))
    }

    async fn delete_domain(&self, id: &str) -> StorageResult<bool> {
        let Some((_, removed)) = self.domains.remove(id) else {
            return Ok(false);
        };

        if removed.is_default {
            let successor = self
                .global_domains()
                .await?
                .into_iter()
                .next()
                .map(|d| d.id);
            if let Some(successor) = successor {
                if let Some(mut domain) = self.domains.get_mut(&successor) {
                    domain.is_default = true;
                }
                tracing::info!(removed = %id, default = %successor, "default domain reassigned");
            }
        }

        Ok(true)
    }

    async fn insert_template(&self, template: Template) -> StorageResult<()> {
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn get_template(&self, id: &str) -> StorageResult<Option<Template>> {
        Ok(self.templates.get(id).map(|t| t.value().clone()))
    }

    async fn list_templates(&self) -> StorageResult<Vec<Template>> {
        let mut templates: Vec<Template> =
            self.templates.iter().map(|t| t.value().clone()).collect();
        sort_by_id(&mut templates, |t| &t.id);
        Ok(templates)
    }

    async fn create_campaign(&self, request: CreateCampaignRequest) -> StorageResult<Campaign> {
        if request.name.trim().is_empty() {
            return Err(StorageError::Invalid("campaign name cannot be empty".to_string()));
        }
        if !self.domains.contains_key(&request.domain_id) {
            return Err(StorageError::NotFound("domain", request.domain_id));
        }
        if let Some(template_id) = &request.template_id {
            if !self.templates.contains_key(template_id) {
                return Err(StorageError::NotFound("template", template_id.clone()));
            }
        }

        let campaign = Campaign {
            id: self.campaign_ids.next_id(),
            name: request.name,
            domain_id: request.domain_id,
            template_id: request.template_id,
            status: request.status,
            created_at: now_millis(),
            user_id: request
                .user_id
                .unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            traffic_source: request.traffic_source,
            traffic_parameters: request.traffic_parameters,
            destination_url: request.destination_url,
            block_vpn: request.block_vpn,
            block_abnormal_traffic: request.block_abnormal_traffic,
            frequency_capping: request.frequency_capping,
            repeat_visitor_url: request.repeat_visitor_url,
        };
        self.campaigns.insert(campaign.id.clone(), campaign.clone());

        tracing::debug!(campaign_id = %campaign.id, name = %campaign.name, "created campaign");
        Ok(campaign)
    }

    async fn get_campaign(&self, id: &str) -> StorageResult<Option<Campaign>> {
        Ok(self.campaigns.get(id).map(|c| c.value().clone()))
    }

    async fn list_campaigns(&self) -> StorageResult<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|c| c.value().clone()).collect();
        sort_by_id(&mut campaigns, |c| &c.id);
        Ok(campaigns)
    }

    async fn update_campaign(
        &self,
        id: &str,
        request: UpdateCampaignRequest,
    ) -> StorageResult<Option<Campaign>> {
        if let Some(domain_id) = &request.domain_id {
            if !self.domains.contains_key(domain_id) {
                return Err(StorageError::NotFound("domain", domain_id.clone()));
            }
        }

        Ok(self.campaigns.get_mut(id).map(|mut campaign| {
            campaign.apply(request);
            campaign.clone()
        }))
    }

    async fn update_traffic_parameters(
        &self,
        campaign_id: &str,
        parameters: Vec<TrafficParameter>,
    ) -> StorageResult<bool> {
        match self.campaigns.get_mut(campaign_id) {
            Some(mut campaign) => campaign.traffic_parameters = parameters.clone(),
            None => return Ok(false),
        }

        for mut link in self.links.iter_mut() {
            if link.campaign_id == campaign_id {
                link.traffic_parameters = parameters.clone();
            }
        }

        Ok(true)
    }

    async fn create_link(
        &self,
        campaign_id: &str,
        request: CreateLinkRequest,
    ) -> StorageResult<Link> {
        let traffic_parameters = match self.campaigns.get(campaign_id) {
            Some(campaign) => campaign.traffic_parameters.clone(),
            None => return Err(StorageError::NotFound("campaign", campaign_id.to_string())),
        };

        let id = self.link_ids.next_id();
        let slug = match request.slug {
            Some(custom) => {
                if !is_valid_slug(&custom) {
                    return Err(StorageError::Invalid(
                        "slug must be 1-64 characters of letters, digits, '-' or '_'"
                            .to_string(),
                    ));
                }
                self.claim_slug(&custom, &id)?;
                custom
            }
            None => {
                let mut claimed = None;
                for _ in 0..MAX_SLUG_ATTEMPTS {
                    let candidate = generate_unique_hash();
                    if self.claim_slug(&candidate, &id).is_ok() {
                        claimed = Some(candidate);
                        break;
                    }
                }
                claimed.ok_or(StorageError::Conflict)?
            }
        };

        let link = Link {
            id,
            campaign_id: campaign_id.to_string(),
            slug,
            params: request.params,
            traffic_parameters,
        };
        self.links.insert(link.id.clone(), link.clone());

        tracing::debug!(link_id = %link.id, slug = %link.slug, "created link");
        Ok(link)
    }

    async fn get_link(&self, id: &str) -> StorageResult<Option<Link>> {
        Ok(self.links.get(id).map(|l| l.value().clone()))
    }

    async fn get_link_by_slug(&self, slug: &str) -> StorageResult<Option<Link>> {
        let Some(link_id) = self.slugs.get(slug).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        self.get_link(&link_id).await
    }

    async fn list_links(&self, campaign_id: Option<&str>) -> StorageResult<Vec<Link>> {
        let mut links: Vec<Link> = self
            .links
            .iter()
            .filter(|l| campaign_id.is_none_or(|id| l.campaign_id == id))
            .map(|l| l.value().clone())
            .collect();
        sort_by_id(&mut links, |l| &l.id);
        Ok(links)
    }

    async fn record_visit(&self, visit: NewVisit) -> StorageResult<VisitEvent> {
        if !self.links.contains_key(&visit.link_id) {
            return Err(StorageError::NotFound("link", visit.link_id));
        }

        let event = visit.into_event(self.visit_ids.next_id(), now_millis());
        self.visits
            .entry(event.link_id.clone())
            .or_default()
            .push(event.clone());

        Ok(event)
    }

    async fn get_visits(&self, link_id: Option<&str>) -> StorageResult<Vec<VisitEvent>> {
        let mut visits: Vec<VisitEvent> = match link_id {
            Some(link_id) => self
                .visits
                .get(link_id)
                .map(|v| v.value().clone())
                .unwrap_or_default(),
            None => self
                .visits
                .iter()
                .flat_map(|v| v.value().clone())
                .collect(),
        };
        visits.sort_by(|a, b| {
            a.ts.cmp(&b.ts)
                .then_with(|| a.id.len().cmp(&b.id.len()))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(visits)
    }
}
