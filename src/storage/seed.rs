//! Demo dataset loaded into a fresh [`MemoryStorage`]

use crate::models::{Campaign, CampaignStatus, Domain, Link, Template, TemplateKind};
use crate::slug::slugify;
use crate::storage::{MemoryStorage, Storage, StorageResult};
use std::collections::BTreeMap;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

struct DemoCampaign {
    name: &'static str,
    domain_id: &'static str,
    template_id: &'static str,
    user_id: &'static str,
    traffic_source: &'static str,
    destination: &'static str,
    age_ms: i64,
}

#[rustfmt::skip]
const DEMO_CAMPAIGNS: &[DemoCampaign] = &[
    DemoCampaign { name: "Summer Sale 2025", domain_id: "d1", template_id: "t1", user_id: "u1", traffic_source: "zeropark", destination: "https://demo.io/summer-sale", age_ms: 15 * DAY_MS },
    DemoCampaign { name: "Back to School", domain_id: "d2", template_id: "t2", user_id: "u1", traffic_source: "exoclick", destination: "https://demo.io/school-deals", age_ms: 10 * DAY_MS },
    DemoCampaign { name: "Tech Gadgets Promo", domain_id: "d1", template_id: "t1", user_id: "u2", traffic_source: "taboola", destination: "https://demo.io/gadgets", age_ms: 8 * DAY_MS },
    DemoCampaign { name: "Holiday Special", domain_id: "d2", template_id: "t2", user_id: "u1", traffic_source: "propellerads", destination: "https://demo.io/holiday", age_ms: 7 * DAY_MS },
    DemoCampaign { name: "Mobile App Launch", domain_id: "d1", template_id: "t1", user_id: "u2", traffic_source: "zeropark", destination: "https://demo.io/app-launch", age_ms: 6 * DAY_MS },
    DemoCampaign { name: "Fashion Collection", domain_id: "d3", template_id: "t2", user_id: "u2", traffic_source: "exoclick", destination: "https://demo.io/fashion", age_ms: 5 * DAY_MS },
    DemoCampaign { name: "Gaming Tournament", domain_id: "d1", template_id: "t1", user_id: "u1", traffic_source: "taboola", destination: "https://demo.io/tournament", age_ms: 4 * DAY_MS },
    DemoCampaign { name: "Fitness Challenge", domain_id: "d2", template_id: "t2", user_id: "u2", traffic_source: "propellerads", destination: "https://demo.io/fitness", age_ms: 3 * DAY_MS },
    DemoCampaign { name: "Travel Deals", domain_id: "d1", template_id: "t1", user_id: "u1", traffic_source: "zeropark", destination: "https://demo.io/travel", age_ms: 2 * DAY_MS },
    DemoCampaign { name: "Home Decor Sale", domain_id: "d3", template_id: "t2", user_id: "u2", traffic_source: "exoclick", destination: "https://demo.io/home-decor", age_ms: DAY_MS },
    DemoCampaign { name: "Food Festival", domain_id: "d1", template_id: "t1", user_id: "u1", traffic_source: "taboola", destination: "https://demo.io/food-fest", age_ms: 12 * HOUR_MS },
    DemoCampaign { name: "Beauty Products", domain_id: "d2", template_id: "t2", user_id: "u2", traffic_source: "propellerads", destination: "https://demo.io/beauty", age_ms: 8 * HOUR_MS },
    DemoCampaign { name: "Pet Supplies", domain_id: "d1", template_id: "t1", user_id: "u1", traffic_source: "zeropark", destination: "https://demo.io/pets", age_ms: 4 * HOUR_MS },
    DemoCampaign { name: "Book Fair", domain_id: "d3", template_id: "t2", user_id: "u2", traffic_source: "exoclick", destination: "https://demo.io/books", age_ms: 2 * HOUR_MS },
    DemoCampaign { name: "Sports Equipment", domain_id: "d1", template_id: "t1", user_id: "u1", traffic_source: "taboola", destination: "https://demo.io/sports", age_ms: HOUR_MS },
];

fn demo_domains() -> Vec<Domain> {
    vec![
        Domain {
            id: "d1".to_string(),
            host: "track.demo.io".to_string(),
            verified: true,
            is_global: true,
            is_default: true,
            user_id: None,
        },
        Domain {
            id: "d2".to_string(),
            host: "promo.demo.io".to_string(),
            verified: true,
            is_global: true,
            is_default: false,
            user_id: None,
        },
        Domain {
            id: "d3".to_string(),
            host: "custom.demo.io".to_string(),
            verified: true,
            is_global: false,
            is_default: false,
            user_id: Some("u2".to_string()),
        },
    ]
}

fn demo_templates() -> Vec<Template> {
    vec![
        Template {
            id: "t1".to_string(),
            name: "Placeholders".to_string(),
            kind: TemplateKind::Placeholders,
            pattern: "{browser}{target_url}{keyword}{carrier}{device_id}{visitor_type}{traffic_type}{source}{region}".to_string(),
        },
        Template {
            id: "t2".to_string(),
            name: "Query-string".to_string(),
            kind: TemplateKind::Query,
            pattern: "siteid=[siteid]&browser=[browser]&device=[device]&connection=[connection]"
                .to_string(),
        },
    ]
}

/// Load demo domains, templates and one link per campaign
pub async fn load_demo_data(storage: &MemoryStorage, now_ms: i64) -> StorageResult<()> {
    for domain in demo_domains() {
        storage.insert_domain(domain);
    }
    for template in demo_templates() {
        storage.insert_template(template).await?;
    }

    for (index, demo) in DEMO_CAMPAIGNS.iter().enumerate() {
        let n = index + 1;
        let campaign = Campaign {
            id: format!("c{n}"),
            name: demo.name.to_string(),
            domain_id: demo.domain_id.to_string(),
            template_id: Some(demo.template_id.to_string()),
            status: CampaignStatus::Active,
            created_at: now_ms - demo.age_ms,
            user_id: demo.user_id.to_string(),
            traffic_source: Some(demo.traffic_source.to_string()),
            traffic_parameters: Vec::new(),
            destination_url: Some(demo.destination.to_string()),
            block_vpn: false,
            block_abnormal_traffic: false,
            frequency_capping: Default::default(),
            repeat_visitor_url: None,
        };
        storage.insert_campaign(campaign);
        storage.insert_link(Link {
            id: format!("l{n}"),
            campaign_id: format!("c{n}"),
            slug: slugify(demo.name),
            params: BTreeMap::new(),
            traffic_parameters: Vec::new(),
        })?;
    }

    tracing::info!(
        campaigns = DEMO_CAMPAIGNS.len(),
        "loaded demo campaigns, domains and templates"
    );
    Ok(())
}
