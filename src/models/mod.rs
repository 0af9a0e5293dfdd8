mod campaign;
mod visit;

pub use campaign::{
    Campaign, CampaignStatus, CreateCampaignRequest, CreateDomainRequest, CreateLinkRequest,
    Domain, FrequencyCapping, Link, Template, TemplateKind, TrafficParameter,
    UpdateCampaignRequest, UpdateDomainRequest,
};
pub use visit::{NewVisit, VisitDimensions, VisitEvent, DIMENSION_NAMES};
