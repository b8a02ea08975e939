mod element;
mod project;
mod subscription;

pub use element::{DetectedElement, ElementSearch, ElementStatus, QuerySuggestions};
pub use project::{Product, Project, ProjectId, ProjectMeta, ProjectPatch, ProjectStatus};
pub use subscription::{Limit, Marketplace, MarketplaceSet, Tier, TierLimits, UsageCounters};
