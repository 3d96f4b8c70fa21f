pub mod alert;
pub mod event;
pub mod movement;
pub mod rule;

pub use alert::{
    normalize_sku, Alert, AlertDraft, AlertPriority, AlertStatus, AlertType, Channel,
    EstimatedImpact, NotificationLog,
};
pub use event::{OwnerType, StockChangeEvent};
pub use movement::StockMovement;
pub use rule::{
    AlertRule, AutoResolveSettings, ChannelSetting, RuleActions, RuleConditions, RuleFilters,
    RuleSet, RuleSetError, StockLevelCondition, StockOperator, VelocityCondition,
    VelocityDirection,
};
