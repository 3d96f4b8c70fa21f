pub mod alert;
pub mod ledger;
pub mod notification;

pub use alert::{
    default_message, default_recommended_action, derive_severity, AlertFilter, AlertIndex,
    AlertService, PgAlertIndex,
};
pub use ledger::{PgStockLedger, StockLedger};
pub use notification::{can_send, ChannelTransport, Dispatcher, NotifyRequest, SendOutcome};
