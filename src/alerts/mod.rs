/// Threshold state machine, message rendering and notification delivery
pub mod alert_manager;
pub mod notifier;
pub mod render;
pub mod tiers;

pub use alert_manager::AlertManager;
pub use notifier::{MockNotifier, Notifier, OutgoingMessage, SentMessage, SmtpNotifier};
pub use render::MessageRenderer;
pub use tiers::{evaluate, AlertBook, AlertState, Evaluation, Tier};
