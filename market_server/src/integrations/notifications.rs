//! The outbound mail system is not part of this server. Notifications are handed to it as structured log records on
//! the `mkt::notifications` target, which the deployment ships to the mailer.
use log::*;
use order_engine::events::{EventHandlers, EventHooks, Notification, OrderStatusChangedEvent};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;

pub fn create_notification_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_notification(move |notification| {
        Box::pin(async move {
            dispatch_notification(&notification);
        })
    });
    hooks.on_status_changed(move |ev| {
        let OrderStatusChangedEvent { order, old_status } = ev;
        Box::pin(async move {
            info!("📬️ Order {} moved from {old_status} to {}", order.id, order.status);
        })
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}

fn dispatch_notification(notification: &Notification) {
    match serde_json::to_string(notification) {
        Ok(json) => info!(target: "mkt::notifications", "{json}"),
        Err(e) => error!("📬️ Could not serialize the {} notification. {e}", notification.template),
    }
    debug!("📬️ {} notification queued for {}", notification.template, notification.recipient);
}
