/// Column updates applied in the same statement as a status change. Timestamps that belong to the target status
/// (`paid_at`, `delivered_at`, ...) are set by the store and need not appear here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionEffects {
    pub payment_status: Option<String>,
    pub status_reason: Option<String>,
    pub delivery_details: Option<String>,
    pub delivery_notes: Option<String>,
}

impl TransitionEffects {
    pub fn with_payment_status<S: Into<String>>(mut self, status: S) -> Self {
        self.payment_status = Some(status.into());
        self
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.status_reason = Some(reason.into());
        self
    }

    pub fn with_delivery(mut self, details: String, notes: Option<String>) -> Self {
        self.delivery_details = Some(details);
        self.delivery_notes = notes;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payment_status.is_none() &&
            self.status_reason.is_none() &&
            self.delivery_details.is_none() &&
            self.delivery_notes.is_none()
    }
}
