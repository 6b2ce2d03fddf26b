//! Core item update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sift_core::entities::ItemDetail;
use sift_core::enums::Controller;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<Controller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ItemDetail>,
}

impl ItemUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.fields.is_none()
            && self.due.is_none()
            && self.done.is_none()
            && self.controller.is_none()
            && self.detail.is_none()
    }
}

pub struct ItemUpdateBuilder(ItemUpdate);

impl ItemUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(ItemUpdate::default())
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.0.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: serde_json::Value) -> Self {
        self.0.fields = Some(fields);
        self
    }

    #[must_use]
    pub const fn due(mut self, due: Option<DateTime<Utc>>) -> Self {
        self.0.due = Some(due);
        self
    }

    #[must_use]
    pub const fn done(mut self, done: Option<DateTime<Utc>>) -> Self {
        self.0.done = Some(done);
        self
    }

    #[must_use]
    pub const fn controller(mut self, controller: Controller) -> Self {
        self.0.controller = Some(controller);
        self
    }

    #[must_use]
    pub fn detail(mut self, detail: ItemDetail) -> Self {
        self.0.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn build(self) -> ItemUpdate {
        self.0
    }
}

impl Default for ItemUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_changed_fields_only() {
        let update = ItemUpdateBuilder::new()
            .summary("Renamed")
            .due(None)
            .build();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"summary": "Renamed", "due": null}));
        assert!(!update.is_empty());
        assert!(ItemUpdate::default().is_empty());
    }
}
