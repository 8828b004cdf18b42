//! Shared configuration for requests backed by a database table.

use serde_json::Value;
use tracing::debug;

use crate::parameters::Parameters;
use crate::resource::Resource;
use crate::validation::FieldRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    User,
    Message,
    Offer,
}

impl Model {
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Message => "messages",
            Self::Offer => "offers",
        }
    }

    /// Columns free-form filter parameters may target.
    pub fn filterable(self) -> &'static [&'static str] {
        match self {
            Self::User => &["status"],
            Self::Message => &["received", "read"],
            Self::Offer => &[],
        }
    }
}

/// Which model a request reads. Results are presented through the model's
/// resource shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbBinding {
    pub model: Model,
}

impl DbBinding {
    pub const fn new(model: Model) -> Self {
        Self { model }
    }

    /// Parameters not consumed by `rules`: the free-form part of the call.
    pub fn db_parameters(&self, params: &Parameters, rules: &[FieldRule]) -> Parameters {
        params.except(rules.iter().map(|rule| rule.field))
    }

    /// Free-form parameters that name a filterable column of the model.
    /// Anything else is ignored.
    pub fn filters(&self, params: &Parameters, rules: &[FieldRule]) -> Vec<(&'static str, Value)> {
        let allowed = self.model.filterable();
        let mut filters = Vec::new();

        for (key, value) in self.db_parameters(params, rules).iter() {
            match allowed.iter().find(|column| **column == key) {
                Some(column) if !value.is_null() => filters.push((*column, value.clone())),
                Some(_) => {}
                None => debug!("Ignoring unknown {} filter '{}'", self.model.table(), key),
            }
        }

        filters
    }

    pub fn present<R: Resource>(&self, record: &R) -> serde_json::Result<Value> {
        record.to_resource()
    }

    pub fn present_all<R: Resource>(&self, records: &[R]) -> serde_json::Result<Vec<Value>> {
        records.iter().map(|r| self.present(r)).collect()
    }
}
