use std::path::{Path, PathBuf};

use crate::api::UnitApi;

/// One independently loaded piece of automation logic
///
/// `run` is the unit's top-level code. It executes once, inside the unit's
/// isolation boundary, and typically registers handlers through the API.
pub trait AutomationUnit: Send + Sync {
    /// Unique identity, used in logs and error reports
    fn name(&self) -> &str;

    /// Where the unit came from; `require` resolves relative to it
    fn location(&self) -> Option<&Path> {
        None
    }

    fn run(&self, api: &UnitApi) -> anyhow::Result<()>;
}

/// A unit backed by a closure
pub struct FnUnit<F> {
    name: String,
    location: Option<PathBuf>,
    body: F,
}

impl<F> FnUnit<F>
where
    F: Fn(&UnitApi) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            location: None,
            body,
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl<F> AutomationUnit for FnUnit<F>
where
    F: Fn(&UnitApi) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn run(&self, api: &UnitApi) -> anyhow::Result<()> {
        (self.body)(api)
    }
}
