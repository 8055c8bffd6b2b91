//! Execution unit host
//!
//! Loads units one at a time: a fresh [`UnitDomain`] per unit, an API bound
//! to it, then the unit's top-level code inside the domain. The domain lives
//! as long as the host so the unit's handlers keep running after load.

use ms_automation::Dispatcher;
use ms_bus::Publisher;
use ms_core::UnitDomain;
use ms_scheduler::TimeScheduler;
use ms_solar::SolarScheduler;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::api::{Globals, HostContext, UnitApi};
use crate::error::{HostError, HostResult};
use crate::modules::ModuleCache;
use crate::unit::AutomationUnit;

/// Hosts every loaded automation unit
pub struct UnitHost {
    context: Arc<HostContext>,
    units: Mutex<BTreeMap<String, UnitDomain>>,
}

impl UnitHost {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        time: Arc<TimeScheduler>,
        solar: Arc<SolarScheduler>,
        publisher: Publisher,
    ) -> Self {
        Self {
            context: Arc::new(HostContext {
                dispatcher,
                time,
                solar,
                publisher,
                modules: Arc::new(ModuleCache::new()),
                globals: Arc::new(Globals::new()),
            }),
            units: Mutex::new(BTreeMap::new()),
        }
    }

    /// The module cache shared by every unit
    pub fn modules(&self) -> &Arc<ModuleCache> {
        &self.context.modules
    }

    /// The store shared by every unit
    pub fn globals(&self) -> &Arc<Globals> {
        &self.context.globals
    }

    /// Load a unit and run its top-level code
    ///
    /// An error or panic in the top-level code is reported through the unit's
    /// domain; the unit stays loaded with whatever it registered before
    /// failing.
    pub fn load(&self, unit: &dyn AutomationUnit) -> HostResult<UnitApi> {
        let name = unit.name().to_string();
        if name.is_empty() {
            return Err(HostError::EmptyName);
        }

        let domain = {
            let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
            if units.contains_key(&name) {
                return Err(HostError::DuplicateUnit(name));
            }
            let domain = UnitDomain::new(name.clone());
            units.insert(name.clone(), domain.clone());
            domain
        };

        let location = unit.location().map(|p| p.to_path_buf());
        debug!(unit = %name, location = ?location, "Loading unit");
        let api = UnitApi::new(self.context.clone(), domain.clone(), location);

        if domain.run("load", || unit.run(&api)) {
            info!(unit = %name, "Unit loaded");
        } else {
            warn!(unit = %name, "Unit top-level code failed");
        }
        Ok(api)
    }

    /// Names of the loaded units, sorted
    pub fn unit_names(&self) -> Vec<String> {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// The domain of a loaded unit
    pub fn domain(&self, name: &str) -> Option<UnitDomain> {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Total errors caught across all units
    pub fn error_count(&self) -> u64 {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(UnitDomain::error_count)
            .sum()
    }
}
