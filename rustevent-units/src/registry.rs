//! Registry resolving unit names to shared unit instances.

use crate::unit::Unit;
use crate::units::{
    DSpacing, DeltaE, DeltaEInWavenumber, Energy, EnergyInWavenumber, Momentum,
    MomentumTransfer, QSquared, Tof, Wavelength,
};
use rustevent_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name-to-unit lookup, pre-populated with the built-in units.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: BTreeMap<&'static str, Arc<dyn Unit>>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Tof));
        registry.register(Arc::new(Wavelength));
        registry.register(Arc::new(Momentum));
        registry.register(Arc::new(Energy));
        registry.register(Arc::new(EnergyInWavenumber));
        registry.register(Arc::new(DSpacing));
        registry.register(Arc::new(MomentumTransfer));
        registry.register(Arc::new(QSquared));
        registry.register(Arc::new(DeltaE));
        registry.register(Arc::new(DeltaEInWavenumber));
        registry
    }
}

impl UnitRegistry {
    /// Creates a registry with no units.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            units: BTreeMap::new(),
        }
    }

    /// Adds a unit, replacing any unit registered under the same id.
    pub fn register(&mut self, unit: Arc<dyn Unit>) {
        self.units.insert(unit.id(), unit);
    }

    /// Looks a unit up by id.
    ///
    /// # Errors
    /// Returns [`Error::UnknownUnit`] if no unit has that id.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Unit>> {
        self.units
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownUnit(name.to_string()))
    }

    /// Registered unit ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.units.keys().copied()
    }

    /// Registered units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Arc<dyn Unit>> {
        self.units.values()
    }
}
