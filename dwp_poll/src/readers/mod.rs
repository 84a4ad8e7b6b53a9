//! Register reader implementations and their registry.
//!
//! - [`modbus`] - Modbus TCP reader for the press controllers
//! - [`simulation`] - Software press for dry runs without hardware
//!
//! # Adding New Readers
//!
//! 1. Create a new submodule under `readers/`
//! 2. Implement `RegisterReader` from `dwp_common::reader`
//! 3. Register its factory in [`ReaderRegistry::with_builtin`]

pub mod modbus;
pub mod simulation;

pub use modbus::ModbusTcpReader;
pub use simulation::SimulatedPress;

use crate::error::PollError;
use dwp_common::config::ModbusSection;
use dwp_common::reader::RegisterReader;
use std::collections::HashMap;

/// Factory building a reader from the `[modbus]` section.
pub type ReaderFactory = fn(&ModbusSection) -> Box<dyn RegisterReader>;

/// Registry of available register readers.
///
/// Constructed at startup and consulted once to build the configured
/// reader. No global state.
pub struct ReaderRegistry {
    factories: HashMap<&'static str, ReaderFactory>,
}

impl ReaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in reader.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(modbus::READER_NAME, modbus::create_reader);
        registry.factories.insert(simulation::READER_NAME, simulation::create_reader);
        registry
    }

    /// Register a reader factory.
    ///
    /// # Errors
    /// `PollError::ReaderAlreadyRegistered` if the name is taken.
    pub fn register(&mut self, name: &'static str, factory: ReaderFactory) -> Result<(), PollError> {
        if self.factories.contains_key(name) {
            return Err(PollError::ReaderAlreadyRegistered(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Create a reader by name.
    ///
    /// # Errors
    /// `PollError::ReaderNotFound` if no reader with that name is registered.
    pub fn create_reader(
        &self,
        name: &str,
        section: &ModbusSection,
    ) -> Result<Box<dyn RegisterReader>, PollError> {
        let factory = self
            .factories
            .get(name.trim())
            .ok_or_else(|| PollError::ReaderNotFound(name.to_string()))?;
        Ok(factory(section))
    }

    /// All registered reader names.
    pub fn list_readers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
