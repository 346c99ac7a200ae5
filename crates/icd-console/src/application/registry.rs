//! ScriptRegistry: the table of objects an operator can address by name.
//!
//! The registry is owned by the command-queue consumer, so it needs no
//! locking: only one command ever runs at a time.

use std::collections::BTreeMap;

use icd_core::{CommandResult, Scriptable};
use thiserror::Error;
use tracing::debug;

use super::command::{parse_line, ConsoleCommand};

/// Errors from building the registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("an object named '{0}' is already registered")]
    Duplicate(String),
}

/// Name → object table used by the console dispatcher.
#[derive(Default)]
pub struct ScriptRegistry {
    objects: BTreeMap<String, Box<dyn Scriptable>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `object` under its own [`Scriptable::name`].
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] if the name is taken.
    pub fn register(&mut self, object: Box<dyn Scriptable>) -> Result<(), RegistryError> {
        let name = object.name().to_string();
        if self.objects.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!("registered scriptable object '{name}'");
        self.objects.insert(name, object);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<S: Scriptable + 'static>(mut self, object: S) -> Result<Self, RegistryError> {
        self.register(Box::new(object))?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.objects.keys().map(String::as_str).collect()
    }

    /// Parses and executes one console line.
    ///
    /// Never fails: parse errors and unknown objects come back as `Error`
    /// results so they can be broadcast like any other outcome.
    pub fn dispatch(&mut self, line: &str) -> CommandResult {
        let command = match parse_line(line) {
            Ok(command) => command,
            Err(e) => return CommandResult::error(e.to_string()),
        };

        match command {
            ConsoleCommand::Help { object } => self.help(object.as_deref()),
            ConsoleCommand::Get { object, item } => match self.target(&object) {
                Ok(target) => match target.get(&item) {
                    Ok(value) => CommandResult::ok(format!("{object}.{item}")).with_value(value),
                    Err(e) => CommandResult::error(e.to_string()),
                },
                Err(unknown) => unknown,
            },
            ConsoleCommand::Set {
                object,
                item,
                value,
            } => match self.target(&object) {
                Ok(target) => match target.set(&item, value) {
                    Ok(()) => CommandResult::ok(format!("{object}.{item} set to {value}")),
                    Err(e) => CommandResult::error(e.to_string()),
                },
                Err(unknown) => unknown,
            },
            ConsoleCommand::Exec {
                object,
                command,
                params,
            } => match self.target(&object) {
                Ok(target) => target.exec(&command, &params),
                Err(unknown) => unknown,
            },
        }
    }

    fn target(&mut self, name: &str) -> Result<&mut Box<dyn Scriptable>, CommandResult> {
        self.objects
            .get_mut(name)
            .ok_or_else(|| CommandResult::error(format!("unknown object '{name}'")))
    }

    fn help(&self, object: Option<&str>) -> CommandResult {
        match object {
            None if self.objects.is_empty() => CommandResult::info("no objects registered"),
            None => {
                let names = self.names();
                CommandResult::info(format!("objects: {}", names.join(", "))).with_value(names)
            }
            Some(name) => match self.objects.get(name) {
                Some(target) => {
                    let items = target.items();
                    let commands = target.commands();
                    CommandResult::info(format!(
                        "{name}: items [{}]; commands [{}]",
                        items.join(", "),
                        commands.join(", ")
                    ))
                }
                None => CommandResult::error(format!("unknown object '{name}'")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icd_core::{CommandStatus, Param, ScriptError};

    /// Minimal scriptable object counting how often it is touched.
    struct Counter {
        name: &'static str,
        count: f64,
        calls: usize,
    }

    impl Counter {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                count: 0.0,
                calls: 0,
            }
        }
    }

    impl Scriptable for Counter {
        fn name(&self) -> &str {
            self.name
        }

        fn get(&self, item: &str) -> Result<f64, ScriptError> {
            match item {
                "count" => Ok(self.count),
                other => Err(ScriptError::UnknownItem(other.to_string())),
            }
        }

        fn set(&mut self, item: &str, value: f64) -> Result<(), ScriptError> {
            match item {
                "count" => {
                    self.count = value;
                    Ok(())
                }
                other => Err(ScriptError::UnknownItem(other.to_string())),
            }
        }

        fn exec(&mut self, command: &str, params: &[Param]) -> CommandResult {
            self.calls += 1;
            match command {
                "bump" => {
                    let by = params.first().and_then(Param::as_f64).unwrap_or(1.0);
                    self.count += by;
                    CommandResult::ok("bumped").with_value(self.count)
                }
                other => CommandResult::error(format!("unknown command '{other}'")),
            }
        }

        fn items(&self) -> Vec<String> {
            vec!["count".to_string()]
        }

        fn commands(&self) -> Vec<&'static str> {
            vec!["bump"]
        }
    }

    fn registry() -> ScriptRegistry {
        ScriptRegistry::new()
            .with(Counter::new("alpha"))
            .and_then(|r| r.with(Counter::new("beta")))
            .expect("unique names")
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        // Arrange
        let mut reg = registry();

        // Act
        let result = reg.register(Box::new(Counter::new("alpha")));

        // Assert
        assert_eq!(result, Err(RegistryError::Duplicate("alpha".to_string())));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_exec_routes_to_named_object() {
        let mut reg = registry();

        let result = reg.dispatch("alpha bump 3");

        assert_eq!(result.status, CommandStatus::Ok);
        assert_eq!(result.value, Some(serde_json::json!(3.0)));
        assert_eq!(reg.dispatch("beta.count").value, Some(serde_json::json!(0.0)));
    }

    #[test]
    fn test_set_then_get() {
        let mut reg = registry();

        let set = reg.dispatch("beta.count = 7");
        let get = reg.dispatch("beta.count");

        assert_eq!(set.status, CommandStatus::Ok);
        assert_eq!(get.to_string(), "OK: beta.count = 7.0");
    }

    #[test]
    fn test_unknown_object_is_error() {
        let mut reg = registry();

        let result = reg.dispatch("gamma bump");

        assert!(result.is_error());
        assert_eq!(result.message, "unknown object 'gamma'");
    }

    #[test]
    fn test_unknown_item_is_error() {
        let mut reg = registry();

        let result = reg.dispatch("alpha.missing");

        assert!(result.is_error());
        assert!(result.message.contains("missing"));
    }

    #[test]
    fn test_parse_error_becomes_error_result() {
        let mut reg = registry();

        let result = reg.dispatch("alpha");

        assert!(result.is_error());
        assert!(result.message.contains("help alpha"));
    }

    #[test]
    fn test_help_lists_objects_sorted() {
        let mut reg = registry();

        let result = reg.dispatch("help");

        assert_eq!(result.status, CommandStatus::Info);
        assert_eq!(result.message, "objects: alpha, beta");
    }

    #[test]
    fn test_help_for_object_lists_items_and_commands() {
        let mut reg = registry();

        let result = reg.dispatch("help alpha");

        assert_eq!(result.message, "alpha: items [count]; commands [bump]");
        assert!(reg.dispatch("help nobody").is_error());
    }

    #[test]
    fn test_catalog_messages_register_and_dispatch() {
        let mut reg = ScriptRegistry::new();
        reg.register(Box::new(icd_core::catalog::telemetry_message().expect("catalog")))
            .expect("register telemetry");

        let set = reg.dispatch("telemetry.status.mode = 5");
        let get = reg.dispatch("telemetry.status");

        assert_eq!(set.status, CommandStatus::Ok);
        assert_eq!(get.value, Some(serde_json::json!(10.0)));
    }
}
