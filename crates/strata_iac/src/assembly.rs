//! The cloud assembly: every stack declared during one invocation.

use std::collections::HashSet;

use tracing::info;

use crate::error::{IacError, IacResult};
use crate::stack::Stack;

/// Ordered collection of stacks handed to the provisioning engine.
///
/// Stacks are only added in whole batches, so a record that fails halfway
/// through never leaves a fragment behind.
#[derive(Debug, Default)]
pub struct Assembly {
    stacks: Vec<Stack>,
}

impl Assembly {
    pub fn new() -> Self {
        Self { stacks: Vec::new() }
    }

    /// Register a single stack.
    pub fn add_stack(&mut self, stack: Stack) -> IacResult<()> {
        self.add_stacks(vec![stack])
    }

    /// Register several stacks atomically.
    ///
    /// Each stack's dependencies must already be in the assembly or appear
    /// earlier in the batch. Nothing is added unless the whole batch is valid.
    pub fn add_stacks(&mut self, batch: Vec<Stack>) -> IacResult<()> {
        let mut names: HashSet<&str> = self.stacks.iter().map(|s| s.name()).collect();

        for stack in &batch {
            for dependency in stack.dependencies() {
                if !names.contains(dependency.as_str()) {
                    return Err(IacError::not_found(
                        format!("stack required by {}", stack.name()),
                        dependency.clone(),
                    ));
                }
            }
            if !names.insert(stack.name()) {
                return Err(IacError::Duplicate {
                    kind: "stack".to_string(),
                    id: stack.name().to_string(),
                });
            }
        }

        for stack in batch {
            info!(
                "Registered stack {} ({}, {} resources)",
                stack.name(),
                stack.environment(),
                stack.resources().len()
            );
            self.stacks.push(stack);
        }
        Ok(())
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackEnvironment;

    fn stack(name: &str) -> Stack {
        Stack::new(name, StackEnvironment::new("1", "eu-west-1")).unwrap()
    }

    #[test]
    fn test_dependency_must_exist() {
        let mut assembly = Assembly::new();
        let mut consumer = stack("consumer");
        consumer.add_dependency("producer");

        let err = assembly.add_stack(consumer).unwrap_err();
        assert!(matches!(err, IacError::ResourceNotFound { .. }));
        assert!(assembly.is_empty());
    }

    #[test]
    fn test_batch_order_satisfies_dependency() {
        let mut assembly = Assembly::new();
        let mut consumer = stack("consumer");
        consumer.add_dependency("producer");

        assembly.add_stacks(vec![stack("producer"), consumer]).unwrap();
        assert_eq!(assembly.stack_names(), vec!["producer", "consumer"]);
    }

    #[test]
    fn test_failed_batch_adds_nothing() {
        let mut assembly = Assembly::new();
        assembly.add_stack(stack("taken")).unwrap();

        let err = assembly
            .add_stacks(vec![stack("fresh"), stack("taken")])
            .unwrap_err();
        assert!(matches!(err, IacError::Duplicate { .. }));
        assert_eq!(assembly.len(), 1);
        assert!(assembly.stack("fresh").is_none());
    }
}
