//! Stacks: the unit of deployment handed to the provisioning engine.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{IacError, IacResult};
use crate::resource::{logical_id, Resource, ResourceProperties, Token};

/// Stack names are what the engine deploys under; they follow the
/// provider's naming rules.
const STACK_NAME_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9-]{0,127}$";

/// Target account and region of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StackEnvironment {
    pub account: String,
    pub region: String,
}

impl StackEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for StackEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aws://{}/{}", self.account, self.region)
    }
}

/// A value a stack publishes for other stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    #[serde(skip)]
    pub name: String,
    pub value: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An ordered set of declared resources deployed together.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    environment: StackEnvironment,
    description: Option<String>,
    resources: Vec<Resource>,
    outputs: Vec<StackOutput>,
    dependencies: Vec<String>,
}

impl Stack {
    /// Create an empty stack, validating its name.
    pub fn new(name: impl Into<String>, environment: StackEnvironment) -> IacResult<Self> {
        let name = name.into();
        validate_stack_name(&name)?;

        Ok(Self {
            name,
            environment,
            description: None,
            resources: Vec::new(),
            outputs: Vec::new(),
            dependencies: Vec::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &StackEnvironment {
        &self.environment
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Names of stacks that must be deployed before this one.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Declare a resource and return its logical id.
    pub fn add_resource(
        &mut self,
        construct_id: &str,
        properties: ResourceProperties,
    ) -> IacResult<String> {
        let id = logical_id(construct_id);
        if id.is_empty() {
            return Err(IacError::InvalidName {
                name: construct_id.to_string(),
                message: "construct id has no alphanumeric characters".to_string(),
            });
        }
        if self.resource(&id).is_some() {
            return Err(IacError::Duplicate {
                kind: format!("resource in stack {}", self.name),
                id,
            });
        }

        debug!("Declaring {} {} in {}", properties.type_name(), id, self.name);
        self.resources.push(Resource {
            logical_id: id.clone(),
            construct_id: construct_id.to_string(),
            properties,
            depends_on: Vec::new(),
        });
        Ok(id)
    }

    /// Declare an explicit ordering edge between two resources of this stack.
    pub fn add_resource_dependency(&mut self, logical_id: &str, depends_on: &str) -> IacResult<()> {
        if self.resource(depends_on).is_none() {
            return Err(IacError::not_found("resource", depends_on));
        }
        let resource = self
            .resources
            .iter_mut()
            .find(|r| r.logical_id == logical_id)
            .ok_or_else(|| IacError::not_found("resource", logical_id))?;

        if !resource.depends_on.iter().any(|d| d == depends_on) {
            resource.depends_on.push(depends_on.to_string());
        }
        Ok(())
    }

    pub fn add_output(&mut self, name: impl Into<String>, value: Token, description: Option<String>) {
        self.outputs.push(StackOutput {
            name: name.into(),
            value,
            description,
        });
    }

    /// Record that this stack consumes an output of another stack.
    pub fn add_dependency(&mut self, stack_name: impl Into<String>) {
        let stack_name = stack_name.into();
        if !self.dependencies.contains(&stack_name) {
            self.dependencies.push(stack_name);
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn output(&self, name: &str) -> Option<&StackOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Resources of one provider type, in declaration order.
    pub fn resources_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.type_name() == type_name)
    }

    /// Render the stack as a deployable template.
    pub fn to_template(&self) -> IacResult<Value> {
        let known: HashSet<&str> = self.resources.iter().map(|r| r.logical_id.as_str()).collect();

        let mut resources = Map::new();
        for resource in &self.resources {
            let mut body = serde_json::to_value(&resource.properties)?;

            for target in references(&resource.properties) {
                if !known.contains(target.as_str()) {
                    return Err(IacError::not_found(
                        format!("resource referenced by {}", resource.logical_id),
                        target,
                    ));
                }
            }

            if let Value::Object(map) = &mut body {
                if !resource.depends_on.is_empty() {
                    map.insert("DependsOn".to_string(), json!(resource.depends_on));
                }
                map.insert(
                    "Metadata".to_string(),
                    json!({ "strata:construct-id": resource.construct_id }),
                );
            }
            resources.insert(resource.logical_id.clone(), body);
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            if let Some(target) = output.value.target() {
                if !known.contains(target) {
                    return Err(IacError::not_found(
                        format!("resource referenced by output {}", output.name),
                        target,
                    ));
                }
            }
            outputs.insert(logical_id(&output.name), serde_json::to_value(output)?);
        }

        let mut template = Map::new();
        if let Some(description) = &self.description {
            template.insert("Description".to_string(), json!(description));
        }
        template.insert("Resources".to_string(), Value::Object(resources));
        if !outputs.is_empty() {
            template.insert("Outputs".to_string(), Value::Object(outputs));
        }

        Ok(Value::Object(template))
    }
}

/// Every logical id a resource's properties point at.
fn references(properties: &ResourceProperties) -> Vec<String> {
    let mut found = Vec::new();
    if let Ok(value) = serde_json::to_value(properties) {
        collect_references(&value, &mut found);
    }
    found
}

fn collect_references(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                found.push(id.clone());
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(id)) = parts.first() {
                    found.push(id.clone());
                }
            }
            for nested in map.values() {
                collect_references(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        _ => {}
    }
}

/// Check a stack name against the provider's naming rules.
pub fn validate_stack_name(name: &str) -> IacResult<()> {
    let pattern = Regex::new(STACK_NAME_PATTERN).map_err(|e| IacError::InvalidName {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(IacError::InvalidName {
            name: name.to_string(),
            message: "stack names start with a letter and contain only letters, digits and hyphens (max 128)"
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{InternetGatewayProps, GatewayAttachmentProps, Tag};

    fn env() -> StackEnvironment {
        StackEnvironment::new("111122223333", "eu-west-1")
    }

    fn igw() -> ResourceProperties {
        ResourceProperties::InternetGateway(InternetGatewayProps {
            tags: vec![Tag::name("igw")],
        })
    }

    #[test]
    fn test_stack_name_rules() {
        assert!(Stack::new("network-vpc-core-eu-west-1", env()).is_ok());
        assert!(Stack::new("RDSInstanceStack-orders", env()).is_ok());
        assert!(Stack::new("1-starts-with-digit", env()).is_err());
        assert!(Stack::new("has_underscore", env()).is_err());
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut stack = Stack::new("test", env()).unwrap();
        stack.add_resource("Gateway-1", igw()).unwrap();
        let err = stack.add_resource("Gateway1", igw()).unwrap_err();
        assert!(matches!(err, IacError::Duplicate { .. }));
    }

    #[test]
    fn test_template_rejects_dangling_reference() {
        let mut stack = Stack::new("test", env()).unwrap();
        stack
            .add_resource(
                "Attach",
                ResourceProperties::GatewayAttachment(GatewayAttachmentProps {
                    vpc_id: Token::reference("Missing"),
                    internet_gateway_id: Token::literal("igw-1"),
                }),
            )
            .unwrap();

        let err = stack.to_template().unwrap_err();
        assert!(matches!(err, IacError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_template_shape() {
        let mut stack = Stack::new("test", env()).unwrap().with_description("demo");
        let gw = stack.add_resource("Gateway", igw()).unwrap();
        let attach = stack
            .add_resource(
                "Attach",
                ResourceProperties::GatewayAttachment(GatewayAttachmentProps {
                    vpc_id: Token::literal("vpc-1"),
                    internet_gateway_id: Token::reference(&gw),
                }),
            )
            .unwrap();
        stack.add_resource_dependency(&attach, &gw).unwrap();
        stack.add_output("GatewayId", Token::reference(&gw), None);

        let template = stack.to_template().unwrap();
        assert_eq!(template["Description"], "demo");
        assert_eq!(template["Resources"]["Gateway"]["Type"], "AWS::EC2::InternetGateway");
        assert_eq!(template["Resources"]["Attach"]["DependsOn"][0], "Gateway");
        assert_eq!(template["Outputs"]["GatewayId"]["Value"]["Ref"], "Gateway");
    }
}
