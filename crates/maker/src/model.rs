//! The application registry and its metadata models.
//!
//! An [`Application`] collects every struct and service declared for a
//! project. Names are unique per kind: appending a model under a name that
//! is already taken fails, and lookups go through a name index kept next to
//! the declaration-ordered lists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("struct model [{0}] already exists")]
    DuplicateStruct(String),

    #[error("service model [{0}] already exists")]
    DuplicateService(String),

    #[error("invalid application document: {0}")]
    InvalidDocument(String),
}

/// One field of a struct, or one argument of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldModel {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    /// Type name; a struct name or a language primitive.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub data_type: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_list: bool,
}

/// A named record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructModel {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldModel>,
}

/// One stage of a service pipeline.
///
/// A step runs when its `if` condition is absent or evaluates to true, may
/// nest sub-steps, and may bind its result to a named variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepModel {
    /// Unique within the owning service.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    /// Condition script; the step is skipped unless it is empty or yields
    /// true.
    #[serde(rename = "if", skip_serializing_if = "String::is_empty")]
    pub condition: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepModel>,
    /// Variable receiving the step's result.
    #[serde(rename = "return", skip_serializing_if = "String::is_empty")]
    pub return_variable: String,
}

/// A named service: arguments in, a step pipeline, a result out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceModel {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<FieldModel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepModel>,
    #[serde(rename = "return", skip_serializing_if = "String::is_empty")]
    pub return_variable: String,
}

/// Registry of every struct and service declared for one application.
///
/// Lists keep declaration order for generators; the indexes answer name
/// lookups.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub struct_list: Vec<StructModel>,
    pub service_list: Vec<ServiceModel>,
    #[serde(skip)]
    struct_index: HashMap<String, usize>,
    #[serde(skip)]
    service_index: HashMap<String, usize>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an application document and builds the name indexes.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let mut app: Application =
            serde_json::from_str(text).map_err(|e| ModelError::InvalidDocument(e.to_string()))?;
        app.reindex()?;
        Ok(app)
    }

    /// Rebuilds both name indexes from the lists, rejecting duplicates.
    pub fn reindex(&mut self) -> Result<(), ModelError> {
        self.struct_index.clear();
        for (i, model) in self.struct_list.iter().enumerate() {
            if self.struct_index.insert(model.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateStruct(model.name.clone()));
            }
        }
        self.service_index.clear();
        for (i, model) in self.service_list.iter().enumerate() {
            if self.service_index.insert(model.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateService(model.name.clone()));
            }
        }
        Ok(())
    }

    /// Registers a struct. Fails when the name is already taken.
    pub fn append_struct(&mut self, model: StructModel) -> Result<(), ModelError> {
        if self.struct_index.contains_key(&model.name) {
            return Err(ModelError::DuplicateStruct(model.name));
        }
        self.struct_index
            .insert(model.name.clone(), self.struct_list.len());
        self.struct_list.push(model);
        Ok(())
    }

    /// Looks a struct up by name.
    pub fn get_struct(&self, name: &str) -> Option<&StructModel> {
        self.struct_index.get(name).map(|&i| &self.struct_list[i])
    }

    /// Registers a service. Fails when the name is already taken.
    pub fn append_service(&mut self, model: ServiceModel) -> Result<(), ModelError> {
        if self.service_index.contains_key(&model.name) {
            return Err(ModelError::DuplicateService(model.name));
        }
        self.service_index
            .insert(model.name.clone(), self.service_list.len());
        self.service_list.push(model);
        Ok(())
    }

    /// Looks a service up by name.
    pub fn get_service(&self, name: &str) -> Option<&ServiceModel> {
        self.service_index.get(name).map(|&i| &self.service_list[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_struct(name: &str) -> StructModel {
        StructModel {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn named_service(name: &str) -> ServiceModel {
        ServiceModel {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_append_and_get_struct() {
        let mut app = Application::new();
        app.append_struct(named_struct("User")).unwrap();
        app.append_struct(named_struct("Order")).unwrap();

        assert_eq!(app.get_struct("User").unwrap().name, "User");
        assert_eq!(app.get_struct("Order").unwrap().name, "Order");
        assert!(app.get_struct("Missing").is_none());
        assert_eq!(app.struct_list.len(), 2);
    }

    #[test]
    fn test_duplicate_struct_is_rejected() {
        let mut app = Application::new();
        app.append_struct(named_struct("User")).unwrap();

        let err = app.append_struct(named_struct("User")).unwrap_err();
        assert_eq!(err, ModelError::DuplicateStruct("User".to_string()));
        assert_eq!(err.to_string(), "struct model [User] already exists");
        assert_eq!(app.struct_list.len(), 1);
    }

    #[test]
    fn test_append_and_get_service() {
        let mut app = Application::new();
        app.append_service(named_service("login")).unwrap();

        assert_eq!(app.get_service("login").unwrap().name, "login");
        assert!(app.get_service("logout").is_none());
    }

    #[test]
    fn test_duplicate_service_is_rejected() {
        let mut app = Application::new();
        app.append_service(named_service("login")).unwrap();

        let err = app.append_service(named_service("login")).unwrap_err();
        assert_eq!(err, ModelError::DuplicateService("login".to_string()));
    }

    #[test]
    fn test_struct_and_service_namespaces_are_separate() {
        let mut app = Application::new();
        app.append_struct(named_struct("User")).unwrap();
        app.append_service(named_service("User")).unwrap();
    }

    #[test]
    fn test_from_json_builds_indexes() {
        let app = Application::from_json(
            r#"{
                "structList": [
                    {"name": "User", "fields": [
                        {"name": "id", "type": "int64"},
                        {"name": "tags", "type": "string", "isList": true}
                    ]}
                ],
                "serviceList": [
                    {"name": "getUser",
                     "args": [{"name": "id", "type": "int64"}],
                     "steps": [
                        {"name": "load", "if": "id > 0", "return": "user",
                         "steps": [{"name": "audit"}]}
                     ],
                     "return": "user"}
                ]
            }"#,
        )
        .unwrap();

        let user = app.get_struct("User").unwrap();
        assert_eq!(user.fields.len(), 2);
        assert!(user.fields[1].is_list);

        let service = app.get_service("getUser").unwrap();
        assert_eq!(service.return_variable, "user");
        assert_eq!(service.steps[0].condition, "id > 0");
        assert_eq!(service.steps[0].steps[0].name, "audit");
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let err = Application::from_json(
            r#"{"structList": [{"name": "User"}, {"name": "User"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, ModelError::DuplicateStruct("User".to_string()));
    }

    #[test]
    fn test_step_serialization_skips_empty_fields() {
        let step = StepModel {
            name: "load".to_string(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&step).unwrap(), r#"{"name":"load"}"#);
    }
}
