//! Go target settings.
//!
//! Describes where generated Go code lands: module name, Go version, and
//! one path/package pair per output category. Every field is optional in
//! the document; accessors fill in the conventional defaults.

use serde::{Deserialize, Serialize};

/// Layout of a generated Go module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageGolangModel {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub module_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub go_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub common_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub common_pack: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub constant_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub constant_pack: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_pack: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub struct_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub struct_pack: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub func_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub func_pack: String,
}

/// Normalizes a configured path: the default when unset, a trailing slash
/// otherwise.
fn path_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    }
}

fn pack_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

impl LanguageGolangModel {
    pub fn module_name(&self) -> &str {
        pack_or(&self.module_name, "app")
    }

    pub fn go_version(&self) -> &str {
        pack_or(&self.go_version, "1.18")
    }

    pub fn common_path(&self) -> String {
        path_or(&self.common_path, "common/")
    }

    pub fn common_pack(&self) -> &str {
        pack_or(&self.common_pack, "common")
    }

    pub fn common_dir(&self, dir: &str) -> String {
        format!("{dir}{}", self.common_path())
    }

    pub fn common_import(&self) -> String {
        self.pack_import(&self.common_path(), self.common_pack())
    }

    pub fn constant_path(&self) -> String {
        path_or(&self.constant_path, "constant/")
    }

    pub fn constant_pack(&self) -> &str {
        pack_or(&self.constant_pack, "constant")
    }

    pub fn constant_dir(&self, dir: &str) -> String {
        format!("{dir}{}", self.constant_path())
    }

    pub fn constant_import(&self) -> String {
        self.pack_import(&self.constant_path(), self.constant_pack())
    }

    pub fn error_path(&self) -> String {
        path_or(&self.error_path, "exception/")
    }

    pub fn error_pack(&self) -> &str {
        pack_or(&self.error_pack, "exception")
    }

    pub fn error_dir(&self, dir: &str) -> String {
        format!("{dir}{}", self.error_path())
    }

    pub fn error_import(&self) -> String {
        self.pack_import(&self.error_path(), self.error_pack())
    }

    pub fn struct_path(&self) -> String {
        path_or(&self.struct_path, "bean/")
    }

    pub fn struct_pack(&self) -> &str {
        pack_or(&self.struct_pack, "bean")
    }

    pub fn struct_dir(&self, dir: &str) -> String {
        format!("{dir}{}", self.struct_path())
    }

    pub fn struct_import(&self) -> String {
        self.pack_import(&self.struct_path(), self.struct_pack())
    }

    pub fn func_path(&self) -> String {
        path_or(&self.func_path, "tool/")
    }

    pub fn func_pack(&self) -> &str {
        pack_or(&self.func_pack, "tool")
    }

    pub fn func_dir(&self, dir: &str) -> String {
        format!("{dir}{}", self.func_path())
    }

    pub fn func_import(&self) -> String {
        self.pack_import(&self.func_path(), self.func_pack())
    }

    /// Builds the module-qualified import for a path/package pair: the
    /// module name, any parent segments of the path, then the package.
    pub fn pack_import(&self, path: &str, pack: &str) -> String {
        let path = path.trim_start_matches('/').trim_end_matches('/');
        let mut import = self.module_name().to_string();
        if let Some(dot) = path.rfind('/') {
            if dot > 0 {
                import.push('/');
                import.push_str(&path[..dot]);
            }
        }
        import.push('/');
        import.push_str(pack);
        import
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let model = LanguageGolangModel::default();
        assert_eq!(model.module_name(), "app");
        assert_eq!(model.go_version(), "1.18");
        assert_eq!(model.common_path(), "common/");
        assert_eq!(model.common_pack(), "common");
        assert_eq!(model.constant_path(), "constant/");
        assert_eq!(model.error_path(), "exception/");
        assert_eq!(model.error_pack(), "exception");
        assert_eq!(model.struct_path(), "bean/");
        assert_eq!(model.struct_pack(), "bean");
        assert_eq!(model.func_path(), "tool/");
        assert_eq!(model.func_pack(), "tool");
    }

    #[test]
    fn test_configured_path_gets_trailing_slash() {
        let model = LanguageGolangModel {
            struct_path: "entity".to_string(),
            ..Default::default()
        };
        assert_eq!(model.struct_path(), "entity/");

        let model = LanguageGolangModel {
            struct_path: "entity/".to_string(),
            ..Default::default()
        };
        assert_eq!(model.struct_path(), "entity/");
    }

    #[test]
    fn test_dir_joins_base_and_path() {
        let model = LanguageGolangModel::default();
        assert_eq!(model.struct_dir("out/"), "out/bean/");
        assert_eq!(model.func_dir("out/"), "out/tool/");
    }

    #[test]
    fn test_default_imports_are_module_qualified() {
        let model = LanguageGolangModel::default();
        assert_eq!(model.struct_import(), "app/bean");
        assert_eq!(model.error_import(), "app/exception");
    }

    #[test]
    fn test_import_uses_configured_module() {
        let model = LanguageGolangModel {
            module_name: "github.com/acme/svc".to_string(),
            ..Default::default()
        };
        assert_eq!(model.common_import(), "github.com/acme/svc/common");
    }

    #[test]
    fn test_import_keeps_parent_path_segments() {
        let model = LanguageGolangModel::default();
        assert_eq!(model.pack_import("internal/bean/", "bean"), "app/internal/bean");
    }

    #[test]
    fn test_json_round_trip() {
        let text = r#"{"moduleName":"svc","goVersion":"1.21","structPath":"entity"}"#;
        let model: LanguageGolangModel = serde_json::from_str(text).unwrap();
        assert_eq!(model.module_name(), "svc");
        assert_eq!(model.go_version(), "1.21");
        assert_eq!(model.struct_path(), "entity/");

        let out = serde_json::to_string(&model).unwrap();
        assert_eq!(out, text);
    }
}
