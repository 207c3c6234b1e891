/// The controller family reported by the device.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::IntoStaticStr,
    strum::VariantArray,
    strum::FromRepr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ProductType {
    /// Pellet boiler controllers (ecoMAX 8xxP and similar).
    EcomaxP = 0,
    /// Installation controllers (ecoMAX 8xxi and similar).
    EcomaxI = 1,
}

impl ProductType {
    /// Word used for the sub-devices of this product when naming entities.
    pub fn sub_device_noun(self) -> &'static str {
        match self {
            ProductType::EcomaxP => "mixer",
            ProductType::EcomaxI => "circuit",
        }
    }
}

/// Optional hardware modules that may be attached to the controller.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    clap::ValueEnum,
    strum::Display,
    strum::IntoStaticStr,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Module {
    ModuleA,
    ModuleB,
    ModuleC,
    Ecolambda,
    Ecoster,
    Panel,
}

/// Snapshot of the connected modules and their software versions.
///
/// A module is connected iff its field is `Some`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectedModules {
    #[serde(default)]
    pub module_a: Option<String>,
    #[serde(default)]
    pub module_b: Option<String>,
    #[serde(default)]
    pub module_c: Option<String>,
    #[serde(default)]
    pub ecolambda: Option<String>,
    #[serde(default)]
    pub ecoster: Option<String>,
    #[serde(default)]
    pub panel: Option<String>,
}

impl ConnectedModules {
    pub fn version_of(&self, module: Module) -> Option<&str> {
        let field = match module {
            Module::ModuleA => &self.module_a,
            Module::ModuleB => &self.module_b,
            Module::ModuleC => &self.module_c,
            Module::Ecolambda => &self.ecolambda,
            Module::Ecoster => &self.ecoster,
            Module::Panel => &self.panel,
        };
        field.as_deref()
    }

    pub fn is_connected(&self, module: Module) -> bool {
        self.version_of(module).is_some()
    }

    /// Build a snapshot where the listed modules are reported with an unknown version.
    pub fn from_present(modules: &[Module]) -> Self {
        let mut result = Self::default();
        for module in modules {
            let field = match module {
                Module::ModuleA => &mut result.module_a,
                Module::ModuleB => &mut result.module_b,
                Module::ModuleC => &mut result.module_c,
                Module::Ecolambda => &mut result.ecolambda,
                Module::Ecoster => &mut result.ecoster,
                Module::Panel => &mut result.panel,
            };
            *field = Some(String::from("unknown"));
        }
        result
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProductInfo {
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub uid: String,
    pub model: String,
    #[serde(default)]
    pub software: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::VariantArray as _;

    #[test]
    fn module_presence_follows_fields() {
        let modules = ConnectedModules {
            module_a: Some("6.10.32.K1".into()),
            ecolambda: Some("0.8.0".into()),
            ..Default::default()
        };
        assert!(modules.is_connected(Module::ModuleA));
        assert!(modules.is_connected(Module::Ecolambda));
        assert!(!modules.is_connected(Module::ModuleB));
        assert!(!modules.is_connected(Module::Ecoster));
        assert_eq!(modules.version_of(Module::Ecolambda), Some("0.8.0"));
    }

    #[test]
    fn from_present_sets_exactly_the_listed_modules() {
        let modules = ConnectedModules::from_present(&[Module::Panel, Module::ModuleC]);
        for &module in Module::VARIANTS {
            let expected = matches!(module, Module::Panel | Module::ModuleC);
            assert_eq!(modules.is_connected(module), expected, "{module}");
        }
    }

    #[test]
    fn product_info_deserializes() {
        let info: ProductInfo = serde_json::from_value(serde_json::json!({
            "type": "ecomax_i",
            "uid": "D251PAKR3GCPZ1K8G05G0",
            "model": "ecoMAX 860i3",
        }))
        .unwrap();
        assert_eq!(info.product_type, ProductType::EcomaxI);
        assert_eq!(info.software, None);
        assert_eq!(ProductType::from_repr(0), Some(ProductType::EcomaxP));
        assert_eq!(ProductType::EcomaxI.to_string(), "ecomax_i");
    }
}
