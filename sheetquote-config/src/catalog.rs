use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, PricingConfig};

const BUILTIN_CATALOG: &str = include_str!("../materials.toml");

/// 单个材料的费率。切割单价按米计，板材单价按平方米计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRate {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub cut_cost_per_meter: f64,
    pub sheet_cost_per_square_meter: f64,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "material")]
    materials: Vec<MaterialRate>,
}

/// 材料费率表，构造后只读，可在线程间共享。
#[derive(Debug, Clone)]
pub struct MaterialCatalog {
    rates: Vec<MaterialRate>,
    index: HashMap<String, usize>,
}

impl MaterialCatalog {
    /// 内置的 25 项材料表。
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// 若配置指定了外部材料表则加载之，否则使用内置表。
    pub fn load(config: &PricingConfig) -> Result<Self, ConfigError> {
        match &config.catalog_path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_rates(file.materials)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|err| ConfigError::InvalidCatalog(err.to_string()))?;
        Self::from_rates(file.materials)
    }

    /// 校验编码唯一、费率为非负有限值。
    pub fn from_rates(rates: Vec<MaterialRate>) -> Result<Self, ConfigError> {
        if rates.is_empty() {
            return Err(ConfigError::InvalidCatalog("未定义任何材料".to_string()));
        }
        let mut index = HashMap::with_capacity(rates.len());
        for (position, rate) in rates.iter().enumerate() {
            if rate.code.trim().is_empty() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "第 {} 项材料缺少编码",
                    position + 1
                )));
            }
            for (label, value) in [
                ("cut_cost_per_meter", rate.cut_cost_per_meter),
                ("sheet_cost_per_square_meter", rate.sheet_cost_per_square_meter),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::InvalidCatalog(format!(
                        "材料 {} 的 {label} 无效：{value}",
                        rate.code
                    )));
                }
            }
            if index.insert(rate.code.clone(), position).is_some() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "材料编码 {} 重复",
                    rate.code
                )));
            }
        }
        Ok(Self { rates, index })
    }

    /// 按编码精确查找（区分大小写）。
    pub fn get(&self, code: &str) -> Option<&MaterialRate> {
        self.index.get(code).map(|&position| &self.rates[position])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialRate> {
        self.rates.iter()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
