// src/catalog/mod.rs

mod types;

pub use types::*;

use crate::{error::*, hasher::HashAlgorithm, utils};
use itertools::Itertools;
use log::{debug, warn};
use std::{collections::BTreeMap, sync::LazyLock};

static BUILTIN_DRIVERS: LazyLock<Vec<DriverDescriptor>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("drivers.json")).expect("内置驱动目录格式错误")
});

/// 品牌关键字，按顺序匹配，第一个命中的品牌胜出。
/// 型号前缀可能同时出现在兼容机型的名称里，因此顺序即优先级。
const BRAND_KEYWORDS: &[(Brand, &[&str])] = &[
    (Brand::Epson, &["epson", "tm-t", "tm-m", "tm-u"]),
    (Brand::Star, &["star micronics", "star ", "tsp", "mc-print"]),
    (Brand::Bixolon, &["bixolon", "srp-", "spp-"]),
    (Brand::Citizen, &["citizen", "ct-s", "ct-e"]),
    (Brand::Rongta, &["rongta", "rp80", "rp326"]),
    (Brand::Xprinter, &["xprinter", "xp-"]),
];

/// 根据打印机上报的名称推断品牌（忽略大小写的子串匹配）
pub fn detect_brand(printer_name: &str) -> Option<Brand> {
    let name = printer_name.to_lowercase();
    BRAND_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(brand, _)| *brand)
}

fn normalize_model(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// 为某个平台解析出的具体下载/安装信息
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPackage {
    pub driver_id: String,
    pub platform: Platform,
    pub url: String,
    pub file_name: String,
    pub hash: Option<String>,
    pub algorithm: HashAlgorithm,
    pub size: Option<u64>,
    pub install: CommandSpec,
    pub check: Option<CheckSpec>,
}

/// 只读驱动目录，进程启动时加载一次
#[derive(Debug, Clone)]
pub struct DriverCatalog {
    drivers: Vec<DriverDescriptor>,
}

impl DriverCatalog {
    pub fn builtin() -> Self {
        Self {
            drivers: BUILTIN_DRIVERS.clone(),
        }
    }

    pub fn from_descriptors(drivers: Vec<DriverDescriptor>) -> Self {
        Self { drivers }
    }

    /// 合并额外的描述，同 ID 覆盖已有条目
    pub fn with_extra(mut self, extra: Vec<DriverDescriptor>) -> Self {
        for descriptor in extra {
            if let Some(existing) = self.drivers.iter_mut().find(|d| d.id == descriptor.id) {
                warn!("配置中的驱动 '{}' 覆盖了内置条目", descriptor.id);
                *existing = descriptor;
            } else {
                debug!("从配置加载额外驱动 '{}'", descriptor.id);
                self.drivers.push(descriptor);
            }
        }
        self
    }

    pub fn all(&self) -> &[DriverDescriptor] {
        &self.drivers
    }

    pub fn get(&self, id: &str) -> Option<&DriverDescriptor> {
        self.drivers.iter().find(|d| d.id == id)
    }

    pub fn require(&self, id: &str) -> AppResult<&DriverDescriptor> {
        self.get(id)
            .ok_or_else(|| AppError::UnknownDriver(id.to_string()))
    }

    /// 按品牌分组，组内按型号排序，用于展示
    pub fn by_brand(&self) -> BTreeMap<Brand, Vec<&DriverDescriptor>> {
        self.drivers
            .iter()
            .into_group_map_by(|d| d.brand)
            .into_iter()
            .map(|(brand, mut group)| {
                group.sort_by(|a, b| a.model.cmp(&b.model));
                (brand, group)
            })
            .collect()
    }

    pub fn for_platform(&self, platform: Platform) -> Vec<&DriverDescriptor> {
        self.drivers
            .iter()
            .filter(|d| d.packages.get(platform).is_some())
            .collect()
    }

    /// 为系统中发现的打印机推荐驱动: 先识别品牌，再把型号出现在名称中的排在前面
    pub fn suggest_for_printer(&self, printer_name: &str) -> Vec<&DriverDescriptor> {
        let Some(brand) = detect_brand(printer_name) else {
            return vec![];
        };
        let name = normalize_model(printer_name);
        self.drivers
            .iter()
            .filter(|d| d.brand == brand)
            .sorted_by_key(|d| (!name.contains(&normalize_model(&d.model)), d.model.clone()))
            .collect()
    }

    /// 把目录条目解析为某个平台上的具体下载请求参数
    pub fn resolve(&self, id: &str, platform: Platform) -> AppResult<ResolvedPackage> {
        let descriptor = self.require(id)?;
        let package = descriptor.package_for(platform)?;
        let file_name = utils::file_name_from_url(&package.url)?;
        Ok(ResolvedPackage {
            driver_id: descriptor.id.clone(),
            platform,
            url: package.url.clone(),
            file_name,
            hash: package.hash.clone(),
            algorithm: package.algorithm,
            size: package.size,
            install: package.install.clone(),
            check: package.check.clone(),
        })
    }
}

impl Default for DriverCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_well_formed() {
        let catalog = DriverCatalog::builtin();
        assert!(!catalog.all().is_empty());
        let ids: Vec<_> = catalog.all().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), ids.iter().unique().count(), "驱动 ID 必须唯一");
        for d in catalog.all() {
            assert!(!d.packages.platforms().is_empty(), "{} 没有任何平台包", d.id);
            for p in d.packages.platforms() {
                let resolved = catalog.resolve(&d.id, p).unwrap();
                assert!(!resolved.file_name.is_empty());
            }
        }
    }

    #[test]
    fn test_detect_brand() {
        assert_eq!(detect_brand("EPSON TM-T20III Receipt"), Some(Brand::Epson));
        assert_eq!(detect_brand("Star TSP143IIIU"), Some(Brand::Star));
        assert_eq!(detect_brand("BIXOLON SRP-350III"), Some(Brand::Bixolon));
        assert_eq!(detect_brand("ct-s310ii"), Some(Brand::Citizen));
        assert_eq!(detect_brand("XP-80C (copy 1)"), Some(Brand::Xprinter));
        assert_eq!(detect_brand("HP LaserJet 400"), None);
    }

    #[test]
    fn test_detect_brand_first_match_wins() {
        // 兼容 TM-T88 指令集的 BIXOLON 机型，EPSON 的型号前缀排在前面
        assert_eq!(
            detect_brand("BIXOLON SRP-350 (TM-T88 emulation)"),
            Some(Brand::Epson)
        );
    }

    #[test]
    fn test_lookup_and_grouping() {
        let catalog = DriverCatalog::builtin();
        assert_eq!(catalog.get("epson-tm-t20iii").unwrap().brand, Brand::Epson);
        assert!(catalog.get("nope").is_none());
        assert!(matches!(catalog.require("nope"), Err(AppError::UnknownDriver(_))));

        let grouped = catalog.by_brand();
        let epson = &grouped[&Brand::Epson];
        assert_eq!(epson.len(), 2);
        assert_eq!(epson[0].model, "TM-T20III");
        assert_eq!(grouped.values().map(Vec::len).sum::<usize>(), catalog.all().len());
    }

    #[test]
    fn test_suggest_prefers_model_match() {
        let catalog = DriverCatalog::builtin();
        let suggestions = catalog.suggest_for_printer("EPSON TM-T88VI Receipt5");
        assert_eq!(suggestions[0].id, "epson-tm-t88vi");
        assert!(suggestions.iter().all(|d| d.brand == Brand::Epson));
        assert!(catalog.suggest_for_printer("Generic Text Only").is_empty());
    }

    #[test]
    fn test_resolve_unsupported_platform() {
        let catalog = DriverCatalog::builtin();
        let err = catalog.resolve("xprinter-xp-365b", Platform::Macos).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedPlatform { .. }));
    }

    #[test]
    fn test_with_extra_overrides_by_id() {
        let mut custom = DriverCatalog::builtin().get("rongta-rp80").unwrap().clone();
        custom.model = "RP80-Custom".into();
        let mut new_entry = custom.clone();
        new_entry.id = "rongta-rp326".into();

        let catalog = DriverCatalog::builtin().with_extra(vec![custom, new_entry]);
        assert_eq!(catalog.get("rongta-rp80").unwrap().model, "RP80-Custom");
        assert!(catalog.get("rongta-rp326").is_some());
        assert_eq!(catalog.all().len(), DriverCatalog::builtin().all().len() + 1);
    }
}
