//! The substitution vocabulary: regions → prefectures → cities, plus the flat
//! service and role dimensions.
//!
//! A model is built once and then handed to the engine whole; the engine never
//! merges two models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dimension::DataSource;

/// Region assigned to prefectures declared without one.
pub const UNASSIGNED_REGION: &str = "unassigned";

/// Built-in taxonomy used until a hierarchy file replaces it.
const BUILTIN_PREFECTURES: &[(&str, &str)] = &[
    ("hokkaido", "hokkaido"),
    ("miyagi", "tohoku"),
    ("tokyo", "kanto"),
    ("kanagawa", "kanto"),
    ("saitama", "kanto"),
    ("chiba", "kanto"),
    ("aichi", "chubu"),
    ("osaka", "kansai"),
    ("kyoto", "kansai"),
    ("hyogo", "kansai"),
    ("hiroshima", "chugoku"),
    ("ehime", "shikoku"),
    ("fukuoka", "kyushu"),
];

const BUILTIN_CITIES: &[(&str, &str)] = &[
    ("sapporo", "hokkaido"),
    ("sendai", "miyagi"),
    ("shinjuku", "tokyo"),
    ("shibuya", "tokyo"),
    ("yokohama", "kanagawa"),
    ("nagoya", "aichi"),
    ("umeda", "osaka"),
    ("namba", "osaka"),
    ("kobe", "hyogo"),
    ("hakata", "fukuoka"),
];

const BUILTIN_SERVICES: &[&str] = &["auth", "gateway", "api", "cache", "db"];

const BUILTIN_ROLES: &[&str] = &["primary", "replica", "standby"];

/// Dimension data for expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyModel {
    regions: Vec<String>,
    prefectures: BTreeMap<String, String>,
    cities: BTreeMap<String, String>,
    services: Vec<String>,
    roles: Vec<String>,
}

impl HierarchyModel {
    /// A model with no items in any dimension.
    pub fn empty() -> Self {
        Self {
            regions: Vec::new(),
            prefectures: BTreeMap::new(),
            cities: BTreeMap::new(),
            services: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// The built-in Japanese taxonomy.
    pub fn builtin() -> Self {
        let mut model = Self::empty();
        for (prefecture, region) in BUILTIN_PREFECTURES {
            model = model.with_prefecture(*prefecture, *region);
        }
        for (city, prefecture) in BUILTIN_CITIES {
            model = model.with_city(*city, *prefecture);
        }
        for service in BUILTIN_SERVICES {
            model = model.with_service(*service);
        }
        for role in BUILTIN_ROLES {
            model = model.with_role(*role);
        }
        model
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        push_unique(&mut self.regions, region.into());
        self
    }

    /// Add a prefecture; its region is added to `regions` if missing.
    pub fn with_prefecture(mut self, name: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        push_unique(&mut self.regions, region.clone());
        self.prefectures.insert(name.into(), region);
        self
    }

    pub fn with_city(mut self, name: impl Into<String>, prefecture: impl Into<String>) -> Self {
        self.cities.insert(name.into(), prefecture.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        push_unique(&mut self.services, service.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        push_unique(&mut self.roles, role.into());
        self
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn prefectures(&self) -> &BTreeMap<String, String> {
        &self.prefectures
    }

    pub fn cities(&self) -> &BTreeMap<String, String> {
        &self.cities
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Items of a taxonomy dimension. `None` for custom dimensions.
    pub fn items(&self, source: &DataSource) -> Option<Vec<String>> {
        match source {
            DataSource::Regions => Some(self.regions.clone()),
            DataSource::Prefectures => Some(self.prefectures.keys().cloned().collect()),
            DataSource::Cities => Some(self.cities.keys().cloned().collect()),
            DataSource::Services => Some(self.services.clone()),
            DataSource::Roles => Some(self.roles.clone()),
            DataSource::Named(_) => None,
        }
    }

    /// Region an item belongs to: a region is its own region, a prefecture
    /// maps directly, a city maps through its prefecture.
    pub fn region_of(&self, item: &str) -> Option<&str> {
        if let Some(region) = self.prefectures.get(item) {
            return Some(region.as_str());
        }
        if let Some(prefecture) = self.cities.get(item) {
            return self.prefectures.get(prefecture).map(String::as_str);
        }
        self.regions
            .iter()
            .find(|region| region.as_str() == item)
            .map(String::as_str)
    }

    /// Region → prefectures, in region declaration order.
    pub fn prefectures_by_region(&self) -> Vec<(String, Vec<String>)> {
        self.regions
            .iter()
            .map(|region| {
                let prefectures = self
                    .prefectures
                    .iter()
                    .filter(|(_, r)| *r == region)
                    .map(|(name, _)| name.clone())
                    .collect();
                (region.clone(), prefectures)
            })
            .collect()
    }
}

impl Default for HierarchyModel {
    fn default() -> Self {
        Self::builtin()
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}
