//! Static Route Catalog.
//!
//! The routes and their highlighted stages ship with the binary as JSON and are
//! read-only at runtime. Quotations reference routes by id, but nothing checks
//! a quotation's route id against this catalog.

use serde::{Deserialize, Serialize};

const EMBEDDED_CATALOG: &str = include_str!("../data/camino_routes.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Challenging,
    Difficult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elevation {
    pub ascent: u32,
    pub descent: u32,
    pub highest: u32,
    pub lowest: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStage {
    pub id: String,
    pub stage_number: u32,
    pub name: String,
    pub description: String,
    pub distance: f64,
    pub estimated_time: String,
    pub difficulty: Difficulty,
    pub elevation: Elevation,
    pub start_point: String,
    pub end_point: String,
    pub terrain: String,
    pub highlights: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRoute {
    pub id: String,
    pub name: String,
    pub name_es: String,
    pub description: String,
    pub distance: f64,
    pub estimated_days: u32,
    pub difficulty: Difficulty,
    pub start_location: String,
    pub end_location: String,
    pub highlights: Vec<String>,
    pub best_months: Vec<String>,
    pub stages: Vec<CatalogStage>,
}

/// Route listing entry without the stage payload.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub name_es: &'a str,
    pub description: &'a str,
    pub distance: f64,
    pub estimated_days: u32,
    pub difficulty: Difficulty,
    pub start_location: &'a str,
    pub end_location: &'a str,
    pub stage_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteCatalog {
    routes: Vec<CatalogRoute>,
}

impl RouteCatalog {
    /// Loads the catalog compiled into the binary.
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let catalog: RouteCatalog = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Route catalog is malformed: {}", e))?;
        Ok(catalog)
    }

    pub fn routes(&self) -> &[CatalogRoute] {
        &self.routes
    }

    pub fn summaries(&self) -> Vec<RouteSummary<'_>> {
        self.routes
            .iter()
            .map(|r| RouteSummary {
                id: &r.id,
                name: &r.name,
                name_es: &r.name_es,
                description: &r.description,
                distance: r.distance,
                estimated_days: r.estimated_days,
                difficulty: r.difficulty,
                start_location: &r.start_location,
                end_location: &r.end_location,
                stage_count: r.stages.len(),
            })
            .collect()
    }

    pub fn find_route_by_id(&self, id: &str) -> Option<&CatalogRoute> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Finds a stage anywhere in the catalog, with the route it belongs to.
    pub fn find_stage_by_id(&self, stage_id: &str) -> Option<(&CatalogRoute, &CatalogStage)> {
        self.routes.iter().find_map(|route| {
            route
                .stages
                .iter()
                .find(|s| s.id == stage_id)
                .map(|stage| (route, stage))
        })
    }

    /// Display name for a route id; unknown ids are shown as-is.
    pub fn route_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.find_route_by_id(id).map(|r| r.name.as_str()).unwrap_or(id)
    }
}
