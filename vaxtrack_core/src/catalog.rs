//! Vaccine catalog graph.
//!
//! Vaccines live in a flat arena; prerequisite, suite and rappel edges refer
//! to them by arena index. A catalog is validated wholesale at load time and
//! rejected with [`Error::InvalidCatalog`] if any edge dangles, any delay is
//! negative or beyond [`MAX_DELAY_DAYS`], or the strict prerequisite subgraph
//! contains a cycle.

use crate::{
    Error, MinAge, PrerequisiteEdge, Rappel, RappelDef, RappelKey, Requirement, Result,
    SuiteEdge, SuiteKind, Vaccine, VaccineId,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Validated, immutable vaccine catalog
#[derive(Clone, Debug)]
pub struct Catalog {
    vaccines: Vec<Vaccine>,
    index: HashMap<VaccineId, usize>,
    prerequisites: Vec<PrerequisiteEdge>,
    prerequisites_by_vaccine: Vec<Vec<usize>>,
    suites: Vec<SuiteEdge>,
    suites_by_vaccine: Vec<Vec<usize>>,
    rappels: Vec<Vec<Rappel>>,
    warnings: Vec<String>,
}

impl Catalog {
    /// Build and validate a catalog from vaccine and edge lists.
    ///
    /// Every problem found is reported at once; nothing is partially loaded.
    pub fn load(
        vaccines: Vec<Vaccine>,
        prerequisites: Vec<PrerequisiteEdge>,
        suites: Vec<SuiteEdge>,
        rappels_by_vaccine: HashMap<VaccineId, Vec<RappelDef>>,
    ) -> Result<Self> {
        let mut errors = Vec::new();
        let mut index = HashMap::new();

        for (i, vaccine) in vaccines.iter().enumerate() {
            if vaccine.id.is_empty() {
                errors.push(format!("vaccine at position {} has empty id", i));
                continue;
            }
            if vaccine.name.is_empty() {
                errors.push(format!("vaccine '{}' has empty name", vaccine.id));
            }
            if let (Some(arrival), Some(expiry)) = (vaccine.arrival_date, vaccine.expiry_date) {
                if expiry < arrival {
                    errors.push(format!(
                        "vaccine '{}' expires ({}) before it arrives ({})",
                        vaccine.id, expiry, arrival
                    ));
                }
            }
            if index.insert(vaccine.id.clone(), i).is_some() {
                errors.push(format!("duplicate vaccine id '{}'", vaccine.id));
            }
        }

        let mut prerequisites_by_vaccine = vec![Vec::new(); vaccines.len()];
        let mut strict_adjacency = vec![Vec::new(); vaccines.len()];
        for (edge_idx, edge) in prerequisites.iter().enumerate() {
            let from = index.get(&edge.vaccine_id).copied();
            let to = index.get(&edge.prerequisite_id).copied();
            match (from, to) {
                (Some(from), Some(to)) => {
                    prerequisites_by_vaccine[from].push(edge_idx);
                    if edge.requirement.is_strict() {
                        strict_adjacency[from].push(to);
                    }
                }
                _ => errors.push(format!(
                    "prerequisite edge '{}' -> '{}' references an unknown vaccine",
                    edge.vaccine_id, edge.prerequisite_id
                )),
            }
        }

        let mut rappels: Vec<Vec<Rappel>> = vec![Vec::new(); vaccines.len()];
        let mut rappel_owners: Vec<&VaccineId> = rappels_by_vaccine.keys().collect();
        rappel_owners.sort();
        for owner in rappel_owners {
            let Some(&owner_idx) = index.get(owner) else {
                errors.push(format!("rappels declared for unknown vaccine '{}'", owner));
                continue;
            };
            for (position, def) in rappels_by_vaccine[owner].iter().enumerate() {
                let delay_days = match delay_in_range(def.delay_days) {
                    Ok(days) => days,
                    Err(problem) => {
                        errors.push(format!("rappel {} of '{}' has {}", position, owner, problem));
                        continue;
                    }
                };
                if let Some(linked) = &def.vaccine_id {
                    if !index.contains_key(linked) {
                        errors.push(format!(
                            "rappel {} of '{}' links unknown vaccine '{}'",
                            position, owner, linked
                        ));
                    }
                }
                rappels[owner_idx].push(Rappel {
                    key: RappelKey {
                        parent_vaccine_id: owner.clone(),
                        index: position,
                    },
                    delay_days,
                    description: def.description.clone(),
                    linked_vaccine_id: def.vaccine_id.clone(),
                });
            }
        }

        let mut suites = suites;
        for edge in &suites {
            if !index.contains_key(&edge.vaccine_id) || !index.contains_key(&edge.next_vaccine_id) {
                errors.push(format!(
                    "suite edge '{}' -> '{}' references an unknown vaccine",
                    edge.vaccine_id, edge.next_vaccine_id
                ));
                continue;
            }
            if let Err(problem) = delay_in_range(edge.delay_days) {
                errors.push(format!(
                    "suite edge '{}' -> '{}' has {}",
                    edge.vaccine_id, edge.next_vaccine_id, problem
                ));
            }
            if edge.kind == SuiteKind::Rappel {
                let parent = index[&edge.vaccine_id];
                let linked = rappels[parent]
                    .iter()
                    .any(|r| r.linked_vaccine_id.as_ref() == Some(&edge.next_vaccine_id));
                if !linked {
                    errors.push(format!(
                        "rappel edge '{}' -> '{}' has no matching rappel entry on '{}'",
                        edge.vaccine_id, edge.next_vaccine_id, edge.vaccine_id
                    ));
                }
            }
        }

        // Linked rappels imply rappel edges
        for owner in &rappels {
            for rappel in owner {
                let Some(linked) = &rappel.linked_vaccine_id else {
                    continue;
                };
                let parent = &rappel.key.parent_vaccine_id;
                let exists = suites.iter().any(|e| {
                    e.kind == SuiteKind::Rappel
                        && &e.vaccine_id == parent
                        && &e.next_vaccine_id == linked
                });
                if !exists {
                    suites.push(SuiteEdge {
                        vaccine_id: parent.clone(),
                        next_vaccine_id: linked.clone(),
                        requirement: Requirement::Strict,
                        delay_days: i64::from(rappel.delay_days),
                        kind: SuiteKind::Rappel,
                    });
                }
            }
        }

        let mut suites_by_vaccine = vec![Vec::new(); vaccines.len()];
        for (edge_idx, edge) in suites.iter().enumerate() {
            if let Some(&from) = index.get(&edge.vaccine_id) {
                suites_by_vaccine[from].push(edge_idx);
            }
        }

        for cycle in find_strict_cycles(&strict_adjacency) {
            let names: Vec<&str> = cycle.iter().map(|&i| vaccines[i].id.as_str()).collect();
            errors.push(format!("strict prerequisite cycle: {}", names.join(" -> ")));
        }

        if !errors.is_empty() {
            tracing::error!("Rejecting catalog with {} problem(s)", errors.len());
            return Err(Error::InvalidCatalog(errors));
        }

        let warnings = ambiguous_rappel_parents(&suites);
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        tracing::info!(
            "Loaded catalog: {} vaccines, {} prerequisites, {} suites",
            vaccines.len(),
            prerequisites.len(),
            suites.len()
        );

        Ok(Self {
            vaccines,
            index,
            prerequisites,
            prerequisites_by_vaccine,
            suites,
            suites_by_vaccine,
            rappels,
            warnings,
        })
    }

    /// Vaccines in catalog insertion order
    pub fn vaccines(&self) -> impl Iterator<Item = &Vaccine> {
        self.vaccines.iter()
    }

    pub fn len(&self) -> usize {
        self.vaccines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaccines.is_empty()
    }

    pub fn vaccine(&self, id: &str) -> Option<&Vaccine> {
        self.index.get(id).map(|&i| &self.vaccines[i])
    }

    /// Like [`Catalog::vaccine`] but unknown ids are a `NotFound` error
    pub fn require_vaccine(&self, id: &str) -> Result<&Vaccine> {
        self.vaccine(id)
            .ok_or_else(|| Error::NotFound(format!("vaccine '{}'", id)))
    }

    /// Prerequisite edges whose `vaccine_id` is `id`, in insertion order
    pub fn prerequisites_of(&self, id: &str) -> impl Iterator<Item = &PrerequisiteEdge> {
        self.index
            .get(id)
            .map(|&i| self.prerequisites_by_vaccine[i].as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&e| &self.prerequisites[e])
    }

    /// Suite edges leaving `id`, including rappel edges
    pub fn suites_from(&self, id: &str) -> impl Iterator<Item = &SuiteEdge> {
        self.index
            .get(id)
            .map(|&i| self.suites_by_vaccine[i].as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&e| &self.suites[e])
    }

    pub fn suites(&self) -> &[SuiteEdge] {
        &self.suites
    }

    /// Ordered rappel schedule of a vaccine (empty for unknown ids)
    pub fn rappels_of(&self, id: &str) -> &[Rappel] {
        self.index
            .get(id)
            .map(|&i| self.rappels[i].as_slice())
            .unwrap_or(&[])
    }

    /// Initial dose plus every rappel
    pub fn max_doses(&self, id: &str) -> usize {
        self.rappels_of(id).len() + 1
    }

    /// Parent of a booster SKU: the first rappel edge (insertion order)
    /// pointing at `candidate`
    pub fn rappel_parent_of(&self, candidate: &str) -> Option<&VaccineId> {
        self.suites
            .iter()
            .find(|e| e.kind == SuiteKind::Rappel && e.next_vaccine_id == candidate)
            .map(|e| &e.vaccine_id)
    }

    /// Vaccines that list `prerequisite_id` as a strict prerequisite
    pub fn strict_dependents_of(&self, prerequisite_id: &str) -> Vec<&VaccineId> {
        self.prerequisites
            .iter()
            .filter(|e| e.requirement.is_strict() && e.prerequisite_id == prerequisite_id)
            .map(|e| &e.vaccine_id)
            .collect()
    }

    /// Every prerequisite edge naming `prerequisite_id`, strict or not
    pub fn required_by(&self, prerequisite_id: &str) -> Vec<&PrerequisiteEdge> {
        self.prerequisites
            .iter()
            .filter(|e| e.prerequisite_id == prerequisite_id)
            .collect()
    }

    /// Follow-up suite edges arriving at `id`. Rappel edges are left out.
    pub fn pre_suites_of(&self, id: &str) -> Vec<&SuiteEdge> {
        self.suites
            .iter()
            .filter(|e| e.kind == SuiteKind::FollowUp && e.next_vaccine_id == id)
            .collect()
    }

    /// Non-fatal findings from load (e.g. ambiguous rappel parents)
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Parse a TOML catalog document and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let document: CatalogDocument = toml::from_str(contents)?;
        document.into_catalog()
    }

    /// Load a TOML catalog document from disk
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&contents)?;
        tracing::info!("Loaded catalog from {:?}", path);
        Ok(catalog)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Longest delay a rappel or suite may carry (100 years)
pub const MAX_DELAY_DAYS: i64 = 36_525;

fn delay_in_range(delay_days: i64) -> std::result::Result<u32, String> {
    if delay_days < 0 {
        return Err(format!("negative delay {}", delay_days));
    }
    if delay_days > MAX_DELAY_DAYS {
        return Err(format!(
            "delay {} beyond the {} day limit",
            delay_days, MAX_DELAY_DAYS
        ));
    }
    u32::try_from(delay_days).map_err(|_| format!("delay {} out of range", delay_days))
}

/// Three-color DFS over the strict prerequisite subgraph.
/// Returns each cycle found as a closed path of arena indices.
fn find_strict_cycles(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    fn dfs(
        node: usize,
        adjacency: &[Vec<usize>],
        color: &mut [Color],
        stack: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        color[node] = Color::Gray;
        stack.push(node);
        for &next in &adjacency[node] {
            match color[next] {
                Color::Gray => {
                    let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    out.push(cycle);
                }
                Color::White => dfs(next, adjacency, color, stack, out),
                Color::Black => {}
            }
        }
        stack.pop();
        color[node] = Color::Black;
    }

    let mut color = vec![Color::White; adjacency.len()];
    let mut cycles = Vec::new();
    for node in 0..adjacency.len() {
        if color[node] == Color::White {
            dfs(node, adjacency, &mut color, &mut Vec::new(), &mut cycles);
        }
    }
    cycles
}

fn ambiguous_rappel_parents(suites: &[SuiteEdge]) -> Vec<String> {
    let mut parents: Vec<(&VaccineId, Vec<&VaccineId>)> = Vec::new();
    for edge in suites.iter().filter(|e| e.kind == SuiteKind::Rappel) {
        match parents.iter_mut().find(|(next, _)| *next == &edge.next_vaccine_id) {
            Some((_, list)) => {
                if !list.contains(&&edge.vaccine_id) {
                    list.push(&edge.vaccine_id);
                }
            }
            None => parents.push((&edge.next_vaccine_id, vec![&edge.vaccine_id])),
        }
    }
    parents
        .into_iter()
        .filter(|(_, list)| list.len() > 1)
        .map(|(next, list)| {
            let names: Vec<&str> = list.iter().map(|s| s.as_str()).collect();
            format!(
                "vaccine '{}' is a rappel of several parents ({}); '{}' wins",
                next,
                names.join(", "),
                names[0]
            )
        })
        .collect()
}

// ============================================================================
// TOML Document
// ============================================================================

/// On-disk catalog layout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub vaccines: Vec<VaccineEntry>,
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteEdge>,
    #[serde(default)]
    pub suites: Vec<SuiteEdge>,
}

/// A vaccine together with its rappel schedule, as written in the document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaccineEntry {
    pub id: VaccineId,
    pub name: String,
    #[serde(default)]
    pub antigen_duration_days: u32,
    #[serde(default)]
    pub arrival_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub min_age: MinAge,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rappels: Vec<RappelDef>,
}

impl VaccineEntry {
    fn into_parts(self) -> (Vaccine, Vec<RappelDef>) {
        (
            Vaccine {
                id: self.id,
                name: self.name,
                antigen_duration_days: self.antigen_duration_days,
                arrival_date: self.arrival_date,
                expiry_date: self.expiry_date,
                lot: self.lot,
                stock: self.stock,
                min_age: self.min_age,
                description: self.description,
            },
            self.rappels,
        )
    }
}

impl CatalogDocument {
    pub fn into_catalog(self) -> Result<Catalog> {
        let mut vaccines = Vec::with_capacity(self.vaccines.len());
        let mut rappels = HashMap::new();
        let mut seen = HashSet::new();
        for entry in self.vaccines {
            let (vaccine, defs) = entry.into_parts();
            // Duplicates are reported by Catalog::load; keep the first schedule
            if !defs.is_empty() && seen.insert(vaccine.id.clone()) {
                rappels.insert(vaccine.id.clone(), defs);
            }
            vaccines.push(vaccine);
        }
        Catalog::load(vaccines, self.prerequisites, self.suites, rappels)
    }
}

// ============================================================================
// Default Catalog
// ============================================================================

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<std::result::Result<Catalog, Vec<String>>> =
    Lazy::new(|| match build_default_catalog() {
        Ok(catalog) => Ok(catalog),
        Err(Error::InvalidCatalog(problems)) => Err(problems),
        Err(e) => Err(vec![e.to_string()]),
    });

/// Get a reference to the cached built-in catalog
pub fn get_default_catalog() -> Result<&'static Catalog> {
    DEFAULT_CATALOG
        .as_ref()
        .map_err(|problems| Error::InvalidCatalog(problems.clone()))
}

/// Builds the built-in EPI-style pediatric schedule
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference.
pub fn build_default_catalog() -> Result<Catalog> {
    default_document().into_catalog()
}

fn entry(id: &str, name: &str, min_age: MinAge, rappels: &[(i64, &str)]) -> VaccineEntry {
    VaccineEntry {
        id: id.into(),
        name: name.into(),
        antigen_duration_days: 0,
        arrival_date: None,
        expiry_date: None,
        lot: None,
        stock: None,
        min_age,
        description: String::new(),
        rappels: rappels
            .iter()
            .map(|&(delay_days, description)| RappelDef {
                delay_days,
                description: description.into(),
                vaccine_id: None,
            })
            .collect(),
    }
}

fn prerequisite(vaccine: &str, prerequisite: &str, requirement: Requirement) -> PrerequisiteEdge {
    PrerequisiteEdge {
        vaccine_id: vaccine.into(),
        prerequisite_id: prerequisite.into(),
        requirement,
    }
}

fn suite(from: &str, next: &str, requirement: Requirement, delay_days: i64) -> SuiteEdge {
    SuiteEdge {
        vaccine_id: from.into(),
        next_vaccine_id: next.into(),
        requirement,
        delay_days,
        kind: SuiteKind::FollowUp,
    }
}

fn default_document() -> CatalogDocument {
    let six_weeks = MinAge::new(0, 0, 42);
    let fourteen_weeks = MinAge::new(0, 0, 98);
    let nine_months = MinAge::new(0, 9, 0);

    CatalogDocument {
        vaccines: vec![
            entry("bcg", "BCG", MinAge::default(), &[]),
            entry("vpo0", "VPO 0 (polio oral, naissance)", MinAge::default(), &[]),
            entry(
                "penta1",
                "Pentavalent (DTC-HepB-Hib)",
                six_weeks,
                &[(30, "Penta 2"), (60, "Penta 3")],
            ),
            entry(
                "vpo1",
                "VPO 1 (polio oral)",
                six_weeks,
                &[(28, "VPO 2"), (56, "VPO 3")],
            ),
            entry(
                "pcv1",
                "Pneumocoque conjugue (PCV)",
                six_weeks,
                &[(28, "PCV 2"), (56, "PCV 3")],
            ),
            entry("rota1", "Rotavirus", six_weeks, &[(28, "Rota 2")]),
            entry("vpi", "VPI (polio injectable)", fourteen_weeks, &[]),
            entry("rr1", "Rougeole-Rubeole 1", nine_months, &[]),
            entry("rr2", "Rougeole-Rubeole 2", MinAge::new(1, 3, 0), &[]),
            entry("vaa", "Fievre jaune (VAA)", nine_months, &[]),
        ],
        prerequisites: vec![
            prerequisite("penta1", "bcg", Requirement::Strict),
            prerequisite("vpo1", "vpo0", Requirement::Recommended),
            prerequisite("vpi", "vpo1", Requirement::Recommended),
            prerequisite("rr2", "rr1", Requirement::Strict),
        ],
        suites: vec![
            suite("bcg", "penta1", Requirement::Recommended, 42),
            suite("vpo0", "vpo1", Requirement::Strict, 42),
            suite("rr1", "rr2", Requirement::Strict, 180),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vaccine(id: &str) -> Vaccine {
        Vaccine {
            id: id.into(),
            name: id.to_uppercase(),
            antigen_duration_days: 0,
            arrival_date: None,
            expiry_date: None,
            lot: None,
            stock: None,
            min_age: MinAge::default(),
            description: String::new(),
        }
    }

    fn strict(vaccine: &str, prereq: &str) -> PrerequisiteEdge {
        prerequisite(vaccine, prereq, Requirement::Strict)
    }

    fn problems(result: Result<Catalog>) -> Vec<String> {
        match result {
            Err(Error::InvalidCatalog(problems)) => problems,
            other => panic!("expected InvalidCatalog, got {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog().unwrap();
        assert_eq!(catalog.len(), 10);
        assert!(catalog.warnings().is_empty());
        assert_eq!(catalog.max_doses("penta1"), 3);
        assert_eq!(catalog.max_doses("bcg"), 1);
    }

    #[test]
    fn test_cached_default_catalog() {
        let a = get_default_catalog().unwrap();
        let b = get_default_catalog().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_strict_cycle_rejected() {
        let result = Catalog::load(
            vec![vaccine("a"), vaccine("b")],
            vec![strict("a", "b"), strict("b", "a")],
            vec![],
            HashMap::new(),
        );
        let problems = problems(result);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0], "strict prerequisite cycle: a -> b -> a");
    }

    #[test]
    fn test_strict_self_loop_rejected() {
        let result = Catalog::load(vec![vaccine("a")], vec![strict("a", "a")], vec![], HashMap::new());
        assert_eq!(problems(result), vec!["strict prerequisite cycle: a -> a"]);
    }

    #[test]
    fn test_recommended_cycle_allowed() {
        let catalog = Catalog::load(
            vec![vaccine("a"), vaccine("b")],
            vec![
                strict("a", "b"),
                prerequisite("b", "a", Requirement::Recommended),
            ],
            vec![],
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(catalog.prerequisites_of("b").count(), 1);
    }

    #[test]
    fn test_dangling_references_rejected() {
        let mut rappels = HashMap::new();
        rappels.insert(
            "ghost".to_string(),
            vec![RappelDef {
                delay_days: 30,
                description: String::new(),
                vaccine_id: None,
            }],
        );
        let result = Catalog::load(
            vec![vaccine("a")],
            vec![strict("a", "missing")],
            vec![suite("a", "nowhere", Requirement::Strict, 10)],
            rappels,
        );
        let problems = problems(result);
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("'a' -> 'missing'")));
        assert!(problems.iter().any(|p| p.contains("'a' -> 'nowhere'")));
        assert!(problems.iter().any(|p| p.contains("'ghost'")));
    }

    #[test]
    fn test_negative_delays_rejected() {
        let mut rappels = HashMap::new();
        rappels.insert(
            "a".to_string(),
            vec![RappelDef {
                delay_days: -1,
                description: String::new(),
                vaccine_id: None,
            }],
        );
        let result = Catalog::load(
            vec![vaccine("a"), vaccine("b")],
            vec![],
            vec![suite("a", "b", Requirement::Strict, -5)],
            rappels,
        );
        assert_eq!(problems(result).len(), 2);
    }

    #[test]
    fn test_oversized_delays_rejected() {
        let mut rappels = HashMap::new();
        rappels.insert(
            "a".to_string(),
            vec![RappelDef {
                delay_days: 200_000_000,
                description: String::new(),
                vaccine_id: None,
            }],
        );
        let result = Catalog::load(
            vec![vaccine("a"), vaccine("b")],
            vec![],
            vec![suite("a", "b", Requirement::Strict, i64::MAX)],
            rappels,
        );
        let problems = problems(result);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.contains("day limit")));
    }

    #[test]
    fn test_longest_delay_accepted() {
        let mut rappels = HashMap::new();
        rappels.insert(
            "a".to_string(),
            vec![RappelDef {
                delay_days: MAX_DELAY_DAYS,
                description: String::new(),
                vaccine_id: None,
            }],
        );
        let catalog = Catalog::load(vec![vaccine("a")], vec![], vec![], rappels).unwrap();
        assert_eq!(i64::from(catalog.rappels_of("a")[0].delay_days), MAX_DELAY_DAYS);
    }

    #[test]
    fn test_expiry_before_arrival_rejected() {
        let mut v = vaccine("a");
        v.arrival_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        v.expiry_date = NaiveDate::from_ymd_opt(2025, 4, 1);
        let result = Catalog::load(vec![v], vec![], vec![], HashMap::new());
        assert!(problems(result)[0].contains("expires"));
    }

    #[test]
    fn test_linked_rappels_imply_rappel_edges() {
        let mut rappels = HashMap::new();
        rappels.insert(
            "hepb".to_string(),
            vec![RappelDef {
                delay_days: 30,
                description: "booster".into(),
                vaccine_id: Some("hepb_booster".into()),
            }],
        );
        let catalog = Catalog::load(
            vec![vaccine("hepb"), vaccine("hepb_booster")],
            vec![],
            vec![],
            rappels,
        )
        .unwrap();
        assert_eq!(catalog.rappel_parent_of("hepb_booster").map(String::as_str), Some("hepb"));
        assert_eq!(catalog.rappel_parent_of("hepb"), None);
        assert_eq!(catalog.suites_from("hepb").count(), 1);
    }

    #[test]
    fn test_reverse_lookups() {
        let catalog = build_default_catalog().unwrap();

        let required: Vec<_> = catalog
            .required_by("vpo1")
            .iter()
            .map(|e| e.vaccine_id.as_str())
            .collect();
        assert_eq!(required, vec!["vpi"]);
        assert_eq!(catalog.required_by("vpo1")[0].requirement, Requirement::Recommended);
        assert!(catalog.required_by("vaa").is_empty());

        let incoming: Vec<_> = catalog
            .pre_suites_of("vpo1")
            .iter()
            .map(|e| e.vaccine_id.as_str())
            .collect();
        assert_eq!(incoming, vec!["vpo0"]);
        assert!(catalog.pre_suites_of("bcg").is_empty());
    }

    #[test]
    fn test_pre_suites_skip_rappel_edges() {
        let mut rappels = HashMap::new();
        rappels.insert(
            "hepb".to_string(),
            vec![RappelDef {
                delay_days: 30,
                description: String::new(),
                vaccine_id: Some("hepb_booster".into()),
            }],
        );
        let catalog = Catalog::load(
            vec![vaccine("hepb"), vaccine("hepb_booster"), vaccine("other")],
            vec![],
            vec![suite("other", "hepb_booster", Requirement::Recommended, 10)],
            rappels,
        )
        .unwrap();
        let incoming = catalog.pre_suites_of("hepb_booster");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].vaccine_id, "other");
    }

    #[test]
    fn test_unmatched_rappel_edge_rejected() {
        let mut edge = suite("a", "b", Requirement::Strict, 30);
        edge.kind = SuiteKind::Rappel;
        let result = Catalog::load(vec![vaccine("a"), vaccine("b")], vec![], vec![edge], HashMap::new());
        assert!(problems(result)[0].contains("no matching rappel entry"));
    }

    #[test]
    fn test_ambiguous_rappel_parent_is_flagged() {
        let linked = |target: &str| {
            vec![RappelDef {
                delay_days: 30,
                description: String::new(),
                vaccine_id: Some(target.into()),
            }]
        };
        let mut rappels = HashMap::new();
        rappels.insert("a".to_string(), linked("shared"));
        rappels.insert("b".to_string(), linked("shared"));
        let catalog = Catalog::load(
            vec![vaccine("a"), vaccine("b"), vaccine("shared")],
            vec![],
            vec![],
            rappels,
        )
        .unwrap();
        assert_eq!(catalog.warnings().len(), 1);
        assert_eq!(catalog.rappel_parent_of("shared").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_toml_document() {
        let toml_str = r#"
[[vaccines]]
id = "bcg"
name = "BCG"

[[vaccines]]
id = "penta1"
name = "Penta"
arrival_date = "2025-01-01"
expiry_date = "2026-01-01"
min_age = { days = 42 }

[[vaccines.rappels]]
delay_days = 30
description = "Penta 2"

[[vaccines.rappels]]
delay_days = 60

[[prerequisites]]
vaccine_id = "penta1"
prerequisite_id = "bcg"
requirement = "strict"

[[suites]]
vaccine_id = "bcg"
next_vaccine_id = "penta1"
requirement = "recommended"
delay_days = 42
"#;
        let catalog = Catalog::from_toml_str(toml_str).unwrap();
        assert_eq!(catalog.rappels_of("penta1").len(), 2);
        assert_eq!(catalog.rappels_of("penta1")[1].delay_days, 60);
        assert_eq!(catalog.vaccine("penta1").unwrap().min_age, MinAge::new(0, 0, 42));
        assert_eq!(catalog.strict_dependents_of("bcg"), vec!["penta1"]);
    }

    #[test]
    fn test_unknown_vaccine_is_not_found() {
        let catalog = build_default_catalog().unwrap();
        assert!(matches!(catalog.require_vaccine("nope"), Err(Error::NotFound(_))));
        assert!(catalog.rappels_of("nope").is_empty());
    }
}
