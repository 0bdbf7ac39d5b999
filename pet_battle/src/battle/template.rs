//! Battle templates and the pet catalog.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;

/// Battle template ID type
pub type TemplateId = i32;

/// Pet ID type
pub type PetId = i32;

/// Grid cell index, `1..=grid_count`
pub type Cell = i32;

/// Kind of resource held in the item/pet ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Item,
    Pet,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Item => write!(f, "item"),
            ResourceKind::Pet => write!(f, "pet"),
        }
    }
}

/// A quantity of one ledger resource (entry requirement, entry fee or reward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub kind: ResourceKind,
    pub resource_id: i32,
    pub quantity: i64,
}

impl ResourceAmount {
    pub fn pet(pet_id: PetId, quantity: i64) -> Self {
        Self {
            kind: ResourceKind::Pet,
            resource_id: pet_id,
            quantity,
        }
    }

    pub fn item(item_id: i32, quantity: i64) -> Self {
        Self {
            kind: ResourceKind::Item,
            resource_id: item_id,
            quantity,
        }
    }

    /// Same resource with the quantity multiplied by `factor`
    pub fn scaled(&self, factor: i64) -> Self {
        Self {
            quantity: self.quantity.saturating_mul(factor),
            ..*self
        }
    }
}

fn default_entry_pet_cost() -> i64 {
    1
}

/// Immutable per-battle-type configuration.
///
/// Durations are in whole seconds, matching the unix timestamps stored on desks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleTemplate {
    pub id: TemplateId,

    #[serde(default)]
    pub name: String,

    /// Join window measured from desk creation
    pub match_window_secs: i64,

    pub total_rounds: usize,

    /// Betting time of each round, one entry per round
    pub round_durations: Vec<i64>,

    /// Pause after each round's elimination
    pub round_interval_secs: i64,

    /// Seat capacity
    pub capacity: usize,

    /// Resources a player must hold to join
    #[serde(default)]
    pub entry_requirements: Vec<ResourceAmount>,

    /// Units of the chosen pet debited on join
    #[serde(default = "default_entry_pet_cost")]
    pub entry_pet_cost: i64,

    pub total_bonus: i64,

    pub grid_count: Cell,

    #[serde(default)]
    pub bot_fill: bool,

    /// Reward entries, each scaled by the winner's bonus
    #[serde(default)]
    pub rewards: Vec<ResourceAmount>,

    /// Onboarding desk that steers eliminations away from its player
    #[serde(default)]
    pub tutorial: bool,
}

impl BattleTemplate {
    /// Validate template consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.total_rounds == 0 {
            return Err("Total rounds must be at least 1".to_string());
        }

        if self.round_durations.len() != self.total_rounds {
            return Err(format!(
                "Expected {} round durations, got {}",
                self.total_rounds,
                self.round_durations.len()
            ));
        }

        if self.round_durations.iter().any(|d| *d <= 0) {
            return Err("Round durations must be positive".to_string());
        }

        if self.match_window_secs <= 0 {
            return Err("Match window must be positive".to_string());
        }

        if self.round_interval_secs < 0 {
            return Err("Round interval cannot be negative".to_string());
        }

        if self.capacity == 0 {
            return Err("Capacity must be at least 1".to_string());
        }

        // One cell is removed per round and at least one must survive the last round.
        if self.grid_count <= self.total_rounds as Cell {
            return Err(format!(
                "Grid count {} must exceed total rounds {}",
                self.grid_count, self.total_rounds
            ));
        }

        if self.total_bonus < 0 {
            return Err("Total bonus cannot be negative".to_string());
        }

        if self.entry_pet_cost < 0 {
            return Err("Entry pet cost cannot be negative".to_string());
        }

        Ok(())
    }

    /// Bonus pool released per round before the final one
    pub fn base_bonus(&self) -> i64 {
        self.total_bonus / self.total_rounds as i64
    }

    /// Betting duration of a 1-based round
    pub fn round_duration(&self, round: usize) -> i64 {
        round
            .checked_sub(1)
            .and_then(|i| self.round_durations.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Resources debited on join for the chosen pet
    pub fn entry_fee(&self, pet_id: PetId) -> ResourceAmount {
        ResourceAmount::pet(pet_id, self.entry_pet_cost)
    }
}

/// Errors raised while loading the template catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid template {id}: {reason}")]
    InvalidTemplate { id: TemplateId, reason: String },

    #[error("Duplicate template id {0}")]
    DuplicateTemplate(TemplateId),

    #[error("Catalog has no pets")]
    NoPets,
}

#[derive(Deserialize)]
struct CatalogFile {
    pets: Vec<PetId>,
    templates: Vec<BattleTemplate>,
}

/// Read-only lookup of templates and known pets
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<TemplateId, Arc<BattleTemplate>>,
    pets: Vec<PetId>,
}

impl TemplateCatalog {
    /// Build a catalog, validating every template
    pub fn new(templates: Vec<BattleTemplate>, pets: Vec<PetId>) -> Result<Self, CatalogError> {
        if pets.is_empty() {
            return Err(CatalogError::NoPets);
        }

        let mut by_id = HashMap::with_capacity(templates.len());
        for template in templates {
            template
                .validate()
                .map_err(|reason| CatalogError::InvalidTemplate {
                    id: template.id,
                    reason,
                })?;

            let id = template.id;
            if by_id.insert(id, Arc::new(template)).is_some() {
                return Err(CatalogError::DuplicateTemplate(id));
            }
        }

        Ok(Self {
            templates: by_id,
            pets,
        })
    }

    /// Parse a catalog from its JSON representation
    ///
    /// ```
    /// use pet_battle::battle::TemplateCatalog;
    ///
    /// let catalog = TemplateCatalog::from_json(r#"{
    ///     "pets": [101, 102],
    ///     "templates": [{
    ///         "id": 1, "match_window_secs": 30, "total_rounds": 1,
    ///         "round_durations": [10], "round_interval_secs": 2,
    ///         "capacity": 4, "total_bonus": 100, "grid_count": 6
    ///     }]
    /// }"#).unwrap();
    /// assert!(catalog.get(1).is_some());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.templates, file.pets)
    }

    /// Load a catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, id: TemplateId) -> Option<Arc<BattleTemplate>> {
        self.templates.get(&id).cloned()
    }

    pub fn is_known_pet(&self, pet_id: PetId) -> bool {
        self.pets.contains(&pet_id)
    }

    pub fn pets(&self) -> &[PetId] {
        &self.pets
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 30s window, 3 rounds of 10s, 2s interval, 4 seats, 6 cells, 600 bonus
    pub(crate) fn scenario_template() -> BattleTemplate {
        BattleTemplate {
            id: 7,
            name: "Scenario".to_string(),
            match_window_secs: 30,
            total_rounds: 3,
            round_durations: vec![10, 10, 10],
            round_interval_secs: 2,
            capacity: 4,
            entry_requirements: vec![],
            entry_pet_cost: 1,
            total_bonus: 600,
            grid_count: 6,
            bot_fill: true,
            rewards: vec![ResourceAmount::item(1, 1)],
            tutorial: false,
        }
    }

    #[test]
    fn test_scenario_template_is_valid() {
        assert!(scenario_template().validate().is_ok());
    }

    #[test]
    fn test_validate_duration_count_mismatch() {
        let mut template = scenario_template();
        template.round_durations.pop();
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_validate_grid_must_exceed_rounds() {
        let mut template = scenario_template();
        template.grid_count = 3;
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut template = scenario_template();
        template.capacity = 0;
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_base_bonus() {
        assert_eq!(scenario_template().base_bonus(), 200);
    }

    #[test]
    fn test_round_duration_out_of_range() {
        let template = scenario_template();
        assert_eq!(template.round_duration(0), 0);
        assert_eq!(template.round_duration(1), 10);
        assert_eq!(template.round_duration(4), 0);
    }

    #[test]
    fn test_reward_scaling() {
        let reward = ResourceAmount::item(9, 3).scaled(50);
        assert_eq!(reward.quantity, 150);
        assert_eq!(reward.resource_id, 9);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let result = TemplateCatalog::new(vec![scenario_template(), scenario_template()], vec![1]);
        assert!(matches!(result, Err(CatalogError::DuplicateTemplate(7))));
    }

    #[test]
    fn test_catalog_rejects_invalid_template() {
        let mut template = scenario_template();
        template.total_rounds = 0;
        let result = TemplateCatalog::new(vec![template], vec![1]);
        assert!(matches!(result, Err(CatalogError::InvalidTemplate { id: 7, .. })));
    }

    #[test]
    fn test_catalog_from_json_defaults() {
        let catalog = TemplateCatalog::from_json(
            r#"{
                "pets": [101],
                "templates": [{
                    "id": 3, "match_window_secs": 20, "total_rounds": 2,
                    "round_durations": [5, 5], "round_interval_secs": 1,
                    "capacity": 2, "total_bonus": 10, "grid_count": 4
                }]
            }"#,
        )
        .unwrap();

        let template = catalog.get(3).unwrap();
        assert_eq!(template.entry_pet_cost, 1);
        assert!(!template.bot_fill);
        assert!(!template.tutorial);
        assert!(catalog.is_known_pet(101));
        assert!(!catalog.is_known_pet(102));
    }
}
