//! Standard category taxonomy and the supplier-to-standard mapping engine.
//!
//! Suppliers each ship their own category tree; downstream listing code
//! only understands the [`StandardCategory`] taxonomy. [`CategoryMapper`]
//! translates between the two using a per-supplier dictionary (exact, then
//! substring) and a supplier-independent keyword table, returning a
//! confidence score alongside every verdict so low-confidence mappings can
//! be routed to manual review.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::supplier::Supplier;
use crate::ConfigError;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Marketplace-side category taxonomy. Stored in the database as the
/// `snake_case` string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardCategory {
    FashionWomen,
    FashionMen,
    FashionAccessories,
    Shoes,
    Bags,
    Jewelry,
    BeautySkincare,
    BeautyMakeup,
    BeautyHair,
    DigitalElectronics,
    MobileAccessories,
    Computer,
    HomeAppliances,
    Furniture,
    HomeInterior,
    Kitchen,
    LivingDaily,
    FoodBeverage,
    HealthFood,
    BabyKids,
    Toys,
    StationeryOffice,
    PetSupplies,
    SportsOutdoor,
    LeisureTravel,
    Automotive,
    ToolsDiy,
    Lighting,
    Bedding,
    Bathroom,
    Gardening,
    BooksMedia,
    MusicalInstruments,
    PartyEvent,
    Other,
}

impl StandardCategory {
    pub const ALL: [StandardCategory; 35] = [
        StandardCategory::FashionWomen,
        StandardCategory::FashionMen,
        StandardCategory::FashionAccessories,
        StandardCategory::Shoes,
        StandardCategory::Bags,
        StandardCategory::Jewelry,
        StandardCategory::BeautySkincare,
        StandardCategory::BeautyMakeup,
        StandardCategory::BeautyHair,
        StandardCategory::DigitalElectronics,
        StandardCategory::MobileAccessories,
        StandardCategory::Computer,
        StandardCategory::HomeAppliances,
        StandardCategory::Furniture,
        StandardCategory::HomeInterior,
        StandardCategory::Kitchen,
        StandardCategory::LivingDaily,
        StandardCategory::FoodBeverage,
        StandardCategory::HealthFood,
        StandardCategory::BabyKids,
        StandardCategory::Toys,
        StandardCategory::StationeryOffice,
        StandardCategory::PetSupplies,
        StandardCategory::SportsOutdoor,
        StandardCategory::LeisureTravel,
        StandardCategory::Automotive,
        StandardCategory::ToolsDiy,
        StandardCategory::Lighting,
        StandardCategory::Bedding,
        StandardCategory::Bathroom,
        StandardCategory::Gardening,
        StandardCategory::BooksMedia,
        StandardCategory::MusicalInstruments,
        StandardCategory::PartyEvent,
        StandardCategory::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StandardCategory::FashionWomen => "fashion_women",
            StandardCategory::FashionMen => "fashion_men",
            StandardCategory::FashionAccessories => "fashion_accessories",
            StandardCategory::Shoes => "shoes",
            StandardCategory::Bags => "bags",
            StandardCategory::Jewelry => "jewelry",
            StandardCategory::BeautySkincare => "beauty_skincare",
            StandardCategory::BeautyMakeup => "beauty_makeup",
            StandardCategory::BeautyHair => "beauty_hair",
            StandardCategory::DigitalElectronics => "digital_electronics",
            StandardCategory::MobileAccessories => "mobile_accessories",
            StandardCategory::Computer => "computer",
            StandardCategory::HomeAppliances => "home_appliances",
            StandardCategory::Furniture => "furniture",
            StandardCategory::HomeInterior => "home_interior",
            StandardCategory::Kitchen => "kitchen",
            StandardCategory::LivingDaily => "living_daily",
            StandardCategory::FoodBeverage => "food_beverage",
            StandardCategory::HealthFood => "health_food",
            StandardCategory::BabyKids => "baby_kids",
            StandardCategory::Toys => "toys",
            StandardCategory::StationeryOffice => "stationery_office",
            StandardCategory::PetSupplies => "pet_supplies",
            StandardCategory::SportsOutdoor => "sports_outdoor",
            StandardCategory::LeisureTravel => "leisure_travel",
            StandardCategory::Automotive => "automotive",
            StandardCategory::ToolsDiy => "tools_diy",
            StandardCategory::Lighting => "lighting",
            StandardCategory::Bedding => "bedding",
            StandardCategory::Bathroom => "bathroom",
            StandardCategory::Gardening => "gardening",
            StandardCategory::BooksMedia => "books_media",
            StandardCategory::MusicalInstruments => "musical_instruments",
            StandardCategory::PartyEvent => "party_event",
            StandardCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for StandardCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Table file format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct DictEntry {
    #[serde(rename = "match")]
    pattern: String,
    category: StandardCategory,
}

#[derive(Debug, Clone, Deserialize)]
struct KeywordGroup {
    category: StandardCategory,
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SupplierDictionaries {
    ownerclan: Vec<DictEntry>,
    domeme: Vec<DictEntry>,
    gentrade: Vec<DictEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryTableFile {
    suppliers: SupplierDictionaries,
    keyword_groups: Vec<KeywordGroup>,
}

/// Parsed and validated category mapping tables.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    ownerclan: Vec<DictEntry>,
    domeme: Vec<DictEntry>,
    gentrade: Vec<DictEntry>,
    keyword_groups: Vec<KeywordGroup>,
}

impl CategoryTable {
    fn dictionary(&self, supplier: Supplier) -> &[DictEntry] {
        match supplier {
            Supplier::Ownerclan => &self.ownerclan,
            Supplier::Domeme => &self.domeme,
            Supplier::Gentrade => &self.gentrade,
        }
    }

    #[must_use]
    pub fn dictionary_len(&self, supplier: Supplier) -> usize {
        self.dictionary(supplier).len()
    }

    #[must_use]
    pub fn keyword_group_len(&self) -> usize {
        self.keyword_groups.len()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for supplier in Supplier::ALL {
            for entry in self.dictionary(supplier) {
                if entry.pattern.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "empty match pattern in {supplier} dictionary"
                    )));
                }
                if !seen.insert((supplier, entry.pattern.clone())) {
                    return Err(ConfigError::Validation(format!(
                        "duplicate {supplier} dictionary entry `{}`",
                        entry.pattern
                    )));
                }
            }
        }

        let mut group_categories = HashSet::new();
        for group in &self.keyword_groups {
            if group.keywords.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "keyword group `{}` has no keywords",
                    group.category
                )));
            }
            if group.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "keyword group `{}` contains an empty keyword",
                    group.category
                )));
            }
            if !group_categories.insert(group.category) {
                return Err(ConfigError::Validation(format!(
                    "duplicate keyword group for `{}`",
                    group.category
                )));
            }
        }
        Ok(())
    }
}

fn parse_category_table(raw: &str) -> Result<CategoryTable, ConfigError> {
    let file: CategoryTableFile = serde_yaml::from_str(raw)?;
    let table = CategoryTable {
        ownerclan: file.suppliers.ownerclan,
        domeme: file.suppliers.domeme,
        gentrade: file.suppliers.gentrade,
        keyword_groups: file.keyword_groups,
    };
    table.validate()?;
    Ok(table)
}

/// Load and validate the category mapping tables from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, fails to parse, or
/// contains duplicate dictionary entries or empty keyword groups.
pub fn load_category_table(path: &Path) -> Result<CategoryTable, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::CategoryFileIo {
        path: path.display().to_string(),
        source,
    })?;
    parse_category_table(&raw)
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

/// A mapping verdict: the standard category plus a confidence in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMatch {
    pub category: StandardCategory,
    pub confidence: f64,
}

const EXACT_CONFIDENCE: f64 = 1.0;
const SUBSTRING_CONFIDENCE: f64 = 0.8;
const KEYWORD_BOOST: f64 = 1.2;
const MISSING_NAME_PENALTY: f64 = 0.7;
const FALLBACK_CONFIDENCE: f64 = 0.3;
const SUGGESTION_FLOOR: f64 = 0.1;
const MAX_SUGGESTIONS: usize = 3;

/// Pure supplier-category to standard-category translation. Holds the
/// loaded tables; safe to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CategoryMapper {
    table: CategoryTable,
}

impl CategoryMapper {
    #[must_use]
    pub fn new(table: CategoryTable) -> Self {
        Self { table }
    }

    /// Map a supplier's raw category string to the standard taxonomy.
    ///
    /// Resolution order: exact dictionary hit (1.0), substring dictionary
    /// hit in either direction (0.8), then a keyword scan over the category
    /// text plus the product name. When nothing matches the verdict is
    /// `(other, 0.3)` and the unmapped pair is logged for curation. Blank
    /// input short-circuits to `(other, 0.0)`.
    #[must_use]
    pub fn map_category(
        &self,
        supplier: Supplier,
        original_category: &str,
        product_name: Option<&str>,
    ) -> CategoryMatch {
        let category_text = original_category.trim();
        if category_text.is_empty() {
            return CategoryMatch {
                category: StandardCategory::Other,
                confidence: 0.0,
            };
        }

        let dictionary = self.table.dictionary(supplier);
        for entry in dictionary {
            if entry.pattern == category_text {
                return CategoryMatch {
                    category: entry.category,
                    confidence: EXACT_CONFIDENCE,
                };
            }
        }
        for entry in dictionary {
            if category_text.contains(entry.pattern.as_str())
                || entry.pattern.contains(category_text)
            {
                return CategoryMatch {
                    category: entry.category,
                    confidence: SUBSTRING_CONFIDENCE,
                };
            }
        }

        let mut haystack = category_text.to_string();
        if let Some(name) = product_name {
            haystack.push(' ');
            haystack.push_str(name);
        }
        if let Some(best) = self.best_keyword_match(&haystack) {
            let penalty = if product_name.is_some() {
                1.0
            } else {
                MISSING_NAME_PENALTY
            };
            return CategoryMatch {
                category: best.category,
                confidence: best.confidence * penalty,
            };
        }

        tracing::warn!(
            supplier = %supplier,
            category = %category_text,
            "unmapped supplier category, add a dictionary entry"
        );
        CategoryMatch {
            category: StandardCategory::Other,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    /// Suggest up to three categories for a product from its name and
    /// description using the keyword table only. Falls back to
    /// `[(other, 0.1)]` when nothing matches.
    #[must_use]
    pub fn suggest_categories(&self, name: &str, description: Option<&str>) -> Vec<CategoryMatch> {
        let mut haystack = name.trim().to_string();
        if let Some(desc) = description {
            haystack.push(' ');
            haystack.push_str(desc);
        }

        let mut scored = self.keyword_scores(&haystack);
        // Stable sort keeps table order for equal scores.
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(MAX_SUGGESTIONS);
        if scored.is_empty() {
            scored.push(CategoryMatch {
                category: StandardCategory::Other,
                confidence: SUGGESTION_FLOOR,
            });
        }
        scored
    }

    fn best_keyword_match(&self, haystack: &str) -> Option<CategoryMatch> {
        let mut best: Option<CategoryMatch> = None;
        for candidate in self.keyword_scores(haystack) {
            let beats = best
                .as_ref()
                .is_none_or(|b| candidate.confidence > b.confidence);
            if beats {
                best = Some(candidate);
            }
        }
        best
    }

    fn keyword_scores(&self, haystack: &str) -> Vec<CategoryMatch> {
        self.table
            .keyword_groups
            .iter()
            .filter_map(|group| {
                let score = group_score(group, haystack);
                (score > 0.0).then_some(CategoryMatch {
                    category: group.category,
                    confidence: score,
                })
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn group_score(group: &KeywordGroup, haystack: &str) -> f64 {
    let matches = group
        .keywords
        .iter()
        .filter(|keyword| haystack.contains(keyword.as_str()))
        .count();
    if matches == 0 {
        return 0.0;
    }
    let ratio = matches as f64 / group.keywords.len() as f64;
    (ratio * KEYWORD_BOOST).min(1.0)
}

#[cfg(test)]
#[path = "category_test.rs"]
mod tests;
