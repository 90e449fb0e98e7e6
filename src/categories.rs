use serde::{Deserialize, Serialize};

use crate::error::{Result, ShaftError};

/// Written to the ledger when a staged record was never categorised.
pub const UNCATEGORISED: &str = "Uncategorised";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub name: String,
    pub group: String,
    #[serde(default)]
    pub description: String,
}

// (name, group, description)
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Dining", "Essential", "Restaurants, cafes, food delivery, eating out (not groceries)"),
    ("Groceries", "Essential", "Supermarkets, minimarts, fresh markets"),
    ("Transport", "Essential", "Fuel, parking, tolls, ride-hailing, public transport"),
    ("Bills & Fees", "Essential", "Utilities, phone, internet, subscriptions, insurance, bank admin fees"),
    ("Family", "Personal", "Support and transfers to family members"),
    ("Gifts", "Personal", "Presents and gifts for others"),
    ("Travel", "Personal", "Hotels, flights, travel bookings"),
    ("Offering", "Personal", "Religious offerings, donations, charitable giving"),
    ("Entertainment/Shopping", "Personal", "Retail, online shopping, cinema, hobbies"),
    ("Work", "Financial", "Work-related purchases and professional services"),
    ("Income", "Financial", "Salary, transfers received, refunds, interest"),
    (UNCATEGORISED, "Other", "Ambiguous or not yet reviewed"),
];

/// The set of category names the caller currently accepts. The ledger itself
/// stores categories as open strings; this is checked at the edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    categories: Vec<CategoryDef>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, group, description)| CategoryDef {
                    name: name.to_string(),
                    group: group.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }
}

impl Taxonomy {
    pub fn new(categories: Vec<CategoryDef>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[CategoryDef] {
        &self.categories
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    /// Returns the canonical spelling of `name`, matching case-insensitively.
    pub fn validate<'a>(&'a self, name: &str) -> Result<&'a str> {
        let wanted = name.trim();
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted))
            .map(|c| c.name.as_str())
            .ok_or_else(|| ShaftError::UnknownCategory(wanted.to_string()))
    }

    /// Categories bucketed by group, groups in first-seen order.
    pub fn groups(&self) -> Vec<(&str, Vec<&CategoryDef>)> {
        let mut groups: Vec<(&str, Vec<&CategoryDef>)> = Vec::new();
        for cat in &self.categories {
            match groups.iter_mut().find(|(g, _)| *g == cat.group) {
                Some((_, members)) => members.push(cat),
                None => groups.push((cat.group.as_str(), vec![cat])),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_taxonomy_has_sentinel() {
        let t = Taxonomy::default();
        assert!(t.contains(UNCATEGORISED));
        assert_eq!(t.categories().len(), 12);
    }

    #[test]
    fn test_validate_is_case_insensitive() {
        let t = Taxonomy::default();
        assert_eq!(t.validate("dining").unwrap(), "Dining");
        assert_eq!(t.validate(" bills & fees ").unwrap(), "Bills & Fees");
        assert!(matches!(t.validate("Food"), Err(ShaftError::UnknownCategory(_))));
    }

    #[test]
    fn test_groups_preserve_order() {
        let t = Taxonomy::default();
        let names: Vec<&str> = t.groups().iter().map(|(g, _)| *g).collect();
        assert_eq!(names, vec!["Essential", "Personal", "Financial", "Other"]);
        let essential = &t.groups()[0].1;
        assert_eq!(essential.len(), 4);
    }

    #[test]
    fn test_custom_taxonomy() {
        let t = Taxonomy::new(vec![CategoryDef {
            name: "Food".to_string(),
            group: "Essential".to_string(),
            description: String::new(),
        }]);
        assert_eq!(t.validate("FOOD").unwrap(), "Food");
        assert!(t.validate("Dining").is_err());
    }
}
