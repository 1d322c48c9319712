//! Shopping-list consolidation.
//!
//! Everything here is pure: callers hand in the current list, get back a plan of
//! row updates and inserts, persist it, and then re-read the list from the store.
//! The invariant maintained by every plan is that a user has at most one
//! *unchecked* item per normalized name. Checked items are never merge targets.

use serde::Serialize;

use crate::models::{
    CategoryGroups, DEFAULT_ITEM_CATEGORY, MarketListItem, NewMarketListItem, Recipe,
    RecipeIngredient, normalize_item_name,
};

/// Rows to write for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Existing rows with their new `amount` and `from_recipe`, one entry per row.
    pub updates: Vec<MarketListItem>,
    pub inserts: Vec<NewMarketListItem>,
}

impl MergePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// Outcome reported back to the caller after a merge has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub recipe_name: String,
    pub added: usize,
    pub updated: usize,
}

impl MergeReport {
    /// True when every ingredient was already on the list and only amounts changed.
    #[must_use]
    pub fn fully_merged(&self) -> bool {
        self.added == 0
    }

    #[must_use]
    pub fn message(&self) -> String {
        let name = &self.recipe_name;
        if self.fully_merged() {
            format!("All ingredients from \"{name}\" were already on your list. Amounts updated.")
        } else {
            let added = self.added;
            format!("Added {added} new ingredient(s) from \"{name}\".")
        }
    }
}

/// Plan adding every ingredient of `recipe` to `list`.
#[must_use]
pub fn plan_recipe_merge(list: &[MarketListItem], recipe: &Recipe) -> MergePlan {
    plan(list, &recipe.ingredients, Some(&recipe.name), None)
}

/// Plan a typed-in item: amount "1", no provenance, filed under "Other".
/// Blank names produce an empty plan.
#[must_use]
pub fn plan_manual_item(list: &[MarketListItem], name: &str) -> MergePlan {
    let ingredient = RecipeIngredient::new(name.trim(), "1");
    plan(
        list,
        std::slice::from_ref(&ingredient),
        None,
        Some(DEFAULT_ITEM_CATEGORY),
    )
}

fn plan(
    list: &[MarketListItem],
    ingredients: &[RecipeIngredient],
    recipe_name: Option<&str>,
    new_item_category: Option<&str>,
) -> MergePlan {
    let mut working: Vec<MarketListItem> = list.to_vec();
    let mut touched: Vec<usize> = Vec::new();
    let mut inserts: Vec<NewMarketListItem> = Vec::new();

    for ingredient in ingredients {
        let key = normalize_item_name(&ingredient.name);
        if key.is_empty() {
            continue;
        }

        if let Some(idx) = working
            .iter()
            .position(|item| !item.checked && normalize_item_name(&item.name) == key)
        {
            let item = &mut working[idx];
            append_amount(&mut item.amount, &ingredient.amount);
            if let Some(recipe) = recipe_name {
                append_provenance(&mut item.from_recipe, recipe);
            }
            if !touched.contains(&idx) {
                touched.push(idx);
            }
            continue;
        }

        // Same ingredient listed twice in one recipe
        if let Some(pending) = inserts
            .iter_mut()
            .find(|p| normalize_item_name(&p.name) == key)
        {
            append_amount(&mut pending.amount, &ingredient.amount);
            continue;
        }

        inserts.push(NewMarketListItem {
            name: ingredient.name.trim().to_string(),
            amount: ingredient.amount.trim().to_string(),
            checked: false,
            from_recipe: recipe_name.map(String::from),
            category: new_item_category.map(String::from),
        });
    }

    MergePlan {
        updates: touched.into_iter().map(|i| working[i].clone()).collect(),
        inserts,
    }
}

/// Append `", amount"`. Blank amounts are skipped so no dangling separators appear.
pub fn append_amount(existing: &mut String, amount: &str) {
    let amount = amount.trim();
    if amount.is_empty() {
        return;
    }
    if existing.trim().is_empty() {
        *existing = amount.to_string();
    } else {
        existing.push_str(", ");
        existing.push_str(amount);
    }
}

/// Append a recipe name unless it already occurs as a substring.
///
/// Substring matching means "Pie" is considered present once "Apple Pie" is.
pub fn append_provenance(from_recipe: &mut Option<String>, recipe_name: &str) {
    match from_recipe {
        Some(existing) if existing.contains(recipe_name) => {}
        Some(existing) if existing.trim().is_empty() => *existing = recipe_name.to_string(),
        Some(existing) => {
            existing.push_str(", ");
            existing.push_str(recipe_name);
        }
        None => *from_recipe = Some(recipe_name.to_string()),
    }
}

/// Fold `source` into `target`: amounts concatenated, provenance entries added.
pub fn fold_item(target: &mut MarketListItem, source: &MarketListItem) {
    append_amount(&mut target.amount, &source.amount);
    if let Some(from) = &source.from_recipe {
        for recipe in from.split(", ").filter(|r| !r.trim().is_empty()) {
            append_provenance(&mut target.from_recipe, recipe);
        }
    }
}

/// Another unchecked item sharing `item`'s normalized name, if any.
#[must_use]
pub fn unchecked_twin<'a>(
    list: &'a [MarketListItem],
    item: &MarketListItem,
) -> Option<&'a MarketListItem> {
    let key = normalize_item_name(&item.name);
    list.iter()
        .find(|other| other.id != item.id && !other.checked && normalize_item_name(&other.name) == key)
}

#[must_use]
pub fn is_recipe_on_list(list: &[MarketListItem], recipe_name: &str) -> bool {
    list.iter()
        .any(|item| item.from_recipe.as_deref().is_some_and(|f| f.contains(recipe_name)))
}

/// `(item id, category)` for every item; items absent from all groups get "Other".
#[must_use]
pub fn assign_categories(list: &[MarketListItem], groups: &CategoryGroups) -> Vec<(String, String)> {
    list.iter()
        .map(|item| {
            let category = groups
                .category_for(&item.name)
                .unwrap_or(DEFAULT_ITEM_CATEGORY);
            (item.id.clone(), category.to_string())
        })
        .collect()
}

/// Item names in list order, as sent to the organizer.
#[must_use]
pub fn item_names(list: &[MarketListItem]) -> Vec<String> {
    list.iter().map(|item| item.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryGroup, RecipeSource};

    fn recipe(name: &str, ingredients: &[(&str, &str)]) -> Recipe {
        let mut r = Recipe::minimal("r1", RecipeSource::Kobiri, name, None);
        r.ingredients = ingredients
            .iter()
            .map(|(n, a)| RecipeIngredient::new(*n, *a))
            .collect();
        r
    }

    fn item(id: &str, name: &str, amount: &str, checked: bool, from: Option<&str>) -> MarketListItem {
        MarketListItem {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            amount: amount.to_string(),
            checked,
            from_recipe: from.map(String::from),
            category: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_merge_into_empty_list_inserts() {
        let plan = plan_recipe_merge(&[], &recipe("Stew A", &[("Tomato", "2")]));
        assert!(plan.updates.is_empty());
        assert_eq!(plan.inserts.len(), 1);
        let new = &plan.inserts[0];
        assert_eq!(new.name, "Tomato");
        assert_eq!(new.amount, "2");
        assert_eq!(new.from_recipe.as_deref(), Some("Stew A"));
        assert!(!new.checked);
        assert!(new.category.is_none());
    }

    #[test]
    fn test_merge_appends_amount_and_provenance() {
        let list = vec![item("1", "Tomato", "2", false, Some("Stew A"))];
        let plan = plan_recipe_merge(&list, &recipe("Stew B", &[("tomato", "3")]));
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].amount, "2, 3");
        assert_eq!(plan.updates[0].from_recipe.as_deref(), Some("Stew A, Stew B"));
    }

    #[test]
    fn test_merge_same_recipe_twice_appends_without_new_items() {
        let list = vec![item("1", "Tomato", "2", false, Some("Stew A"))];
        let plan = plan_recipe_merge(&list, &recipe("Stew A", &[("Tomato", "2")]));
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.updates[0].amount, "2, 2");
        assert_eq!(plan.updates[0].from_recipe.as_deref(), Some("Stew A"));
    }

    #[test]
    fn test_checked_items_are_not_merge_targets() {
        let list = vec![item("1", "Tomato", "2", true, Some("Stew A"))];
        let plan = plan_recipe_merge(&list, &recipe("Stew B", &[("Tomato", "3")]));
        assert!(plan.updates.is_empty());
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].amount, "3");
    }

    #[test]
    fn test_empty_amount_not_appended() {
        let list = vec![item("1", "Salt", "1 tsp", false, Some("Stew A"))];
        let plan = plan_recipe_merge(&list, &recipe("Stew B", &[("Salt", "  ")]));
        assert_eq!(plan.updates[0].amount, "1 tsp");
        assert_eq!(plan.updates[0].from_recipe.as_deref(), Some("Stew A, Stew B"));
    }

    #[test]
    fn test_amount_into_blank_existing_has_no_leading_separator() {
        let list = vec![item("1", "Salt", "", false, Some("Stew A"))];
        let plan = plan_recipe_merge(&list, &recipe("Stew B", &[("Salt", "pinch")]));
        assert_eq!(plan.updates[0].amount, "pinch");
    }

    #[test]
    fn test_provenance_substring_imprecision() {
        let list = vec![item("1", "Apples", "3", false, Some("Apple Pie"))];
        let plan = plan_recipe_merge(&list, &recipe("Pie", &[("Apples", "2")]));
        assert_eq!(plan.updates[0].amount, "3, 2");
        assert_eq!(plan.updates[0].from_recipe.as_deref(), Some("Apple Pie"));
    }

    #[test]
    fn test_duplicate_ingredient_within_recipe_collapses() {
        let plan = plan_recipe_merge(
            &[],
            &recipe("Stew A", &[("Onion", "1"), (" onion ", "2"), ("", "9")]),
        );
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].amount, "1, 2");
    }

    #[test]
    fn test_updated_row_listed_once() {
        let list = vec![item("1", "Onion", "1", false, Some("Stew A"))];
        let plan = plan_recipe_merge(&list, &recipe("Stew B", &[("Onion", "2"), ("ONION", "3")]));
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].amount, "1, 2, 3");
    }

    #[test]
    fn test_manual_item_defaults() {
        let plan = plan_manual_item(&[], "  Bread ");
        assert_eq!(plan.inserts.len(), 1);
        let new = &plan.inserts[0];
        assert_eq!(new.name, "Bread");
        assert_eq!(new.amount, "1");
        assert!(new.from_recipe.is_none());
        assert_eq!(new.category.as_deref(), Some("Other"));

        assert!(plan_manual_item(&[], "   ").is_empty());
    }

    #[test]
    fn test_manual_item_merges_with_unchecked_twin() {
        let list = vec![item("1", "Bread", "1", false, None)];
        let plan = plan_manual_item(&list, "bread");
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.updates[0].amount, "1, 1");
        assert!(plan.updates[0].from_recipe.is_none());
    }

    #[test]
    fn test_recipe_merge_onto_manual_item_sets_provenance() {
        let list = vec![item("1", "Bread", "1", false, None)];
        let plan = plan_recipe_merge(&list, &recipe("Toast", &[("Bread", "2 slices")]));
        assert_eq!(plan.updates[0].from_recipe.as_deref(), Some("Toast"));
    }

    #[test]
    fn test_is_recipe_on_list() {
        let list = vec![item("1", "Tomato", "2", false, Some("Stew A, Stew B"))];
        assert!(is_recipe_on_list(&list, "Stew B"));
        assert!(!is_recipe_on_list(&list, "Soup"));
    }

    #[test]
    fn test_assign_categories_defaults_to_other() {
        let list = vec![
            item("1", "Tomato", "2", false, None),
            item("2", "Dish soap", "1", false, None),
        ];
        let groups = CategoryGroups(vec![CategoryGroup {
            name: "Produce".to_string(),
            items: vec!["tomato".to_string()],
        }]);
        let assigned = assign_categories(&list, &groups);
        assert_eq!(
            assigned,
            vec![
                ("1".to_string(), "Produce".to_string()),
                ("2".to_string(), "Other".to_string()),
            ]
        );
    }

    #[test]
    fn test_fold_item_and_twin() {
        let list = vec![
            item("1", "Tomato", "2", false, Some("Stew A")),
            item("2", "tomato", "3", true, Some("Stew B, Stew A")),
        ];
        let returning = &list[1];
        let twin = unchecked_twin(&list, returning).unwrap();
        assert_eq!(twin.id, "1");

        let mut target = twin.clone();
        fold_item(&mut target, returning);
        assert_eq!(target.amount, "2, 3");
        assert_eq!(target.from_recipe.as_deref(), Some("Stew A, Stew B"));
    }

    #[test]
    fn test_report_message() {
        let report = MergeReport {
            recipe_name: "Stew".to_string(),
            added: 0,
            updated: 3,
        };
        assert!(report.fully_merged());
        assert!(report.message().contains("already on your list"));
    }
}
