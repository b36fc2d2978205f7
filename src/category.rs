use crate::formats::RecipeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Dessert,
    Breakfast,
    Appetizer,
    Soup,
    Salad,
    MainCourse,
    Vegetarian,
    SideDish,
    Bread,
    Beverage,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dessert => "Dessert",
            Self::Breakfast => "Breakfast",
            Self::Appetizer => "Appetizer",
            Self::Soup => "Soup",
            Self::Salad => "Salad",
            Self::MainCourse => "Main Course",
            Self::Vegetarian => "Vegetarian",
            Self::SideDish => "Side Dish",
            Self::Bread => "Bread",
            Self::Beverage => "Beverage",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// Checked in order; the first table with a hit in the title or any ingredient wins.
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Dessert,
        &[
            "cake",
            "cookie",
            "pie",
            "dessert",
            "sweet",
            "chocolate",
            "ice cream",
            "pudding",
        ],
    ),
    (
        Category::Breakfast,
        &[
            "breakfast",
            "pancake",
            "waffle",
            "eggs",
            "omelette",
            "oatmeal",
            "cereal",
        ],
    ),
    (Category::Appetizer, &["appetizer", "snack", "dip", "starter"]),
    (Category::Soup, &["soup", "stew", "broth", "chowder"]),
    (Category::Salad, &["salad", "slaw"]),
    (
        Category::MainCourse,
        &["chicken", "beef", "pork", "fish", "salmon", "pasta", "rice"],
    ),
    (Category::Vegetarian, &["tofu", "vegetarian", "vegan"]),
    (Category::SideDish, &["side", "vegetable", "potato", "rice"]),
    (Category::Bread, &["bread", "roll", "bun", "muffin"]),
    (
        Category::Beverage,
        &["drink", "cocktail", "smoothie", "juice"],
    ),
];

const MEAT: &[&str] = &["chicken", "beef", "pork", "fish", "salmon", "lamb", "turkey"];

/// Keyword-based guess from the title and ingredients.
///
/// Recipes that match no table fall back to vegetarian when no ingredient names a meat.
pub fn detect_category(record: &RecipeRecord) -> Category {
    let title = record.title.to_lowercase();
    let ingredients = record
        .ingredients
        .iter()
        .map(|i| i.to_lowercase())
        .collect::<Vec<_>>();
    let mentions = |keyword: &&str| {
        title.contains(*keyword) || ingredients.iter().any(|i| i.contains(*keyword))
    };

    if let Some((category, _)) = KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(mentions))
    {
        return *category;
    }

    let has_meat = ingredients
        .iter()
        .any(|i| MEAT.iter().any(|meat| i.contains(meat)));
    if has_meat {
        Category::MainCourse
    } else {
        Category::Vegetarian
    }
}

/// Records grouped by category label, groups and titles in alphabetical order.
pub fn group_by_category(records: &[RecipeRecord]) -> Vec<(Category, Vec<&RecipeRecord>)> {
    let mut tagged = records
        .iter()
        .map(|r| (detect_category(r), r))
        .collect::<Vec<_>>();
    tagged.sort_by(|(a_cat, a), (b_cat, b)| {
        a_cat
            .label()
            .cmp(b_cat.label())
            .then_with(|| a.title.cmp(&b.title))
    });

    let mut groups: Vec<(Category, Vec<&RecipeRecord>)> = Vec::new();
    for (category, record) in tagged {
        match groups.last_mut() {
            Some((current, items)) if *current == category => items.push(record),
            _ => groups.push((category, vec![record])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_record;

    fn recipe(title: &str, ingredients: &[&str]) -> RecipeRecord {
        RecipeRecord {
            ingredients: ingredients.iter().map(|s| (*s).to_owned()).collect(),
            ..sample_record("https://example.com/r", title)
        }
    }

    #[test]
    fn first_matching_table_wins() {
        assert_eq!(
            detect_category(&recipe("Chocolate Cake", &["flour"])),
            Category::Dessert
        );
        assert_eq!(
            detect_category(&recipe("Tomato Soup", &["tomatoes"])),
            Category::Soup
        );
        // "rice" is listed under main course before side dish.
        assert_eq!(
            detect_category(&recipe("Fried Rice", &["rice", "egg"])),
            Category::MainCourse
        );
        assert_eq!(
            detect_category(&recipe("Weeknight Dinner", &["1 lb salmon"])),
            Category::MainCourse
        );
        assert_eq!(
            detect_category(&recipe("Mango Smoothie", &["mango"])),
            Category::Beverage
        );
    }

    #[test]
    fn unmatched_recipes_fall_back_on_meat_check() {
        assert_eq!(
            detect_category(&recipe("Grandma's Special", &["lentils", "onion"])),
            Category::Vegetarian
        );
        assert_eq!(
            detect_category(&recipe("Sunday Roast", &["leg of lamb"])),
            Category::MainCourse
        );
    }

    #[test]
    fn groups_sort_by_label_then_title() {
        let records = vec![
            recipe("Tomato Soup", &["tomatoes"]),
            recipe("Apple Pie", &["apples"]),
            recipe("Banana Bread", &["bananas"]),
            recipe("Chicken Stew", &["carrots"]),
        ];

        let groups = group_by_category(&records);
        let summary = groups
            .iter()
            .map(|(category, items)| {
                (
                    category.label(),
                    items.iter().map(|r| r.title.as_str()).collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("Bread", vec!["Banana Bread"]),
                ("Dessert", vec!["Apple Pie"]),
                ("Soup", vec!["Chicken Stew", "Tomato Soup"]),
            ]
        );
    }
}
