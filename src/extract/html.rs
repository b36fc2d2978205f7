use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::ParsedRecipe;
use super::normalize::{clean_text, collapse_whitespace};

const TITLE_SELECTORS: &[&str] = &[
    "h1.recipe-title",
    "h1.entry-title",
    "h1[class*='recipe']",
    "h1[class*='title']",
    ".wprm-recipe-name",
    ".tasty-recipes-title",
    ".recipe-title",
    "[itemprop='name']",
    "h1",
    "title",
];

const INGREDIENT_SELECTORS: &[&str] = &[
    // WP Recipe Maker
    ".wprm-recipe-ingredient-group .wprm-recipe-ingredient",
    ".wprm-recipe-ingredients-container li",
    ".wprm-recipe-ingredients li",
    ".wprm-recipe-ingredient",
    // Tasty Recipes
    ".tasty-recipes-ingredients li",
    ".tasty-recipe-ingredients li",
    ".tasty-recipes-ingredient-item",
    // WP Ultimate Recipe
    ".wpurp-recipe-ingredients li",
    ".wpurp-recipe-ingredient",
    // schema.org microdata
    "[itemprop='recipeIngredient']",
    "[itemprop='ingredients']",
    // Theme and plugin conventions
    ".recipe-ingredients__item",
    ".recipe-ingredients__list-item",
    ".ingredients-list__item",
    ".ERSIngredients li",
    "[class*='ERS-ingredients'] li",
    "[class*='recipe-ingred_str']",
    "[class*='recipe-ingredients'] li",
    "[class*='ingredients-list'] li",
    "[class*='ingredient-item']",
    "ul.ingredients li",
    ".ingredients li",
    ".ingredient-list li",
    "[class*='ingredient'] li",
];

const INGREDIENT_CONTAINERS: &[&str] = &[".ingredients", ".recipe-ingredients"];

const INSTRUCTION_SELECTORS: &[&str] = &[
    // WP Recipe Maker
    ".wprm-recipe-instruction-group .wprm-recipe-instruction",
    ".wprm-recipe-instructions-container li",
    ".wprm-recipe-instructions li",
    ".wprm-recipe-instruction",
    // Tasty Recipes
    ".tasty-recipes-instructions li",
    ".tasty-recipe-instructions li",
    ".tasty-recipes-instruction-item",
    // WP Ultimate Recipe
    ".wpurp-recipe-instructions li",
    ".wpurp-recipe-instruction",
    // schema.org microdata
    "[itemprop='recipeInstructions'] li",
    "[itemprop='recipeInstructions']",
    // Theme and plugin conventions
    ".recipe-instructions__step",
    ".recipe-method__step",
    ".method-steps__item",
    ".preparation-step",
    ".recipe-method-step",
    ".ERSInstructions li",
    "[class*='ERS-instructions'] li",
    "[class*='recipe-instructions'] li",
    "[class*='recipe-steps'] li",
    "[class*='recipe-directions'] li",
    "[class*='recipe-method'] li",
    "ol.instructions li",
    ".instructions li",
    ".instruction-list li",
    "[class*='instruction'] li",
    "[class*='step'] li",
];

const INSTRUCTION_CONTAINERS: &[&str] = &[
    ".recipe-instructions",
    ".recipe-directions",
    ".instructions",
    ".directions",
];

const IMAGE_SELECTORS: &[&str] = &[
    ".wprm-recipe-image img",
    ".tasty-recipes-image img",
    ".recipe-image img",
    ".recipe-photo img",
    "img[itemprop='image']",
    "[class*='recipe'] img",
    ".hero-photo img",
];

/// Selector-based fallback for pages without structured recipe data.
///
/// Returns `None` when neither ingredients nor instructions can be found.
pub(crate) fn find_recipe(document: &Html, page_url: &Url) -> Option<ParsedRecipe> {
    let ingredients = first_list(document, INGREDIENT_SELECTORS)
        .or_else(|| container_list(document, INGREDIENT_CONTAINERS, "li"))
        .unwrap_or_default();
    let instructions = first_list(document, INSTRUCTION_SELECTORS)
        .or_else(|| container_list(document, INSTRUCTION_CONTAINERS, "p, li"))
        .unwrap_or_default();

    if ingredients.is_empty() && instructions.is_empty() {
        tracing::debug!(url = %page_url, "no ingredients or instructions matched any selector");
        return None;
    }

    Some(ParsedRecipe {
        title: first_text(document, TITLE_SELECTORS),
        description: meta_content(
            document,
            "meta[name='description'], meta[property='og:description']",
        ),
        ingredients,
        instructions,
        image_url: image_url(document, page_url),
        ..ParsedRecipe::default()
    })
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(err) => {
            tracing::debug!(css, ?err, "invalid selector");
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| selector(css))
        .flat_map(|selector| {
            document
                .select(&selector)
                .map(element_text)
                .collect::<Vec<_>>()
        })
        .find(|text| !text.is_empty())
}

fn first_list(document: &Html, selectors: &[&str]) -> Option<Vec<String>> {
    for css in selectors {
        let Some(selector) = selector(css) else {
            continue;
        };
        let items = document
            .select(&selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();
        if !items.is_empty() {
            tracing::debug!(selector = css, count = items.len(), "matched list selector");
            return Some(items);
        }
    }
    None
}

/// Items inside a known container, or its text split by lines when it has no list markup.
fn container_list(document: &Html, containers: &[&str], item_css: &str) -> Option<Vec<String>> {
    let item_selector = selector(item_css)?;
    for css in containers {
        let Some(container_selector) = selector(css) else {
            continue;
        };
        let Some(container) = document.select(&container_selector).next() else {
            continue;
        };

        let mut items = container
            .select(&item_selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();
        if items.is_empty() {
            let text = container.text().collect::<String>();
            items = text
                .lines()
                .map(collapse_whitespace)
                .filter(|line| !line.is_empty())
                .collect();
        }
        if !items.is_empty() {
            return Some(items);
        }
    }
    None
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(clean_text)
        .find(|text| !text.is_empty())
}

fn image_url(document: &Html, page_url: &Url) -> Option<String> {
    let from_img = IMAGE_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|selector| {
            document.select(&selector).find_map(|img| {
                let attrs = img.value();
                attrs
                    .attr("src")
                    .or_else(|| attrs.attr("data-src"))
                    .or_else(|| attrs.attr("data-lazy-src"))
                    .map(str::to_owned)
            })
        });
    let raw = from_img.or_else(|| meta_content(document, "meta[property='og:image']"))?;
    page_url.join(raw.trim()).ok().map(String::from)
}
