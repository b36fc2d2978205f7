use scraper::{Html, Selector};
use serde_json::Value;

use super::ParsedRecipe;
use super::normalize::{clean_list, clean_text, format_duration, split_steps};

const SCRIPT_SELECTOR: &str =
    "script[type='application/ld+json'], script[type='application/json']";

/// Find the first schema.org `Recipe` node in the page's JSON-LD blocks.
pub(crate) fn find_recipe(document: &Html) -> Option<ParsedRecipe> {
    let selector = Selector::parse(SCRIPT_SELECTOR).ok()?;
    for script in document.select(&selector) {
        let Some(value) = parse_block(&script.inner_html()) else {
            tracing::debug!("skipping unparseable JSON-LD block");
            continue;
        };
        if let Some(node) = recipe_node(&value) {
            return Some(parse_recipe(node));
        }
    }
    None
}

/// Strict parse first; hand-edited blocks get a second chance after cleanup.
fn parse_block(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    serde_json::from_str(raw)
        .or_else(|_| serde_json::from_str(&sanitize_json(raw)))
        .ok()
}

/// Drop control characters, leading junk, HTML comment markers and trailing commas.
///
/// Comment markers and commas are only touched outside string literals.
fn sanitize_json(raw: &str) -> String {
    let mut cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    if !cleaned.starts_with('{')
        && !cleaned.starts_with('[')
        && let Some(start) = cleaned.find(['{', '['])
    {
        cleaned = cleaned[start..].to_owned();
    }

    let mut out = String::with_capacity(cleaned.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut idx = 0;
    while let Some(ch) = cleaned[idx..].chars().next() {
        let rest = &cleaned[idx..];
        idx += ch.len_utf8();

        if in_string {
            out.push(ch);
            match (escaped, ch) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }

        if rest.starts_with("<!--") {
            idx += "<!--".len() - 1;
            continue;
        }
        if rest.starts_with("-->") {
            idx += "-->".len() - 1;
            continue;
        }
        if ch == ',' && cleaned[idx..].trim_start().starts_with([']', '}']) {
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }
    out
}

fn is_recipe(value: &Value) -> bool {
    fn is_recipe_type(ty: &str) -> bool {
        ty.eq_ignore_ascii_case("recipe") || ty.ends_with(":Recipe") || ty.ends_with("/Recipe")
    }

    match value.get("@type") {
        Some(Value::String(ty)) => is_recipe_type(ty),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(is_recipe_type),
        _ => false,
    }
}

fn recipe_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if is_recipe(value) {
                return Some(value);
            }
            if let Some(found) = map.get("@graph").and_then(recipe_node) {
                return Some(found);
            }
            map.iter()
                .filter(|(key, _)| key.as_str() != "@graph")
                .find_map(|(_, child)| recipe_node(child))
        }
        Value::Array(items) => items.iter().find_map(recipe_node),
        _ => None,
    }
}

fn parse_recipe(node: &Value) -> ParsedRecipe {
    ParsedRecipe {
        title: first_text(node, &["name", "headline"]),
        description: first_text(node, &["description"]),
        ingredients: ingredients(node),
        instructions: instructions(node),
        image_url: image_url(node),
        prep_time: duration(node, "prepTime"),
        cook_time: duration(node, "cookTime"),
        total_time: duration(node, "totalTime"),
        servings: servings(node),
    }
}

fn first_text(node: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| node.get(*key))
        .filter_map(text_of)
        .map(|text| clean_text(&text))
        .find(|text| !text.is_empty())
}

/// Text carried by a scalar or a `{ "text": ... }` / `{ "name": ... }` object.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("name"))
            .or_else(|| map.get("@value"))
            .and_then(text_of),
        Value::Array(items) => items.iter().find_map(text_of),
        _ => None,
    }
}

fn ingredients(node: &Value) -> Vec<String> {
    let Some(raw) = ["recipeIngredient", "ingredients", "recipeIngredients"]
        .iter()
        .find_map(|key| node.get(*key))
    else {
        return Vec::new();
    };

    match raw {
        Value::String(s) => clean_list(s.lines()),
        Value::Array(items) => clean_list(items.iter().filter_map(text_of)),
        Value::Object(map) => clean_list(map.values().filter_map(text_of)),
        _ => Vec::new(),
    }
}

fn instructions(node: &Value) -> Vec<String> {
    let mut steps = Vec::new();
    if let Some(raw) = node
        .get("recipeInstructions")
        .or_else(|| node.get("instructions"))
    {
        collect_steps(raw, &mut steps);
    }
    steps
}

fn collect_steps(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(split_steps(s)),
        Value::Array(items) => {
            for item in items {
                collect_steps(item, out);
            }
        }
        Value::Object(map) => {
            // HowToSection nests its HowToSteps under itemListElement.
            if let Some(elements) = map.get("itemListElement") {
                collect_steps(elements, out);
            } else if let Some(text) = ["text", "step", "description", "name"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(Value::as_str)
            {
                out.extend(split_steps(text));
            }
        }
        _ => {}
    }
}

fn image_url(node: &Value) -> Option<String> {
    fn url_of(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_owned()),
            Value::Array(items) => items.iter().find_map(url_of),
            Value::Object(map) => map
                .get("url")
                .or_else(|| map.get("contentUrl"))
                .and_then(url_of),
            _ => None,
        }
    }

    ["image", "images", "thumbnailUrl"]
        .iter()
        .filter_map(|key| node.get(*key))
        .find_map(url_of)
        .filter(|url| !url.is_empty())
}

fn duration(node: &Value, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_str)
        .and_then(format_duration)
}

fn servings(node: &Value) -> Option<String> {
    ["recipeYield", "yield"]
        .iter()
        .filter_map(|key| node.get(*key))
        .filter_map(text_of)
        .map(|text| clean_text(&text))
        .find(|text| !text.is_empty())
}
