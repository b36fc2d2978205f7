use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use anyhow::Context as _;

use crate::formats::RecipeRecord;

pub const DEFAULT_LINKS_FILE: &str = "recipe_links.md";

/// URLs from a link list, in file order.
///
/// Accepts markdown bullets (`- [Title](url)`), bare bullets (`- url`) and bare URL
/// lines; headings, blank lines and other text are skipped.
pub fn parse_link_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let item = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .unwrap_or(line)
                .trim();
            if item.starts_with('[') {
                return parse_markdown_link_target(item);
            }
            is_web_url(item).then(|| item.to_owned())
        })
        .collect()
}

pub fn read_link_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read link list: {}", path.display()))?;
    let urls = parse_link_list(&contents);
    tracing::info!(path = %path.display(), count = urls.len(), "loaded link list");
    Ok(urls)
}

/// Write the successful recipes as a markdown link list that `read_link_list` can load.
pub fn write_link_list(path: &Path, records: &[RecipeRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create link list dir: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create link list: {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(out, "# Recipe Links - {stamp}\n")?;
    for record in records {
        writeln!(
            out,
            "- [{}]({})",
            escape_link_text(&record.title),
            record.source_url
        )?;
    }
    out.flush()
        .with_context(|| format!("flush link list: {}", path.display()))?;

    tracing::info!(path = %path.display(), count = records.len(), "saved link list");
    Ok(())
}

fn parse_markdown_link_target(item: &str) -> Option<String> {
    let link_start = item.rfind("](")?;
    let after = &item[link_start + 2..];
    let link_end = after.rfind(')')?;
    let target = after[..link_end].trim();
    is_web_url(target).then(|| target.to_owned())
}

fn is_web_url(text: &str) -> bool {
    (text.starts_with("http://") || text.starts_with("https://"))
        && !text.contains(char::is_whitespace)
}

fn escape_link_text(title: &str) -> String {
    title.replace('[', "(").replace(']', ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_record;

    #[test]
    fn parses_markdown_and_bare_urls() {
        let contents = "# Recipe Links - 2024-05-01 10:00:00\n\
            \n\
            - [Best Bread](https://sitea.com/bread)\n\
            - [Soup (easy)](https://siteb.com/soup?id=2)\n\
            https://sitec.com/pie\n\
            - https://sited.com/salad\n\
            some note about dinner\n\
            - [Local file](notes.md)\n";

        assert_eq!(
            parse_link_list(contents),
            vec![
                "https://sitea.com/bread",
                "https://siteb.com/soup?id=2",
                "https://sitec.com/pie",
                "https://sited.com/salad",
            ]
        );
    }

    #[test]
    fn saved_list_loads_back() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("links.md");
        let records = vec![
            sample_record("https://sitea.com/bread", "Bread [v2]"),
            sample_record("https://siteb.com/soup", "Soup"),
        ];

        write_link_list(&path, &records)?;

        let text = std::fs::read_to_string(&path)?;
        assert!(text.starts_with("# Recipe Links - "));
        assert!(text.contains("- [Bread (v2)](https://sitea.com/bread)"));
        assert_eq!(
            read_link_list(&path)?,
            vec!["https://sitea.com/bread", "https://siteb.com/soup"]
        );
        Ok(())
    }
}
