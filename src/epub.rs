use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest as _, Sha256};
use zip::write::SimpleFileOptions;

use crate::category::{Category, group_by_category};
use crate::error::AssembleError;
use crate::formats::RecipeRecord;

#[derive(Debug, Clone)]
pub struct BookOptions {
    pub title: String,
    /// BCP-47 language tag used for EPUB metadata and XHTML documents.
    pub lang: String,
    pub author: Option<String>,
    pub force: bool,
    /// Order chapters by detected category and nest the table of contents under category headings.
    pub categorize: bool,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self {
            title: "Recipe Book".to_owned(),
            lang: "en".to_owned(),
            author: None,
            force: false,
            categorize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSummary {
    pub path: PathBuf,
    pub chapters: usize,
    pub images: usize,
}

#[derive(Debug)]
struct ChapterPlan<'a> {
    id: String,
    record: &'a RecipeRecord,
    image: Option<usize>,
}

#[derive(Debug)]
struct ImageAsset<'a> {
    href: String,
    media_type: &'static str,
    bytes: &'a [u8],
}

/// Navigation group; `heading` is `None` when the book is not categorized.
#[derive(Debug)]
struct NavSection {
    heading: Option<Category>,
    chapters: Vec<usize>,
}

#[derive(Debug)]
struct Book<'a> {
    title: String,
    lang: String,
    author: Option<String>,
    chapters: Vec<ChapterPlan<'a>>,
    images: Vec<ImageAsset<'a>>,
    sections: Vec<NavSection>,
}

/// Package `records` as an EPUB 3 file with one chapter per record.
///
/// Nothing is written for an empty record list, and a partially written file is removed
/// when packaging fails.
pub fn assemble(
    records: &[RecipeRecord],
    out_path: &Path,
    options: &BookOptions,
) -> Result<BookSummary, AssembleError> {
    if records.is_empty() {
        return Err(AssembleError::Empty);
    }
    if out_path.exists() && !options.force {
        return Err(AssembleError::OutputExists(out_path.to_path_buf()));
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| AssembleError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let book = plan_book(records, options);

    let mut out_options = OpenOptions::new();
    out_options.write(true);
    if options.force {
        out_options.create(true).truncate(true);
    } else {
        out_options.create_new(true);
    }
    let out_file = out_options
        .open(out_path)
        .map_err(|source| AssembleError::Io {
            path: out_path.to_path_buf(),
            source,
        })?;

    if let Err(err) = write_archive(out_file, &book, out_path) {
        if let Err(rm_err) = fs::remove_file(out_path) {
            tracing::warn!(path = %out_path.display(), ?rm_err, "remove partial epub");
        }
        return Err(err);
    }

    let summary = BookSummary {
        path: out_path.to_path_buf(),
        chapters: book.chapters.len(),
        images: book.images.len(),
    };
    tracing::info!(
        path = %out_path.display(),
        chapters = summary.chapters,
        images = summary.images,
        "wrote epub"
    );
    Ok(summary)
}

fn plan_book<'a>(records: &'a [RecipeRecord], options: &BookOptions) -> Book<'a> {
    let grouped: Vec<(Option<Category>, Vec<&RecipeRecord>)> = if options.categorize {
        group_by_category(records)
            .into_iter()
            .map(|(category, items)| (Some(category), items))
            .collect()
    } else {
        vec![(None, records.iter().collect())]
    };

    let mut chapters = Vec::with_capacity(records.len());
    let mut images: Vec<ImageAsset<'a>> = Vec::new();
    let mut image_by_href: HashMap<String, usize> = HashMap::new();
    let mut sections = Vec::with_capacity(grouped.len());

    for (heading, items) in grouped {
        let mut section = NavSection {
            heading,
            chapters: Vec::with_capacity(items.len()),
        };
        for record in items {
            let image = record.image.as_ref().and_then(|image| {
                let Some(ext) = image.extension() else {
                    tracing::warn!(
                        url = %record.source_url,
                        media_type = %image.media_type,
                        "skipping image with unsupported media type"
                    );
                    return None;
                };
                let digest = hex::encode(Sha256::digest(&image.bytes));
                let href = format!("images/img_{}.{ext}", &digest[..16]);
                let idx = *image_by_href.entry(href.clone()).or_insert_with(|| {
                    images.push(ImageAsset {
                        href,
                        media_type: media_type_for_asset(ext),
                        bytes: &image.bytes,
                    });
                    images.len() - 1
                });
                Some(idx)
            });

            section.chapters.push(chapters.len());
            chapters.push(ChapterPlan {
                id: format!("recipe_{:03}", chapters.len() + 1),
                record,
                image,
            });
        }
        sections.push(section);
    }

    let title = options.title.trim();
    let lang = options.lang.trim();
    Book {
        title: if title.is_empty() {
            BookOptions::default().title
        } else {
            title.to_owned()
        },
        lang: if lang.is_empty() {
            "und".to_owned()
        } else {
            lang.to_owned()
        },
        author: options
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_owned),
        chapters,
        images,
        sections,
    }
}

fn write_archive(out_file: File, book: &Book<'_>, out_path: &Path) -> Result<(), AssembleError> {
    let io_err = |source: std::io::Error| AssembleError::Io {
        path: out_path.to_path_buf(),
        source,
    };

    let uuid = uuid::Uuid::new_v4();
    let modified = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let mut zip = zip::ZipWriter::new(out_file);

    // `mimetype` must be the first entry and stored uncompressed.
    let mimetype_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", mimetype_options)?;
    zip.write_all(b"application/epub+zip").map_err(io_err)?;

    let deflated_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let documents = [
        ("META-INF/container.xml", render_container_xml()),
        ("OEBPS/content.opf", render_content_opf(book, uuid, &modified)),
        ("OEBPS/nav.xhtml", render_nav_xhtml(book)),
        ("OEBPS/toc.ncx", render_toc_ncx(book, uuid)),
        ("OEBPS/style.css", default_style_css()),
    ];
    for (name, contents) in documents {
        zip.start_file(name, deflated_options)?;
        zip.write_all(contents.as_bytes()).map_err(io_err)?;
    }

    for chapter in &book.chapters {
        let xhtml = wrap_xhtml_document(
            &chapter.record.title,
            &book.lang,
            &render_chapter_body(chapter, &book.images),
        );
        zip.start_file(format!("OEBPS/{}.xhtml", chapter.id), deflated_options)?;
        zip.write_all(xhtml.as_bytes()).map_err(io_err)?;
    }

    for image in &book.images {
        // Images are already compressed.
        let stored = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);
        zip.start_file(format!("OEBPS/{}", image.href), stored)?;
        zip.write_all(image.bytes).map_err(io_err)?;
    }

    zip.finish()?;
    Ok(())
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn default_style_css() -> String {
    r#"@charset "utf-8";

html { font-family: serif; }
body { margin: 0; padding: 0 1.2em; line-height: 1.6; }
h1 { margin-bottom: 0.3em; }
h2 { margin-top: 1.4em; border-bottom: 1px solid #ddd; }
img { max-width: 100%; height: auto; }
.recipe-image { text-align: center; margin: 1em 0; }
.description { font-style: italic; }
.meta { color: #555; font-size: 0.9em; }
.ingredients li { margin: 0.2em 0; }
.instructions li { margin: 0.5em 0; }
.source { margin-top: 2em; font-size: 0.8em; color: #555; word-break: break-all; }
"#
    .to_string()
}

fn render_chapter_body(chapter: &ChapterPlan<'_>, images: &[ImageAsset<'_>]) -> String {
    let record = chapter.record;
    let mut out = String::new();
    out.push_str(&format!("<h1>{}</h1>\n", xml_escape(&record.title)));

    if let Some(description) = record.description.as_deref() {
        out.push_str(&format!(
            "<p class=\"description\">{}</p>\n",
            xml_escape(description)
        ));
    }

    if let Some(image) = chapter.image.and_then(|idx| images.get(idx)) {
        out.push_str(&format!(
            "<div class=\"recipe-image\"><img src=\"{}\" alt=\"{}\" /></div>\n",
            xml_escape(&image.href),
            xml_escape(&record.title)
        ));
    }

    let meta = [
        ("Prep", record.prep_time.as_deref()),
        ("Cook", record.cook_time.as_deref()),
        ("Total", record.total_time.as_deref()),
        ("Serves", record.servings.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| format!("{label}: {}", xml_escape(v))))
    .collect::<Vec<_>>();
    if !meta.is_empty() {
        out.push_str(&format!("<p class=\"meta\">{}</p>\n", meta.join(" | ")));
    }

    if !record.ingredients.is_empty() {
        out.push_str("<h2>Ingredients</h2>\n<ul class=\"ingredients\">\n");
        for ingredient in &record.ingredients {
            out.push_str(&format!("  <li>{}</li>\n", xml_escape(ingredient)));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("<h2>Instructions</h2>\n<ol class=\"instructions\">\n");
    for step in &record.instructions {
        out.push_str(&format!("  <li>{}</li>\n", xml_escape(step)));
    }
    out.push_str("</ol>\n");

    out.push_str(&format!(
        "<p class=\"source\">Source: <a href=\"{url}\">{url}</a></p>\n",
        url = xml_escape(&record.source_url)
    ));
    out
}

fn render_nav_xhtml(book: &Book<'_>) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(&book.lang),
        xml_escape(&book.lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(&book.title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&format!("  <h1>{}</h1>\n", xml_escape(&book.title)));
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str("    <ol>\n");
    for section in &book.sections {
        let indent = match section.heading {
            Some(category) => {
                out.push_str(&format!(
                    "      <li><span>{}</span>\n        <ol>\n",
                    xml_escape(category.label())
                ));
                "          "
            }
            None => "      ",
        };
        for &idx in &section.chapters {
            let chapter = &book.chapters[idx];
            out.push_str(&format!(
                "{indent}<li><a href=\"{}.xhtml\">{}</a></li>\n",
                xml_escape(&chapter.id),
                xml_escape(&chapter.record.title)
            ));
        }
        if section.heading.is_some() {
            out.push_str("        </ol>\n      </li>\n");
        }
    }
    out.push_str("    </ol>\n");
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn render_toc_ncx(book: &Book<'_>, uuid: uuid::Uuid) -> String {
    let depth = if book.sections.iter().any(|s| s.heading.is_some()) {
        2
    } else {
        1
    };

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"urn:uuid:{}\" />\n",
        xml_escape(&uuid.to_string())
    ));
    out.push_str(&format!(
        "    <meta name=\"dtb:depth\" content=\"{depth}\" />\n"
    ));
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str("  <docTitle><text>");
    out.push_str(&xml_escape(&book.title));
    out.push_str("</text></docTitle>\n");
    out.push_str("  <navMap>\n");

    let nav_point = |out: &mut String, indent: &str, id: &str, label: &str, chapter_idx: usize| {
        // Play order follows the spine; a category shares its first recipe's position.
        let play = chapter_idx + 1;
        out.push_str(&format!(
            "{indent}<navPoint id=\"{}\" playOrder=\"{play}\">\n",
            xml_escape(id)
        ));
        out.push_str(&format!(
            "{indent}  <navLabel><text>{}</text></navLabel>\n",
            xml_escape(label)
        ));
        out.push_str(&format!(
            "{indent}  <content src=\"{}.xhtml\" />\n",
            xml_escape(&book.chapters[chapter_idx].id)
        ));
    };

    for (section_idx, section) in book.sections.iter().enumerate() {
        let (Some(category), Some(&first)) = (section.heading, section.chapters.first()) else {
            for &idx in &section.chapters {
                let chapter = &book.chapters[idx];
                let id = format!("nav-{}", chapter.id);
                nav_point(&mut out, "    ", &id, &chapter.record.title, idx);
                out.push_str("    </navPoint>\n");
            }
            continue;
        };

        nav_point(
            &mut out,
            "    ",
            &format!("nav-category-{}", section_idx + 1),
            category.label(),
            first,
        );
        for &idx in &section.chapters {
            let chapter = &book.chapters[idx];
            let id = format!("nav-{}", chapter.id);
            nav_point(&mut out, "      ", &id, &chapter.record.title, idx);
            out.push_str("      </navPoint>\n");
        }
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn render_content_opf(book: &Book<'_>, uuid: uuid::Uuid, modified: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(&book.lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">urn:uuid:{}</dc:identifier>\n",
        xml_escape(&uuid.to_string())
    ));
    out.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&book.title)
    ));
    out.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(&book.lang)
    ));
    if let Some(author) = book.author.as_deref() {
        out.push_str(&format!(
            "    <dc:creator>{}</dc:creator>\n",
            xml_escape(author)
        ));
    }
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(modified)
    ));
    if !book.images.is_empty() {
        // EPUB 2 readers look for the cover here.
        out.push_str("    <meta name=\"cover\" content=\"img-1\" />\n");
    }
    out.push_str("  </metadata>\n");
    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
    );
    out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");

    for chapter in &book.chapters {
        out.push_str(&format!(
            "    <item id=\"{}\" href=\"{}.xhtml\" media-type=\"application/xhtml+xml\" />\n",
            xml_escape(&chapter.id),
            xml_escape(&chapter.id)
        ));
    }

    for (idx, image) in book.images.iter().enumerate() {
        let properties = if idx == 0 {
            " properties=\"cover-image\""
        } else {
            ""
        };
        out.push_str(&format!(
            "    <item id=\"img-{}\" href=\"{}\" media-type=\"{}\"{properties} />\n",
            idx + 1,
            xml_escape(&image.href),
            xml_escape(image.media_type)
        ));
    }

    out.push_str("  </manifest>\n");
    out.push_str("  <spine toc=\"ncx\">\n");
    for chapter in &book.chapters {
        out.push_str(&format!(
            "    <itemref idref=\"{}\" />\n",
            xml_escape(&chapter.id)
        ));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn media_type_for_asset(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn wrap_xhtml_document(title: &str, lang: &str, body_html: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use std::io::Read as _;

    use super::*;
    use crate::formats::RecipeImage;
    use crate::test_support::sample_record;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn read_entry(path: &Path, name: &str) -> anyhow::Result<String> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        let mut entry = archive.by_name(name)?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(text)
    }

    fn entry_names(path: &Path) -> anyhow::Result<Vec<String>> {
        let archive = zip::ZipArchive::new(File::open(path)?)?;
        Ok(archive.file_names().map(str::to_owned).collect())
    }

    fn chapter_count(path: &Path) -> anyhow::Result<usize> {
        Ok(entry_names(path)?
            .iter()
            .filter(|n| n.starts_with("OEBPS/recipe_") && n.ends_with(".xhtml"))
            .count())
    }

    #[test]
    fn one_chapter_per_record_with_cover_image() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("book").join("recipes.epub");

        let mut bread = sample_record("https://sitea.com/bread", "Bread");
        bread.image = Some(RecipeImage {
            media_type: "image/png".to_owned(),
            bytes: PNG.to_vec(),
        });
        bread.prep_time = Some("15m".to_owned());
        bread.servings = Some("4".to_owned());
        let soup = sample_record("https://siteb.com/soup", "Mac & Cheese <Deluxe>");

        let summary = assemble(
            &[bread, soup],
            &out,
            &BookOptions {
                author: Some("Home Cook".to_owned()),
                ..BookOptions::default()
            },
        )?;
        assert_eq!(summary.chapters, 2);
        assert_eq!(summary.images, 1);
        assert_eq!(chapter_count(&out)?, 2);

        let mut archive = zip::ZipArchive::new(File::open(&out)?)?;
        let first = archive.by_index(0)?;
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        drop(first);

        let opf = read_entry(&out, "OEBPS/content.opf")?;
        assert!(opf.contains("properties=\"cover-image\""));
        assert!(opf.contains("<dc:creator>Home Cook</dc:creator>"));
        assert!(opf.contains("<dc:title>Recipe Book</dc:title>"));
        assert_eq!(opf.matches("<itemref ").count(), 2);

        let chapter = read_entry(&out, "OEBPS/recipe_001.xhtml")?;
        assert!(chapter.contains("<h1>Bread</h1>"));
        assert!(chapter.contains("<img src=\"images/img_"));
        assert!(chapter.contains("Prep: 15m | Serves: 4"));
        assert!(chapter.contains("<li>Mix.</li>"));
        assert!(chapter.contains("href=\"https://sitea.com/bread\""));

        let escaped = read_entry(&out, "OEBPS/recipe_002.xhtml")?;
        assert!(escaped.contains("<h1>Mac &amp; Cheese &lt;Deluxe&gt;</h1>"));
        assert!(!escaped.contains("<img"));
        Ok(())
    }

    #[test]
    fn empty_input_writes_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("recipes.epub");

        let err = assemble(&[], &out, &BookOptions::default()).expect_err("empty");
        assert!(matches!(err, AssembleError::Empty));
        assert_eq!(err.kind(), crate::error::FailureKind::AssemblyFailed);
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn existing_output_requires_force() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("recipes.epub");
        std::fs::write(&out, b"old")?;
        let records = [sample_record("https://sitea.com/bread", "Bread")];

        let err = assemble(&records, &out, &BookOptions::default()).expect_err("exists");
        assert!(matches!(err, AssembleError::OutputExists(_)));
        assert_eq!(std::fs::read(&out)?, b"old");

        let options = BookOptions {
            force: true,
            ..BookOptions::default()
        };
        assemble(&records, &out, &options)?;
        assert_eq!(chapter_count(&out)?, 1);
        Ok(())
    }

    #[test]
    fn unusable_images_are_skipped_not_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("recipes.epub");
        let mut record = sample_record("https://sitea.com/bread", "Bread");
        record.image = Some(RecipeImage {
            media_type: "application/octet-stream".to_owned(),
            bytes: vec![1, 2, 3],
        });

        let summary = assemble(&[record], &out, &BookOptions::default())?;
        assert_eq!(summary.images, 0);
        assert!(
            !entry_names(&out)?
                .iter()
                .any(|n| n.starts_with("OEBPS/images/"))
        );
        Ok(())
    }

    #[test]
    fn categorized_books_group_navigation_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("recipes.epub");
        let records = [
            sample_record("https://a.test/soup", "Tomato Soup"),
            sample_record("https://a.test/pie", "Apple Pie"),
            sample_record("https://a.test/stew", "Beef Stew"),
        ];

        let options = BookOptions {
            categorize: true,
            ..BookOptions::default()
        };
        let summary = assemble(&records, &out, &options)?;
        assert_eq!(summary.chapters, 3);
        assert_eq!(chapter_count(&out)?, 3);

        let nav = read_entry(&out, "OEBPS/nav.xhtml")?;
        let dessert = nav.find("<span>Dessert</span>").expect("dessert heading");
        let soup = nav.find("<span>Soup</span>").expect("soup heading");
        assert!(dessert < soup);
        assert!(nav.find("Beef Stew").expect("stew") < nav.find("Tomato Soup").expect("soup"));

        // Dessert sorts first, so its only recipe becomes the first chapter.
        let first = read_entry(&out, "OEBPS/recipe_001.xhtml")?;
        assert!(first.contains("<h1>Apple Pie</h1>"));

        let ncx = read_entry(&out, "OEBPS/toc.ncx")?;
        assert!(ncx.contains("<meta name=\"dtb:depth\" content=\"2\" />"));
        assert_eq!(ncx.matches("<navPoint ").count(), 5);
        Ok(())
    }
}
