//! `.thl` packages carry a document's fonts to a machine that has none.

#[path = "../src/test_helpers.rs"]
#[allow(dead_code)]
mod test_helpers;

use image::GenericImageView;
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::{document, text_block, write_font};
use thumbnail_maker::fonts::{FontCache, FontFetcher, SourceError};
use thumbnail_maker::overrides::Overrides;
use thumbnail_maker::package::{install_package, write_package};
use thumbnail_maker::render::{RenderOptions, Renderer};

/// A network that is always down.
struct Offline;

impl FontFetcher for Offline {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        Err(SourceError::Fetch {
            url: url.to_string(),
            message: "offline".to_string(),
        })
    }
}

fn cache(dir: &std::path::Path) -> FontCache {
    FontCache::with_fetcher(dir, Arc::new(Offline))
}

#[test]
fn packaged_document_renders_without_its_original_fonts() {
    let tmp = TempDir::new().unwrap();
    let font = write_font(tmp.path(), "square.ttf");
    let json = document(400, 300, "#000000", &[text_block("A", "mc", &font)]).to_string();
    let thl = tmp.path().join("thumb.thl");

    let report = write_package(&json, &cache(&tmp.path().join("author-fonts")), &thl).unwrap();
    assert_eq!(report.packed.len(), 1);
    std::fs::remove_file(&font).unwrap();

    // A different machine: empty cache, no font file, no network.
    let fonts = tmp.path().join("reader-fonts");
    let pkg = install_package(&thl, &cache(&fonts)).unwrap();
    assert_eq!(pkg.json, json);

    let renderer = Renderer::new(cache(&fonts), RenderOptions::default());
    let png = renderer.render(&pkg.document).unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!(img.get_pixel(200, 150).0[..3], [255, 255, 255]);
    assert_eq!(img.get_pixel(10, 10).0[..3], [0, 0, 0]);
}

#[test]
fn overrides_apply_to_an_installed_package() {
    let tmp = TempDir::new().unwrap();
    let font = write_font(tmp.path(), "square.ttf");
    let json = document(400, 300, "#000000", &[text_block("old", "tl", &font)]).to_string();
    let thl = tmp.path().join("thumb.thl");
    write_package(&json, &cache(&tmp.path().join("a")), &thl).unwrap();

    let mut doc = install_package(&thl, &cache(&tmp.path().join("b"))).unwrap().document;
    Overrides {
        title: Some("first\\nsecond".to_string()),
        ..Overrides::default()
    }
    .apply(&mut doc);
    assert_eq!(doc.texts[0].content, "first\nsecond");
}

#[test]
fn package_with_unreachable_fonts_still_holds_the_document() {
    let tmp = TempDir::new().unwrap();
    let mut block = text_block("A", "mc", std::path::Path::new("unused"));
    block["font"]["faces"][0]["url"] = serde_json::json!("https://fonts.test/gone.woff2");
    let json = document(100, 100, "#000000", &[block]).to_string();
    let thl = tmp.path().join("thumb.thl");

    let report = write_package(&json, &cache(&tmp.path().join("fonts")), &thl).unwrap();
    assert!(report.packed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key.name, "Square");

    let pkg = install_package(&thl, &cache(&tmp.path().join("other"))).unwrap();
    assert!(pkg.installed.is_empty());
    assert_eq!(pkg.json, json);
}
