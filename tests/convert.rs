//! End-to-end conversion with the real zip and image codecs.

use cbz_recode::archive::{ArchiveBackend, ZipBackend};
use cbz_recode::config::{Config, load_config};
use cbz_recode::pipeline::{self, Paths, PipelineEvent};
use cbz_recode::types::{ArchiveStatus, Warning};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn noisy_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    // Cheap deterministic noise so PNG can't compress it to nothing
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ seed).wrapping_mul(2_654_435_761);
        Rgb([(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

struct Library {
    tmp: TempDir,
    paths: Paths,
}

fn library() -> Library {
    let tmp = TempDir::new().unwrap();
    let paths = Paths {
        source: tmp.path().join("library"),
        destination: tmp.path().join("converted"),
        scratch: tmp.path().join("scratch"),
    };
    fs::create_dir_all(&paths.source).unwrap();
    fs::create_dir_all(&paths.destination).unwrap();
    Library { tmp, paths }
}

#[test]
fn three_pages_and_a_text_file_become_four_flat_entries() {
    let lib = library();
    fs::create_dir_all(lib.paths.source.join("Series")).unwrap();
    write_zip(
        &lib.paths.source.join("Series/vol1.cbz"),
        &[
            ("ch1/001.png", encode(&noisy_image(64, 96, 1), ImageFormat::Png)),
            ("ch1/002.webp", encode(&noisy_image(64, 96, 2), ImageFormat::WebP)),
            ("ch2/003.bmp", encode(&noisy_image(64, 96, 3), ImageFormat::Bmp)),
            ("ComicInfo.xml", b"<ComicInfo/>".to_vec()),
        ],
    );

    let summary = pipeline::run(&lib.paths, &Config::default(), None).unwrap();

    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.converted(), 1);
    let report = &summary.archives[0];
    assert_eq!(report.status, ArchiveStatus::Done);
    assert_eq!(report.converted_files, 3);
    assert_eq!(report.packed_entries, 4);
    assert!(
        !report
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::EntryCountMismatch { .. }))
    );

    let target = lib.paths.destination.join("Series/vol1.cbz");
    let entries = ZipBackend::default().list_entries(&target).unwrap();
    assert_eq!(entries, vec!["001.jpg", "002.jpg", "003.jpg", "ComicInfo.xml"]);

    let page = read_entry(&target, "002.jpg");
    assert_eq!(image::guess_format(&page).unwrap(), ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&page).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 96));
    assert_eq!(read_entry(&target, "ComicInfo.xml"), b"<ComicInfo/>");

    // Source untouched, scratch gone
    assert!(lib.paths.source.join("Series/vol1.cbz").exists());
    assert!(!lib.paths.scratch.exists());
}

#[test]
fn one_undecodable_page_of_five_is_skipped_with_a_warning() {
    let lib = library();
    let mut entries: Vec<(String, Vec<u8>)> = (1..=4)
        .map(|i| {
            (
                format!("{i:03}.png"),
                encode(&noisy_image(32, 32, i), ImageFormat::Png),
            )
        })
        .collect();
    entries.push(("005.png".into(), b"\x89PNG\r\n\x1a\nbroken".to_vec()));
    let borrowed: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.clone()))
        .collect();
    write_zip(&lib.paths.source.join("book.cbz"), &borrowed);

    let summary = pipeline::run(&lib.paths, &Config::default(), None).unwrap();

    let report = &summary.archives[0];
    assert!(report.is_done());
    assert_eq!(report.converted_files, 4);
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        Warning::UnreadableImage { path, .. } if path.ends_with("005.png")
    )));
    let entries = ZipBackend::default()
        .list_entries(&lib.paths.destination.join("book.cbz"))
        .unwrap();
    assert_eq!(entries, vec!["001.jpg", "002.jpg", "003.jpg", "004.jpg"]);
}

#[test]
fn archives_below_threshold_are_left_alone() {
    let lib = library();
    write_zip(
        &lib.paths.source.join("few.cbz"),
        &[("001.png", encode(&noisy_image(8, 8, 1), ImageFormat::Png))],
    );
    write_zip(
        &lib.paths.source.join("many.cbz"),
        &[
            ("001.png", encode(&noisy_image(8, 8, 1), ImageFormat::Png)),
            ("002.png", encode(&noisy_image(8, 8, 2), ImageFormat::Png)),
        ],
    );
    let config_path = lib.tmp.path().join("config.toml");
    fs::write(&config_path, "[scan]\nthreshold = 2\n").unwrap();
    let config = load_config(Some(&config_path)).unwrap();

    let summary = pipeline::run(&lib.paths, &config, None).unwrap();

    assert_eq!(summary.candidates, 1);
    assert!(lib.paths.destination.join("many.cbz").exists());
    assert!(!lib.paths.destination.join("few.cbz").exists());
}

#[test]
fn fallback_never_raises_quality_and_reports_every_pass() {
    let lib = library();
    // Noise does not fit a 5% budget, so the loop runs down to the floor
    write_zip(
        &lib.paths.source.join("noise.cbz"),
        &[("001.png", encode(&noisy_image(64, 64, 9), ImageFormat::Png))],
    );
    let overlay: toml::Value = toml::from_str(
        r#"
[jpeg]
quality = 90

[fallback]
ratio = 0.05
step = 20
floor = 10
"#,
    )
    .unwrap();
    let config = cbz_recode::config::resolve_config(Some(overlay)).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();

    let summary = pipeline::run(&lib.paths, &config, Some(tx)).unwrap();

    let report = &summary.archives[0];
    let qualities: Vec<u8> = report.quality_attempts.iter().map(|(q, _)| *q).collect();
    assert_eq!(qualities.first(), Some(&90));
    assert!(qualities.windows(2).all(|w| w[0] - w[1] == 20));
    assert!(qualities.iter().all(|&q| q >= 10));
    assert!(qualities.len() <= 1 + (90 - 10) / 20);

    let events: Vec<u8> = rx
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::QualityAttempt { quality, .. } => Some(quality),
            _ => None,
        })
        .collect();
    assert_eq!(events, qualities);
}

#[test]
fn missing_destination_refuses_to_start() {
    let lib = library();
    fs::remove_dir_all(&lib.paths.destination).unwrap();

    let result = pipeline::run(&lib.paths, &Config::default(), None);
    assert!(matches!(
        result,
        Err(pipeline::PipelineError::InvalidPath { .. })
    ));
}
