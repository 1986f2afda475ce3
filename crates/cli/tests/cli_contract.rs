use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn letter_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture should serialize");
    buffer
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("fixture should be written");
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should contain valid json")
}

const MARKUP_SCRIPT: &str = r##"[
    {"action": "color", "color": "#ff0000"},
    {"action": "tool", "tool": "highlight"},
    {"action": "select", "text": "Total due", "x": 66, "y": 66, "width": 150, "height": 20},
    {"action": "tool", "tool": "comment"},
    {"action": "click", "x": 216, "y": 216},
    {"action": "comment_text", "text": "Check this"}
]"##;

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "form.pdf", &letter_pdf(2));

    let output = cargo_bin_cmd!("docsign-cli").arg("info").arg(&pdf).assert().success();
    let value = stdout_json(output.get_output());

    let pages: Vec<String> = value["pages"]
        .as_array()
        .expect("pages should be an array")
        .iter()
        .map(|page| format!("{}:{}x{}", page["page"], page["width"], page["height"]))
        .collect();
    let summary = format!(
        "{} {} [{}]",
        value["mime_type"].as_str().unwrap_or_default(),
        value["page_count"],
        pages.join(", ")
    );

    insta::assert_snapshot!(summary, @"application/pdf 2 [1:612.0x792.0, 2:612.0x792.0]");
    assert_eq!(value["path"], Value::String(pdf.display().to_string()));
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("docsign-cli")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "invalid.pdf", b"definitely not a pdf");

    cargo_bin_cmd!("docsign-cli")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let mut bytes = letter_pdf(1);
    bytes.extend_from_slice(b"\n% /Encrypt\n");
    let pdf = write_file(temp.path(), "encrypted-marker.pdf", &bytes);

    cargo_bin_cmd!("docsign-cli")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn annotate_writes_prefixed_copy_beside_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = letter_pdf(1);
    let pdf = write_file(temp.path(), "form.pdf", &source);
    let script = write_file(temp.path(), "script.json", MARKUP_SCRIPT.as_bytes());
    let expected = temp.path().join("annotated-form.pdf");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(temp.path().join("config"))
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("annotated-form.pdf"));

    let doc = Document::load(&expected).expect("exported PDF should parse");
    let (_, page_id) = doc.get_pages().into_iter().next().expect("one page");
    let page = doc.get_dictionary(page_id).expect("page dictionary");
    let annots = page.get(b"Annots").and_then(Object::as_array).expect("annotations array");
    assert_eq!(annots.len(), 1);

    let comment = doc
        .dereference(&annots[0])
        .and_then(|(_, object)| object.as_dict())
        .expect("comment annotation");
    assert_eq!(comment.get(b"Subtype").and_then(Object::as_name).ok(), Some(&b"Text"[..]));

    let original = fs::read(&pdf).expect("input should still exist");
    assert_eq!(original, source, "input file must not be modified");
}

#[test]
fn annotate_honors_explicit_output_and_reports_rejected_steps() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "form.pdf", &letter_pdf(1));
    let script = write_file(
        temp.path(),
        "script.json",
        br#"[{"action": "save_signature"}, {"action": "tool", "tool": "underline"}]"#,
    );
    let output = temp.path().join("out").join("signed.pdf");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(temp.path().join("config"))
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("step 1 (save_signature)"));

    Document::load(&output).expect("exported PDF should parse");
}

#[test]
fn annotate_uses_export_prefix_from_config_dir() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config");
    fs::create_dir_all(&config).expect("config dir should be created");
    write_file(
        &config,
        "preferences.json",
        br#"{"version": 1, "preferences": {"export_prefix": "signed-"}}"#,
    );
    let pdf = write_file(temp.path(), "lease.pdf", &letter_pdf(1));
    let script = write_file(temp.path(), "script.json", b"[]");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .success();

    assert!(temp.path().join("signed-lease.pdf").exists());
}

#[test]
fn annotate_rejects_unreadable_preferences() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config");
    fs::create_dir_all(&config).expect("config dir should be created");
    write_file(&config, "preferences.json", br#"{"version": 99}"#);
    let pdf = write_file(temp.path(), "lease.pdf", &letter_pdf(1));
    let script = write_file(temp.path(), "script.json", b"[]");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load preferences"));
}

#[test]
fn overlays_describe_current_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "form.pdf", &letter_pdf(2));
    let script = write_file(temp.path(), "script.json", MARKUP_SCRIPT.as_bytes());

    let output = cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(temp.path().join("config"))
        .arg("overlays")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .success();
    let value = stdout_json(output.get_output());

    let overlays = value["overlays"].as_array().expect("overlays should be an array");
    let lines: Vec<String> = overlays
        .iter()
        .map(|overlay| {
            let shape = &overlay["shape"];
            let rect = &shape["rect"];
            format!(
                "{} {} {} @{},{} {}x{} {:?}",
                overlay["kind"].as_str().unwrap_or_default(),
                overlay["color"].as_str().unwrap_or_default(),
                shape["shape"].as_str().unwrap_or_default(),
                rect["x"],
                rect["y"],
                rect["width"],
                rect["height"],
                overlay["title"].as_str().unwrap_or_default(),
            )
        })
        .collect();

    assert_eq!(value["page"], 1);
    assert_eq!(value["zoom_percent"], 100);
    insta::assert_snapshot!(lines.join("\n"), @r#"
    highlight #ff0000 filled_rect @66.0,66.0 150.0x20.0 "Total due"
    comment #ff0000 badge @216.0,216.0 24.0x24.0 "Click to edit comment"
    "#);
    assert_eq!(overlays[1]["shape"]["number"], 2);
    assert!(overlays.iter().all(|overlay| overlay["id"].is_string()));
}

#[test]
fn overlays_follow_page_navigation() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "form.pdf", &letter_pdf(2));
    let mut steps: Value = serde_json::from_str(MARKUP_SCRIPT).expect("script is json");
    steps
        .as_array_mut()
        .expect("script is an array")
        .extend([serde_json::json!({"action": "next_page"}), serde_json::json!({"action": "zoom_in"})]);
    let script = write_file(temp.path(), "script.json", steps.to_string().as_bytes());

    let output = cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(temp.path().join("config"))
        .arg("overlays")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .success();
    let value = stdout_json(output.get_output());

    assert_eq!(value["page"], 2);
    assert_eq!(value["zoom_percent"], 110);
    assert_eq!(value["overlays"], Value::Array(Vec::new()));
}

#[test]
fn annotate_rejects_malformed_script() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "form.pdf", &letter_pdf(1));
    let script = write_file(temp.path(), "script.json", br#"{"action": "tool"}"#);

    cargo_bin_cmd!("docsign-cli")
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid script"));
}

#[test]
fn config_set_persists_and_feeds_later_commands() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .args(["config", "set", "--default-color", "#0000ff", "--export-prefix", "signed-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("preferences.json"));

    let output = cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .args(["config", "show"])
        .output()
        .expect("command should run");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["default_color"], "#0000ff");
    assert_eq!(json["export_prefix"], "signed-");
    assert_eq!(json["initial_zoom_percent"], 100);

    let pdf = write_file(temp.path(), "lease.pdf", &letter_pdf(1));
    let script = write_file(temp.path(), "script.json", b"[]");
    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .arg("annotate")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .success();
    assert!(temp.path().join("signed-lease.pdf").exists());
}

#[test]
fn config_set_rejects_color_outside_palette() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .args(["config", "set", "--default-color", "#123456"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("color #123456 is not in the palette"));

    assert!(!config.join("preferences.json").exists());
}

#[test]
fn config_reset_restores_defaults() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .args(["config", "set", "--zoom", "150"])
        .assert()
        .success();
    assert!(config.join("preferences.json").exists());

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .args(["config", "reset"])
        .assert()
        .success();
    assert!(!config.join("preferences.json").exists());

    let output = cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(&config)
        .args(["config", "show"])
        .output()
        .expect("command should run");
    assert_eq!(stdout_json(&output)["initial_zoom_percent"], 100);
}

#[test]
fn config_set_rejects_zoom_out_of_range() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("docsign-cli")
        .arg("--config-dir")
        .arg(temp.path().join("config"))
        .args(["config", "set", "--zoom", "900"])
        .assert()
        .failure();
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("docsign-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{}\n", env!("CARGO_PKG_VERSION"))));
}
