use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/blocky.typeface.json");

fn glyph_glow() -> Command {
    Command::cargo_bin("glyph-glow").expect("binary exists")
}

fn write_config(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp config");
    tmp.write_all(xml.as_bytes()).expect("write config");
    tmp
}

#[test]
fn headless_run_prints_final_state() {
    glyph_glow()
        .args(["--headless", "--frames", "10", "--font", FONT])
        .assert()
        .success()
        .stdout(contains("Final state:"))
        .stdout(contains("Frames: 10 time=0.50"))
        .stdout(contains("Marker pos=(0.00, 0.00, 2.00) rot=(0.10, 0.10)"))
        .stdout(contains("Light pos=(0.00, 0.00, 2.00)"))
        .stdout(contains("Glyphs: 2"))
        .stdout(contains(" - letter \"L\" plastic"))
        .stdout(contains(" - digit \"7\" metal"));
}

#[test]
fn keys_move_marker_light_and_camera() {
    glyph_glow()
        .args(["--headless", "--frames", "1", "--keys", "wwwsdd", "--font", FONT])
        .assert()
        .success()
        .stdout(contains("Marker pos=(0.00, 4.00, 2.00)"))
        .stdout(contains("Light pos=(0.00, 4.00, 2.00)"))
        .stdout(contains("Camera pos=(0.20, 0.00, 5.00)"));
}

#[test]
fn uppercase_keys_are_not_bound() {
    glyph_glow()
        .args(["--headless", "--frames", "1", "--keys", "WASD", "--font", FONT])
        .assert()
        .success()
        .stdout(contains("Marker pos=(0.00, 0.00, 2.00)"))
        .stdout(contains("Camera pos=(0.00, 0.00, 5.00)"));
}

#[test]
fn missing_font_renders_without_glyphs() {
    glyph_glow()
        .args(["--headless", "--frames", "3", "--font", "/nonexistent/typeface.json"])
        .assert()
        .success()
        .stdout(contains("Frames: 3"))
        .stdout(contains("Glyphs: 0"))
        .stdout(contains(" - letter \"L\" plastic").not());
}

#[test]
fn config_file_replaces_glyphs_and_controls() {
    let config = write_config(
        r##"<scene>
  <light><position>1 0 2</position></light>
  <glyph><label>word</label><text>HI</text><material>metal</material><color>#ffffff</color></glyph>
  <controls><marker-step>0.5</marker-step><up>k</up></controls>
</scene>
"##,
    );
    glyph_glow()
        .arg("--config")
        .arg(config.path())
        .args(["--headless", "--frames", "2", "--keys", "kkw", "--font", FONT])
        .assert()
        .success()
        .stdout(contains("Scene with 1 glyph(s)"))
        .stdout(contains("Marker pos=(1.00, 1.00, 2.00)"))
        .stdout(contains("Glyphs: 1"))
        .stdout(contains(" - word \"HI\" metal"));
}

#[test]
fn invalid_config_is_reported() {
    let config = write_config("<scene><glyph><label>empty</label></glyph></scene>");
    glyph_glow()
        .arg("--config")
        .arg(config.path())
        .arg("--headless")
        .assert()
        .failure()
        .stderr(contains("failed to parse scene config"));
}

#[test]
fn unknown_arguments_are_rejected() {
    glyph_glow()
        .arg("--bogus")
        .assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}
