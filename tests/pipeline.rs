use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use geojson::Geometry;
use serde_json::{Value, json};
use tempfile::TempDir;

use aoi_builder::browse::BrowseClient;
use aoi_builder::config::AoiConfig;
use aoi_builder::error::AoiError;
use aoi_builder::notify::{Mailer, Notification};
use aoi_builder::pipeline::Pipeline;
use aoi_builder::product::{ProductLayout, ProductWriter};
use aoi_builder::tools::{ImageryTools, ToolInfo};

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Notification>>,
}

impl Mailer for &RecordingMailer {
    fn send(&self, notification: &Notification) -> Result<(), AoiError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct FakeBrowse;

impl BrowseClient for FakeBrowse {
    fn fetch(&self, url: &str, destination: &Utf8Path) -> Result<(), AoiError> {
        if url.contains("missing") {
            return Err(AoiError::BrowseStatus {
                status: 404,
                message: "not found".to_string(),
            });
        }
        fs::write(destination, b"png").map_err(|err| AoiError::Filesystem(err.to_string()))
    }
}

#[derive(Default)]
struct FakeTools {
    fail_tiles: bool,
    calls: Mutex<Vec<String>>,
}

impl ImageryTools for &FakeTools {
    fn generate_browse(&self, _location: &Geometry, base: &Utf8Path) -> Result<(), AoiError> {
        self.calls.lock().unwrap().push("browse".to_string());
        fs::write(format!("{base}.browse.png"), b"png").unwrap();
        fs::write(format!("{base}.geo.tif"), b"tif").unwrap();
        Ok(())
    }

    fn generate_tiles(&self, geotiff: &Utf8Path, out_dir: &Utf8Path) -> Result<(), AoiError> {
        self.calls.lock().unwrap().push("tiles".to_string());
        if self.fail_tiles {
            return Err(AoiError::MissingTool("gdal2tiles".to_string()));
        }
        assert!(geotiff.exists());
        fs::create_dir_all(out_dir).unwrap();
        Ok(())
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            browse_generator: None,
            gdal2tiles: None,
        }
    }
}

struct Fixture {
    _dir: TempDir,
    root: Utf8PathBuf,
    config: AoiConfig,
}

fn fixture(context: Value) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let templates = root.join("config");
    fs::create_dir_all(&templates).unwrap();
    fs::write(
        templates.join("AOI.dataset.json"),
        r#"{"version": "v2.0", "label": "", "emails": ["ops@example.org"]}"#,
    )
    .unwrap();
    fs::write(templates.join("AOI.met.json"), "{}").unwrap();
    fs::write(
        templates.join("success_email.txt"),
        "{0}|{1}|{2}|{3}|{4}|{5}|{6}|{7}",
    )
    .unwrap();
    fs::write(
        templates.join("failure_email.txt"),
        "{0}|{1}|{2}|{3}|{4}|{5}",
    )
    .unwrap();
    fs::write(root.join("_context.json"), context.to_string()).unwrap();
    fs::write(
        root.join("_job.json"),
        r#"{"job_id": "job-42", "task_id": "task-7"}"#,
    )
    .unwrap();

    let config = AoiConfig {
        templates_dir: templates,
        context_file: root.join("_context.json"),
        job_file: root.join("_job.json"),
        output_root: root.join("products"),
        ..AoiConfig::default()
    };
    Fixture {
        _dir: dir,
        root,
        config,
    }
}

fn context() -> Value {
    json!({
        "type": "flood",
        "name": "North Ridge",
        "account": "hazards",
        "geojson_polygon": "[[0, 0], [0, 1], [1, 1], [1, 0]]",
        "starttime": "2021-03-01 10:00",
        "endtime": "2021-03-08",
        "emails": "analyst@example.org, ops@example.org",
        "username": "analyst"
    })
}

#[test]
fn generated_browse_and_tiles() {
    let fx = fixture(context());
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let pipeline = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.label, "AOI_flood_North_Ridge");
    assert!(summary.browse && summary.tiles && summary.notified);

    let layout = ProductLayout::new(&fx.root.join("products"), "AOI_flood_North_Ridge");
    assert!(layout.generated_browse_small_path().exists());
    assert!(layout.tiles_dir().exists());
    assert_eq!(*tools.calls.lock().unwrap(), vec!["browse", "tiles"]);

    let writer = ProductWriter::new(layout);
    let ds = writer.load_dataset().unwrap();
    assert_eq!(ds.starttime, "2021-03-01T10:00:00Z");
    assert_eq!(ds.endtime, "2021-03-08T00:00:00Z");
    assert_eq!(ds.emails, vec!["analyst@example.org", "ops@example.org"]);
    assert_eq!(ds.extra.get("version"), Some(&json!("v2.0")));
    let met = writer.load_metadata().unwrap();
    assert_eq!(met.tiles, Some(true));
    assert_eq!(met.username.as_deref(), Some("analyst"));

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Completed: Create AOI AOI_flood_North_Ridge");
    assert_eq!(sent[0].recipients, ds.emails);
    let fields: Vec<&str> = sent[0].body.split('|').collect();
    assert_eq!(fields[0], "AOI_flood_North_Ridge");
    assert_eq!(fields[3], "None");
    assert_eq!(fields[5], "[[[0.0,0.0],[0.0,1.0],[1.0,1.0],[1.0,0.0],[0.0,0.0]]]");
    assert_eq!(fields[7], "analyst");
}

#[test]
fn image_url_is_fetched_instead_of_generated() {
    let mut ctx = context();
    ctx["image_url"] = json!("https://example.org/quake.png");
    let fx = fixture(ctx);
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let pipeline = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer);

    let summary = pipeline.run().unwrap();
    assert!(summary.browse);
    assert!(!summary.tiles);
    assert!(tools.calls.lock().unwrap().is_empty());

    let layout = ProductLayout::new(&fx.root.join("products"), &summary.label);
    assert_eq!(fs::read(layout.browse_small_path()).unwrap(), b"png");
}

#[test]
fn optional_step_failures_do_not_abort() {
    let mut ctx = context();
    ctx["image_url"] = json!("https://example.org/missing.png");
    let fx = fixture(ctx);
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let summary = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap();
    assert!(!summary.browse);
    assert!(summary.notified);

    let fx = fixture(context());
    let tools = FakeTools {
        fail_tiles: true,
        ..FakeTools::default()
    };
    let summary = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap();
    assert!(summary.browse);
    assert!(!summary.tiles);
    let met = ProductWriter::new(ProductLayout::new(
        &fx.root.join("products"),
        &summary.label,
    ))
    .load_metadata()
    .unwrap();
    assert_eq!(met.tiles, None);
}

#[test]
fn invalid_geometry_sends_failure_email() {
    let mut ctx = context();
    ctx["geojson_polygon"] = json!("[[0, 0], [1, 1]]");
    let fx = fixture(ctx);
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let err = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap_err();
    assert_matches!(err, AoiError::GeometryParse(_));
    assert!(!fx.root.join("products").exists());

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Failed: Create AOI North Ridge");
    assert_eq!(
        sent[0].recipients,
        vec!["analyst@example.org", "ops@example.org"]
    );
    let fields: Vec<&str> = sent[0].body.split('|').collect();
    assert_eq!(&fields[1..4], &["North Ridge", "job-42", "task-7"]);
    assert!(fields[4].starts_with("unable to parse geojson"));
    assert_eq!(fields[5], "analyst");
}

#[test]
fn missing_context_still_notifies_template_recipients() {
    let fx = fixture(context());
    fs::remove_file(&fx.config.context_file).unwrap();
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let err = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap_err();
    assert_matches!(err, AoiError::ContextRead(_));

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent[0].subject, "Failed: Create AOI unknown");
    assert_eq!(sent[0].recipients, vec!["ops@example.org"]);
}

#[test]
fn event_label_overrides_dataset_label() {
    let mut ctx = context();
    ctx["additional_metadata"] = json!("{'event_metadata': {'label': 'AOI_event_custom'}}");
    let fx = fixture(ctx);
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let summary = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap();
    assert_eq!(summary.label, "AOI_event_custom");

    let layout = ProductLayout::new(&fx.root.join("products"), "AOI_flood_North_Ridge");
    let ds = ProductWriter::new(layout).load_dataset().unwrap();
    assert_eq!(ds.label, "AOI_event_custom");
}

#[test]
fn notifications_can_be_disabled() {
    let fx = fixture(context());
    let config = AoiConfig {
        notifications: false,
        ..fx.config.clone()
    };
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let summary = Pipeline::new(config, FakeBrowse, &tools, &mailer)
        .run()
        .unwrap();
    assert!(!summary.notified);
    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[test]
fn dataset_template_placeholders_and_text_emails() {
    let fx = fixture(context());
    fs::write(
        fx.config.templates_dir.join("AOI.dataset.json"),
        r#"{"label": null, "location": {}, "starttime": null, "emails": "ops@example.org, lead@example.org"}"#,
    )
    .unwrap();
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let summary = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap();

    let layout = ProductLayout::new(&fx.root.join("products"), &summary.label);
    let ds = ProductWriter::new(layout).load_dataset().unwrap();
    assert_eq!(ds.label, "AOI_flood_North_Ridge");
    assert_eq!(ds.starttime, "2021-03-01T10:00:00Z");
    assert!(ds.location.is_some());
    assert_eq!(
        ds.emails,
        vec!["analyst@example.org", "lead@example.org", "ops@example.org"]
    );
}

#[test]
fn failure_email_reads_text_recipients_from_template() {
    let mut ctx = context();
    ctx["endtime"] = json!("whenever");
    ctx.as_object_mut().unwrap().remove("emails");
    let fx = fixture(ctx);
    fs::write(
        fx.config.templates_dir.join("AOI.dataset.json"),
        r#"{"emails": "ops@example.org,lead@example.org"}"#,
    )
    .unwrap();
    let mailer = RecordingMailer::default();
    let tools = FakeTools::default();
    let err = Pipeline::new(fx.config.clone(), FakeBrowse, &tools, &mailer)
        .run()
        .unwrap_err();
    assert_matches!(err, AoiError::TimeParse(_));

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent[0].recipients, vec!["lead@example.org", "ops@example.org"]);
}
