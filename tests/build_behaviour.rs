use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use sitemill::config::ConfigFile;
use sitemill::dag::Scheduler;
use sitemill::engine::{RunReport, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use sitemill::pipeline::{self, BuildContext, BuildMode};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

/// A small but complete site: pages, nested styles, a script with a
/// relative import, fonts and an excluded README.
fn write_site(root: &Path) -> std::io::Result<()> {
    let source = root.join("source");
    fs::create_dir_all(source.join("blog"))?;
    fs::create_dir_all(source.join("styles"))?;
    fs::create_dir_all(source.join("scripts/util"))?;
    fs::create_dir_all(source.join("fonts"))?;

    fs::write(
        source.join("index.html"),
        "<!doctype html>\n<html>\n  <body>\n    <p class=\"intro\">Hello</p>\n    <script src=\"/scripts/main.js\"></script>\n  </body>\n</html>\n",
    )?;
    fs::write(
        source.join("blog/index.html"),
        "<html>\n  <body>\n    <h1 class=\"post-title\">Posts</h1>\n  </body>\n</html>\n",
    )?;
    fs::write(source.join("404.html"), "<html><body>not here</body></html>\n")?;
    fs::write(
        source.join("styles/site.scss"),
        "$ink: #222222;\nbody {\n  color: $ink;\n  p {\n    margin: 0;\n  }\n}\n",
    )?;
    fs::write(
        source.join("scripts/main.js"),
        "import { shout } from \"./util/strings.js\";\n\nconsole.log(shout(\"ready\"));\n",
    )?;
    fs::write(
        source.join("scripts/util/strings.js"),
        "export function shout(text) {\n  return text.toUpperCase();\n}\n",
    )?;
    fs::write(source.join("fonts/inter.woff2"), b"woff2 bytes")?;
    fs::write(source.join("fonts/README.md"), "licensing\n")?;
    Ok(())
}

/// Wire a scheduler, executor and runtime the way the CLI does, seed the
/// given triggers, and run until idle.
async fn run_pipeline(
    ctx: BuildContext,
    tasks: Vec<&'static str>,
) -> Result<RunReport, Box<dyn Error>> {
    let ctx = Arc::new(ctx);
    let scheduler = Scheduler::new(&pipeline::standard_plan())?;
    let (rt_tx, rt_rx) = mpsc::channel(64);
    let exec_tx = pipeline::spawn_executor(Arc::clone(&ctx), rt_tx.clone());

    for task in tasks {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task: task.to_string(),
                reason: TriggerReason::Startup,
            })
            .await?;
    }

    let options = RuntimeOptions {
        exit_when_idle: true,
    };
    let runtime = Runtime::new(scheduler, options, rt_rx, exec_tx);
    Ok(runtime.run().await?)
}

#[tokio::test]
async fn production_build_writes_the_whole_site() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    // Leftovers from an earlier build must not survive.
    fs::create_dir_all(dir.path().join("build"))?;
    fs::write(dir.path().join("build/stale.txt"), "old")?;

    let ctx = BuildContext::new(ConfigFile::default(), BuildMode::Production, dir.path())?;
    let report = run_pipeline(ctx, pipeline::build_tasks()).await?;
    assert!(report.all_succeeded(), "failed tasks: {:?}", report.failed());

    let build = dir.path().join("build");
    assert!(!build.join("stale.txt").exists());

    let source_html = fs::read_to_string(dir.path().join("source/index.html"))?;
    let html = fs::read_to_string(build.join("index.html"))?;
    assert!(html.contains("class=\"intro\""));
    assert!(html.len() < source_html.len());
    assert!(build.join("blog/index.html").is_file());
    assert!(build.join("404.html").is_file());

    let css = fs::read_to_string(build.join("styles/site.css"))?;
    assert!(css.contains("body p"));
    assert!(!css.contains("sourceMappingURL"));
    assert!(!build.join("styles/site.css.map").exists());

    let js = fs::read_to_string(build.join("scripts/main.js"))?;
    assert!(js.contains("function shout"));
    assert!(!js.contains("import"));
    assert!(!build.join("scripts/main.js.map").exists());

    assert_eq!(fs::read(build.join("fonts/inter.woff2"))?, b"woff2 bytes");
    assert!(!build.join("fonts/README.md").exists());

    Ok(())
}

#[tokio::test]
async fn dev_build_keeps_readable_outputs_and_skips_statics() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;

    let ctx = BuildContext::new(ConfigFile::default(), BuildMode::Development, dir.path())?;
    let report = run_pipeline(ctx, pipeline::dev_tasks()).await?;
    assert!(report.all_succeeded(), "failed tasks: {:?}", report.failed());

    let build = dir.path().join("build");

    // Markup is copied untouched in development.
    let source_html = fs::read(dir.path().join("source/index.html"))?;
    assert_eq!(fs::read(build.join("index.html"))?, source_html);

    let css = fs::read_to_string(build.join("styles/site.css"))?;
    assert!(css.contains("sourceMappingURL=site.css.map"));
    assert!(build.join("styles/site.css.map").is_file());

    let js = fs::read_to_string(build.join("scripts/main.js"))?;
    assert!(js.contains("sourceMappingURL=main.js.map"));
    assert!(build.join("scripts/main.js.map").is_file());

    // Dev sessions serve static assets straight from the source tree.
    assert!(!build.join("fonts").exists());

    Ok(())
}

#[tokio::test]
async fn a_broken_stylesheet_fails_only_the_styles_task() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_site(dir.path())?;
    fs::write(
        dir.path().join("source/styles/site.scss"),
        "body { color: ; }\n",
    )?;

    let ctx = BuildContext::new(ConfigFile::default(), BuildMode::Production, dir.path())?;
    let report = run_pipeline(ctx, pipeline::build_tasks()).await?;

    assert_eq!(report.failed(), vec!["styles"]);
    let succeeded = report.succeeded();
    for task in ["clean", "markup", "scripts", "static"] {
        assert!(succeeded.contains(&task), "{task} should have succeeded");
    }

    let build = dir.path().join("build");
    assert!(build.join("index.html").is_file());
    assert!(!build.join("styles/site.css").exists());

    Ok(())
}
